use socket2::{Domain, Protocol};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// The echo flavour spoken on the wire, one per address family.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EchoProtocol {
    EchoV4,
    EchoV6,
}

impl EchoProtocol {
    pub fn for_addr(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => EchoProtocol::EchoV4,
            IpAddr::V6(_) => EchoProtocol::EchoV6,
        }
    }

    pub(crate) fn domain(self) -> Domain {
        match self {
            EchoProtocol::EchoV4 => Domain::IPV4,
            EchoProtocol::EchoV6 => Domain::IPV6,
        }
    }

    pub(crate) fn protocol(self) -> Protocol {
        match self {
            EchoProtocol::EchoV4 => Protocol::ICMPV4,
            EchoProtocol::EchoV6 => Protocol::ICMPV6,
        }
    }

    pub(crate) fn echo_request_type(self) -> u8 {
        match self {
            EchoProtocol::EchoV4 => 8,
            EchoProtocol::EchoV6 => 128,
        }
    }

    pub(crate) fn echo_reply_type(self) -> u8 {
        match self {
            EchoProtocol::EchoV4 => 0,
            EchoProtocol::EchoV6 => 129,
        }
    }

    /// Largest echo data an IP datagram of this family can carry.
    pub(crate) fn max_payload_size(self) -> usize {
        match self {
            // 65535 - 20 (IPv4 header) - 8 (ICMP header)
            EchoProtocol::EchoV4 => 65_507,
            // 65535 (payload length) - 8 (ICMPv6 header)
            EchoProtocol::EchoV6 => 65_527,
        }
    }

    pub(crate) fn wildcard_addr(self) -> SocketAddr {
        match self {
            EchoProtocol::EchoV4 => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            EchoProtocol::EchoV6 => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        }
    }
}
