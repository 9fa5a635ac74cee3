use crate::icmp::{SequenceNumber, Ttl};
use std::net::IpAddr;
use std::time::Duration;

/// A matched echo reply, handed from the receiver to the statistics and to the report output.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PingReply {
    pub source: IpAddr,
    /// Length of the echo data, ICMP header excluded.
    pub package_size: usize,
    /// `None` when the socket does not expose the IP header of the reply.
    pub ttl: Option<Ttl>,
    pub identifier: u16,
    pub sequence_number: SequenceNumber,
    pub rtt: Duration,
}

impl std::fmt::Display for PingReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let PingReply { source, package_size, ttl, identifier: _, sequence_number, rtt } = self;
        write!(f, "{package_size} bytes from {source}: icmp_seq={sequence_number} ttl=")?;
        match ttl {
            Some(ttl) => write!(f, "{ttl}")?,
            None => write!(f, "?")?,
        }
        write!(f, " time={rtt:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn reply(ttl: Option<Ttl>) -> PingReply {
        PingReply {
            source: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7)),
            package_size: 32,
            ttl,
            identifier: 0x1234,
            sequence_number: SequenceNumber::from(3),
            rtt: Duration::from_millis(12),
        }
    }

    #[test]
    fn fmt_report_line() {
        assert_eq!(
            "32 bytes from 192.0.2.7: icmp_seq=3 ttl=57 time=12ms",
            reply(Some(Ttl(57))).to_string()
        );
    }

    #[test]
    fn fmt_report_line_without_ttl() {
        assert_eq!("32 bytes from 192.0.2.7: icmp_seq=3 ttl=? time=12ms", reply(None).to_string());
    }
}
