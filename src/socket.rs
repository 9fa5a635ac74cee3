use crate::icmp::{EchoProtocol, Ttl};
use crate::{PingError, PingResult};
use socket2::{SockAddr, Type};
use std::io;
use std::net::IpAddr;
use std::time::Duration;

#[cfg(target_os = "linux")]
mod linux;

pub trait Socket: Send + Sync {
    fn send_to(&self, buf: &[u8], addr: &SockAddr) -> io::Result<usize>;
    /// Also returns the hop limit of the datagram when the OS reports it next to the data.
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr, Option<Ttl>)>;
}

/// `Dgram` needs no privileges where the OS allows unprivileged ICMP sockets; `Raw` needs root
/// (or `CAP_NET_RAW`) but also delivers the IPv4 header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SocketType {
    Dgram,
    Raw,
}

impl SocketType {
    /// Datagram ICMP sockets let the kernel pick the echo identifier.
    pub(crate) fn rewrites_identifier(self) -> bool {
        self == SocketType::Dgram
    }
}

impl Default for SocketType {
    fn default() -> Self {
        if cfg!(any(target_os = "linux", target_os = "macos")) {
            SocketType::Dgram
        } else {
            SocketType::Raw
        }
    }
}

pub struct IcmpSocket {
    socket: socket2::Socket,
    protocol: EchoProtocol,
}

impl IcmpSocket {
    pub fn open(
        protocol: EchoProtocol,
        socket_type: SocketType,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> PingResult<Self> {
        tracing::trace!("creating {socket_type:?} socket for {protocol:?}");
        let type_ = match socket_type {
            SocketType::Dgram => Type::DGRAM,
            SocketType::Raw => Type::RAW,
        };
        let socket = socket2::Socket::new(protocol.domain(), type_, Some(protocol.protocol()))
            .map_err(PingError::SocketOpen)?;
        socket.bind(&protocol.wildcard_addr().into()).map_err(PingError::SocketOpen)?;
        socket.set_read_timeout(Some(read_timeout)).map_err(PingError::SocketConfig)?;
        socket.set_write_timeout(Some(write_timeout)).map_err(PingError::SocketConfig)?;
        #[cfg(target_os = "linux")]
        linux::enable_ttl_reporting(&socket, protocol).map_err(PingError::SocketConfig)?;
        Ok(IcmpSocket { socket, protocol })
    }

    /// Hop limit applied to every request sent through this socket.
    pub fn set_ttl(&self, ttl: Ttl) -> PingResult<()> {
        let result = match self.protocol {
            EchoProtocol::EchoV4 => self.socket.set_ttl(ttl.into()),
            EchoProtocol::EchoV6 => self.socket.set_unicast_hops_v6(ttl.into()),
        };
        result.map_err(PingError::SocketConfig)
    }
}

impl Socket for IcmpSocket {
    fn send_to(&self, buf: &[u8], addr: &SockAddr) -> io::Result<usize> {
        self.socket.send_to(buf, addr)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr, Option<Ttl>)> {
        recv(&self.socket, buf)
    }
}

#[cfg(target_os = "linux")]
use linux::recv_with_ttl as recv;

/// Without ancillary data the TTL is only known from an IPv4 header in front of the message.
#[cfg(not(target_os = "linux"))]
fn recv(socket: &socket2::Socket, buf: &mut [u8]) -> io::Result<(usize, IpAddr, Option<Ttl>)> {
    use std::mem::MaybeUninit;

    // socket2 never writes uninitialised bytes into the buffer, so viewing an initialised
    // `&mut [u8]` as `&mut [MaybeUninit<u8>]` is sound.
    // https://docs.rs/socket2/0.4.7/socket2/struct.Socket.html#method.recv
    let uninit_buf = unsafe { &mut *(buf as *mut [u8] as *mut [MaybeUninit<u8>]) };
    let (n, sock_addr) = socket.recv_from(uninit_buf)?;
    let source = sock_addr.as_socket().map(|addr| addr.ip()).ok_or_else(|| {
        io::Error::new(io::ErrorKind::Other, "received from a non-IP address")
    })?;
    Ok((n, source, None))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::icmp::codec::tests::{echo_reply_for, with_ipv4_header};
    use std::collections::VecDeque;
    use std::sync::{Arc, Condvar, Mutex};

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub(crate) enum OnSend {
        ReturnErr,
        ReturnWouldBlock,
        /// Fail with `ENOBUFS` this many times, then succeed.
        ReturnNoBufferSpace(usize),
        /// Accept the packet without answering.
        Swallow,
        /// Answer every echo request with the matching echo reply.
        Echo,
    }

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub(crate) enum OnReceive {
        ReturnErr,
        ReturnQueued,
        Panic,
    }

    type Inbox = Arc<(Mutex<VecDeque<(Vec<u8>, IpAddr)>>, Condvar)>;

    #[derive(Clone)]
    pub(crate) struct SocketMock {
        on_send: Arc<Mutex<OnSend>>,
        on_receive: OnReceive,
        header_ttl: Option<u8>,
        reported_ttl: Option<Ttl>,
        sent: Arc<Mutex<Vec<(Vec<u8>, IpAddr)>>>,
        inbox: Inbox,
        received_cnt: Arc<Mutex<usize>>,
    }

    impl SocketMock {
        pub(crate) fn new(on_send: OnSend, on_receive: OnReceive) -> Self {
            Self {
                on_send: Arc::new(Mutex::new(on_send)),
                on_receive,
                header_ttl: None,
                reported_ttl: None,
                sent: Arc::new(Mutex::new(vec![])),
                inbox: Arc::new((Mutex::new(VecDeque::new()), Condvar::new())),
                received_cnt: Arc::new(Mutex::new(0)),
            }
        }

        pub(crate) fn new_echo() -> Self {
            Self::new(OnSend::Echo, OnReceive::ReturnQueued)
        }

        /// IPv4 replies then arrive behind an IP header carrying `ttl`, as on a raw socket.
        pub(crate) fn with_reply_ttl(mut self, ttl: u8) -> Self {
            self.header_ttl = Some(ttl);
            self
        }

        /// Every received datagram comes with `ttl` reported alongside, as on a datagram socket.
        pub(crate) fn with_reported_ttl(mut self, ttl: Ttl) -> Self {
            self.reported_ttl = Some(ttl);
            self
        }

        pub(crate) fn inject(&self, bytes: Vec<u8>, source: IpAddr) {
            let (lock, cvar) = &*self.inbox;
            lock.lock().unwrap().push_back((bytes, source));
            cvar.notify_all();
        }

        pub(crate) fn sent_packets(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().iter().map(|(buf, _)| buf.clone()).collect()
        }

        pub(crate) fn should_send_number_of_messages(&self, n: usize) -> &Self {
            assert_eq!(n, self.sent.lock().unwrap().len());
            self
        }

        pub(crate) fn should_send_to_address(&self, addr: &IpAddr) -> &Self {
            assert!(self.sent.lock().unwrap().iter().any(|e| *addr == e.1));
            self
        }

        pub(crate) fn should_receive_number_of_messages(&self, n: usize) -> &Self {
            assert_eq!(n, *self.received_cnt.lock().unwrap());
            self
        }
    }

    impl Socket for SocketMock {
        fn send_to(&self, buf: &[u8], addr: &SockAddr) -> io::Result<usize> {
            let mut on_send = self.on_send.lock().unwrap();
            let current = *on_send;
            match current {
                OnSend::ReturnErr => {
                    return Err(io::Error::new(io::ErrorKind::Other, "simulating error in mock"))
                }
                OnSend::ReturnWouldBlock => {
                    return Err(io::Error::new(io::ErrorKind::WouldBlock, "simulating would-block"))
                }
                OnSend::ReturnNoBufferSpace(0) | OnSend::Swallow | OnSend::Echo => {}
                OnSend::ReturnNoBufferSpace(cnt) => {
                    *on_send = OnSend::ReturnNoBufferSpace(cnt - 1);
                    return Err(no_buffer_space());
                }
            }
            let ip = addr
                .as_socket()
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::Other, "error in extracting IP address")
                })?
                .ip();
            self.sent.lock().unwrap().push((buf.to_vec(), ip));

            if current == OnSend::Echo {
                let protocol = EchoProtocol::for_addr(ip);
                let mut reply = echo_reply_for(buf, protocol);
                if let (Some(ttl), EchoProtocol::EchoV4) = (self.header_ttl, protocol) {
                    reply = with_ipv4_header(&reply, ttl);
                }
                self.inject(reply, ip);
            }
            Ok(buf.len())
        }

        fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, IpAddr, Option<Ttl>)> {
            match self.on_receive {
                OnReceive::ReturnErr => {
                    return Err(io::Error::new(io::ErrorKind::ConnectionReset, "simulating error"))
                }
                OnReceive::Panic => panic!("simulating panic in mock"),
                OnReceive::ReturnQueued => {}
            }
            let (lock, cvar) = &*self.inbox;
            let mut inbox = lock.lock().unwrap();
            if inbox.is_empty() {
                inbox = cvar.wait_timeout(inbox, Duration::from_millis(5)).unwrap().0;
            }
            let Some((bytes, source)) = inbox.pop_front() else {
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "simulating would-block"));
            };
            let n = bytes.len().min(buf.len());
            buf[..n].copy_from_slice(&bytes[..n]);
            *self.received_cnt.lock().unwrap() += 1;
            Ok((n, source, self.reported_ttl))
        }
    }

    #[cfg(unix)]
    fn no_buffer_space() -> io::Error {
        io::Error::from_raw_os_error(nix::libc::ENOBUFS)
    }

    #[cfg(not(unix))]
    fn no_buffer_space() -> io::Error {
        io::Error::new(io::ErrorKind::Other, "simulating no buffer space in mock")
    }

    #[test]
    fn default_socket_type() {
        let expected = if cfg!(any(target_os = "linux", target_os = "macos")) {
            SocketType::Dgram
        } else {
            SocketType::Raw
        };
        assert_eq!(expected, SocketType::default());
        assert!(SocketType::Dgram.rewrites_identifier());
        assert!(!SocketType::Raw.rewrites_identifier());
    }

    #[test]
    fn mock_echoes_requests() {
        use crate::icmp::{encode_echo_request, SequenceNumber};
        use std::net::{Ipv4Addr, SocketAddr};

        let socket_mock = SocketMock::new_echo();
        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let request =
            encode_echo_request(EchoProtocol::EchoV4, 1, SequenceNumber::start_value(), 24)
                .unwrap();

        socket_mock.send_to(&request, &SocketAddr::new(localhost, 0).into()).unwrap();
        let mut buf = [0u8; 128];
        let (n, source, ttl) = socket_mock.recv_from(&mut buf).unwrap();

        assert_eq!(request.len(), n);
        assert_eq!(0, buf[0]);
        assert_eq!(localhost, source);
        assert_eq!(None, ttl);
        socket_mock
            .should_send_number_of_messages(1)
            .should_send_to_address(&localhost)
            .should_receive_number_of_messages(1);
        assert_eq!(vec![request], socket_mock.sent_packets());
    }

    #[test]
    fn mock_reports_ttl() {
        use std::net::Ipv6Addr;

        let socket_mock = SocketMock::new(OnSend::Swallow, OnReceive::ReturnQueued)
            .with_reported_ttl(Ttl(57));
        socket_mock.inject(vec![129, 0, 0, 0], IpAddr::V6(Ipv6Addr::LOCALHOST));
        let mut buf = [0u8; 16];

        let (_, _, ttl) = socket_mock.recv_from(&mut buf).unwrap();

        assert_eq!(Some(Ttl(57)), ttl);
    }

    #[test]
    fn mock_would_block_when_empty() {
        let socket_mock = SocketMock::new(OnSend::Swallow, OnReceive::ReturnQueued);
        let mut buf = [0u8; 16];
        let error = socket_mock.recv_from(&mut buf).unwrap_err();
        assert_eq!(io::ErrorKind::WouldBlock, error.kind());
    }
}
