use crate::icmp::{EchoProtocol, Ttl, MIN_PAYLOAD_SIZE};
use crate::socket::SocketType;
use crate::{PingError, PingResult};
use std::net::IpAddr;
use std::time::Duration;

// Room for the largest IPv4 header in front of the ICMP header on raw sockets.
const RECEIVE_HEADROOM: usize = 60 + 8;

/// Resolved, immutable parameters of one run.
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Debug)]
pub struct PingConfig {
    pub addr: IpAddr,
    /// ICMP echo identifier; defaults to the low 16 bits of the process id.
    pub identifier: u16,
    pub ttl: Ttl,
    pub interval: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    /// Total run time; `None` runs until stopped or until `count` replies arrived.
    pub run_timeout: Option<Duration>,
    pub payload_size: usize,
    /// Number of echo requests; `None` (or zero) is unbounded.
    pub count: Option<u32>,
    /// How long to wait for outstanding replies once `count` requests are out.
    pub linger: Duration,
    pub socket_type: SocketType,
}

impl PingConfig {
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(addr: IpAddr) -> Self {
        PingConfig {
            addr,
            identifier: (std::process::id() & 0xffff) as u16,
            ttl: Ttl::default(),
            interval: Duration::from_secs(1),
            read_timeout: Duration::from_millis(200),
            write_timeout: Duration::from_secs(1),
            run_timeout: None,
            payload_size: 32,
            count: None,
            linger: Duration::from_secs(1),
            socket_type: SocketType::default(),
        }
    }

    #[must_use]
    pub fn with_identifier(mut self, identifier: u16) -> Self {
        self.identifier = identifier;
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Ttl) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    #[must_use]
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    #[must_use]
    pub fn with_run_timeout(mut self, run_timeout: Option<Duration>) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    #[must_use]
    pub fn with_payload_size(mut self, payload_size: usize) -> Self {
        self.payload_size = payload_size;
        self
    }

    #[must_use]
    pub fn with_count(mut self, count: Option<u32>) -> Self {
        self.count = count;
        self
    }

    #[must_use]
    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    #[must_use]
    pub fn with_socket_type(mut self, socket_type: SocketType) -> Self {
        self.socket_type = socket_type;
        self
    }

    pub fn protocol(&self) -> EchoProtocol {
        EchoProtocol::for_addr(self.addr)
    }

    pub fn validate(&self) -> PingResult<()> {
        if self.interval.is_zero() {
            return Err(PingError::InvalidConfig("interval must be greater than zero"));
        }
        // socket2 rejects a zero socket timeout.
        if self.read_timeout.is_zero() {
            return Err(PingError::InvalidConfig("read timeout must be greater than zero"));
        }
        if self.write_timeout.is_zero() {
            return Err(PingError::InvalidConfig("write timeout must be greater than zero"));
        }
        Ok(())
    }

    pub(crate) fn count_limit(&self) -> Option<u32> {
        self.count.filter(|count| *count > 0)
    }

    pub(crate) fn receive_buffer_size(&self) -> usize {
        self.payload_size.max(MIN_PAYLOAD_SIZE) + RECEIVE_HEADROOM
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn defaults() {
        let config = PingConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST));

        assert_eq!(Ttl(64), config.ttl);
        assert_eq!(Duration::from_secs(1), config.interval);
        assert_eq!(None, config.run_timeout);
        assert_eq!(32, config.payload_size);
        assert_eq!(None, config.count_limit());
        assert_eq!(EchoProtocol::EchoV4, config.protocol());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn protocol_follows_address() {
        let config = PingConfig::new(IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_eq!(EchoProtocol::EchoV6, config.protocol());
    }

    #[test]
    fn zero_count_is_unbounded() {
        let config = PingConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST)).with_count(Some(0));
        assert_eq!(None, config.count_limit());
        assert_eq!(Some(3), config.with_count(Some(3)).count_limit());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = PingConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST)).with_interval(Duration::ZERO);
        assert!(matches!(config.validate(), Err(PingError::InvalidConfig(_))));
    }

    #[test]
    fn zero_read_timeout_is_rejected() {
        let config =
            PingConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST)).with_read_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(PingError::InvalidConfig(_))));
    }

    #[test]
    fn receive_buffer_fits_header_and_floor() {
        let config = PingConfig::new(IpAddr::V4(Ipv4Addr::LOCALHOST)).with_payload_size(1);
        assert_eq!(MIN_PAYLOAD_SIZE + 68, config.receive_buffer_size());
    }
}
