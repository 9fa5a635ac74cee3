use crate::{PingError, PingResult};
use std::net::{IpAddr, ToSocketAddrs};

/// Resolves `host` once. Literal addresses are returned as is; for names the first IPv4
/// address wins, otherwise the first address of any family.
pub fn resolve(host: &str) -> PingResult<IpAddr> {
    if host.is_empty() {
        return Err(resolution_error(host, "empty address"));
    }
    if let Ok(ip_addr) = host.parse::<IpAddr>() {
        return Ok(ip_addr);
    }

    let addrs: Vec<IpAddr> = (host, 0)
        .to_socket_addrs()
        .map_err(|e| resolution_error(host, &e.to_string()))?
        .map(|addr| addr.ip())
        .collect();
    tracing::trace!("{host} resolved to {addrs:?}");
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| resolution_error(host, "no address found"))
}

fn resolution_error(host: &str, message: &str) -> PingError {
    PingError::Resolution { host: host.to_owned(), message: message.to_owned() }
}
