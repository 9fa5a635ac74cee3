use crate::icmp::Ttl;
use crate::ping_error::is_timeout_kind;
use crate::socket::Socket;
use crate::{PingError, PingResult};
use socket2::SockAddr;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

/// Deadline-aware send and receive on top of a [`Socket`], shared by the sender and the receiver.
pub(crate) struct Transport<S> {
    socket: S,
    write_timeout: Duration,
}

impl<S> Transport<S>
where
    S: Socket + 'static,
{
    pub(crate) fn new(socket: S, write_timeout: Duration) -> Self {
        Transport { socket, write_timeout }
    }

    /// Retries on `ENOBUFS` until the write deadline passes; a deadline expiry is reported as
    /// [`PingError::Timeout`].
    pub(crate) fn send_to(&self, buf: &[u8], ip_addr: IpAddr) -> PingResult<()> {
        let addr: SockAddr = SocketAddr::new(ip_addr, 0).into();
        // An unrepresentable deadline never passes.
        let deadline = Instant::now().checked_add(self.write_timeout);
        loop {
            match self.socket.send_to(buf, &addr) {
                Ok(_) => return Ok(()),
                Err(e) if is_no_buffer_space(&e) => {
                    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        return Err(PingError::Timeout);
                    }
                    tracing::trace!("no buffer space available, retrying send");
                    std::thread::yield_now();
                }
                Err(e) if is_timeout_kind(&e) => return Err(PingError::Timeout),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// `Ok(None)` when the read deadline expired without data.
    pub(crate) fn try_receive(
        &self,
        buf: &mut [u8],
    ) -> PingResult<Option<(usize, IpAddr, Option<Ttl>)>> {
        match self.socket.recv_from(buf) {
            Err(e) if is_timeout_kind(&e) => Ok(None),
            Err(e) => Err(e.into()),
            Ok(received) => Ok(Some(received)),
        }
    }
}

#[cfg(unix)]
fn is_no_buffer_space(error: &io::Error) -> bool {
    error.raw_os_error() == Some(nix::libc::ENOBUFS)
}

#[cfg(not(unix))]
fn is_no_buffer_space(_error: &io::Error) -> bool {
    false
}
