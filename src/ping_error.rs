use std::io;
use thiserror::Error;

pub type GenericError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type PingResult<T> = std::result::Result<T, PingError>;

#[derive(Error, Debug)]
pub enum PingError {
    #[error("could not resolve {host}: {message}")]
    Resolution { host: String, message: String },
    #[error("could not open ICMP socket")]
    SocketOpen(#[source] io::Error),
    #[error("could not configure ICMP socket")]
    SocketConfig(#[source] io::Error),
    #[error("could not encode echo request: {0}")]
    Encode(String),
    #[error("could not decode ICMP message: {0}")]
    Decode(String),
    #[error("socket deadline expired")]
    Timeout,
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
    #[error("receiver thread panicked")]
    ReceiverPanicked,
}

impl PingError {
    /// Deadline expiries drive retry and polling; they never end a run.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PingError::Timeout)
    }
}

pub(crate) fn is_timeout_kind(error: &io::Error) -> bool {
    matches!(error.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}
