#![warn(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub use icmp::{EchoProtocol, SequenceNumber, Ttl};
pub use ping_config::PingConfig;
pub use ping_error::{GenericError, PingError, PingResult};
pub use ping_reply::PingReply;
pub use ping_runner::{PingRunner, State};
pub use resolve::resolve;
pub use socket::{IcmpSocket, Socket, SocketType};
pub use statistics::{Statistics, Summary};
pub use stop_signal::StopSignal;

pub mod icmp;
mod ping_config;
mod ping_error;
mod ping_reply;
mod ping_runner;
mod resolve;
mod socket;
mod statistics;
mod stop_signal;
mod transport;
