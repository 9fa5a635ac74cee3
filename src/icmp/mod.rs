pub(crate) mod codec;
mod echo_protocol;
mod sequence_number;
mod timestamp;
mod ttl;

pub use codec::{
    decode_echo_reply, encode_echo_request, encode_echo_request_at, DecodedMessage,
    MIN_PAYLOAD_SIZE,
};
pub use echo_protocol::EchoProtocol;
pub use sequence_number::SequenceNumber;
pub use timestamp::Timestamp;
pub use ttl::Ttl;
