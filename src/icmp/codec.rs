use crate::icmp::timestamp::TIMESTAMP_SIZE;
use crate::icmp::{EchoProtocol, SequenceNumber, Timestamp, Ttl};
use crate::{PingError, PingReply, PingResult};
use pnet_packet::icmp::{
    echo_reply::EchoReplyPacket,
    echo_request::{
        EchoRequestPacket as EchoRequestPacketV4,
        MutableEchoRequestPacket as MutableEchoRequestPacketV4,
    },
    IcmpCode, IcmpPacket, IcmpType,
};
use pnet_packet::icmpv6::{Icmpv6Code, Icmpv6Packet, Icmpv6Type, MutableIcmpv6Packet};
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::Packet;
use rand::Rng;
use std::net::IpAddr;

const NONCE_SIZE: usize = 16;
const ICMP_HEADER_SIZE: usize = 8;
const IPV4_MIN_HEADER_SIZE: usize = 20;

/// Timestamp plus nonce; smaller requested sizes are raised to this.
pub const MIN_PAYLOAD_SIZE: usize = TIMESTAMP_SIZE + NONCE_SIZE;

/// What an incoming ICMP message turned out to be.
#[derive(Debug, Eq, PartialEq)]
pub enum DecodedMessage {
    EchoReply(PingReply),
    /// Any other ICMP message (unreachable, time exceeded, looped-back requests).
    /// Skipped by the receiver.
    Other { icmp_type: u8, icmp_code: u8 },
}

pub fn encode_echo_request(
    protocol: EchoProtocol,
    identifier: u16,
    sequence_number: SequenceNumber,
    size: usize,
) -> PingResult<Vec<u8>> {
    encode_echo_request_at(protocol, identifier, sequence_number, size, Timestamp::now())
}

pub fn encode_echo_request_at(
    protocol: EchoProtocol,
    identifier: u16,
    sequence_number: SequenceNumber,
    size: usize,
    timestamp: Timestamp,
) -> PingResult<Vec<u8>> {
    let payload_size = size.max(MIN_PAYLOAD_SIZE);
    if payload_size > protocol.max_payload_size() {
        return Err(PingError::Encode(format!(
            "payload of {payload_size} bytes exceeds the maximum of {}",
            protocol.max_payload_size()
        )));
    }

    let mut payload = vec![0u8; payload_size];
    payload[..TIMESTAMP_SIZE].copy_from_slice(&timestamp.to_be_bytes());
    rand::thread_rng().fill(&mut payload[TIMESTAMP_SIZE..MIN_PAYLOAD_SIZE]);

    match protocol {
        EchoProtocol::EchoV4 => new_icmpv4_package(identifier, sequence_number, &payload),
        EchoProtocol::EchoV6 => new_icmpv6_package(identifier, sequence_number, &payload),
    }
}

fn new_icmpv4_package(
    identifier: u16,
    sequence_number: SequenceNumber,
    payload: &[u8],
) -> PingResult<Vec<u8>> {
    let buf = vec![0u8; EchoRequestPacketV4::minimum_packet_size() + payload.len()];
    let mut package = MutableEchoRequestPacketV4::owned(buf)
        .ok_or_else(|| PingError::Encode("buffer too small for ICMPv4 echo request".to_owned()))?;
    package.set_icmp_type(IcmpType::new(EchoProtocol::EchoV4.echo_request_type()));
    package.set_icmp_code(IcmpCode::new(0));
    package.set_identifier(identifier);
    package.set_sequence_number(sequence_number.into());
    package.set_payload(payload);

    package.set_checksum(0_u16);
    let icmp_package = IcmpPacket::new(package.packet()).ok_or_else(|| {
        PingError::Encode("could not view echo request as ICMPv4 message".to_owned())
    })?;
    let checksum = pnet_packet::icmp::checksum(&icmp_package);
    package.set_checksum(checksum);
    Ok(package.packet().to_vec())
}

fn new_icmpv6_package(
    identifier: u16,
    sequence_number: SequenceNumber,
    payload: &[u8],
) -> PingResult<Vec<u8>> {
    let mut body = Vec::with_capacity(4 + payload.len());
    body.extend_from_slice(&identifier.to_be_bytes());
    body.extend_from_slice(&u16::from(sequence_number).to_be_bytes());
    body.extend_from_slice(payload);

    let buf = vec![0u8; Icmpv6Packet::minimum_packet_size() + body.len()];
    let mut package = MutableIcmpv6Packet::owned(buf)
        .ok_or_else(|| PingError::Encode("buffer too small for ICMPv6 echo request".to_owned()))?;
    package.set_icmpv6_type(Icmpv6Type::new(EchoProtocol::EchoV6.echo_request_type()));
    package.set_icmpv6_code(Icmpv6Code::new(0));
    // The kernel computes the ICMPv6 checksum, it needs the pseudo header.
    package.set_checksum(0_u16);
    package.set_payload(&body);
    Ok(package.packet().to_vec())
}

/// Decodes one received datagram. `bytes` must be exactly what the socket returned.
///
/// `ttl` is the hop limit the socket reported next to the datagram, if any. An IPv4 header in
/// front of the message (raw sockets) takes precedence over it.
pub fn decode_echo_reply(
    bytes: &[u8],
    protocol: EchoProtocol,
    source: IpAddr,
    ttl: Option<Ttl>,
    received_at: Timestamp,
) -> PingResult<DecodedMessage> {
    match protocol {
        EchoProtocol::EchoV4 => decode_icmpv4(bytes, source, ttl, received_at),
        EchoProtocol::EchoV6 => decode_icmpv6(bytes, source, ttl, received_at),
    }
}

fn decode_icmpv4(
    bytes: &[u8],
    source: IpAddr,
    ttl: Option<Ttl>,
    received_at: Timestamp,
) -> PingResult<DecodedMessage> {
    // Raw sockets deliver the IPv4 header, datagram sockets only the ICMP message.
    // A bare echo reply starts with type 0, so the version nibble tells them apart.
    let (icmp_bytes, ttl) = if bytes.first().map(|b| b >> 4) == Some(4) {
        let ipv4_packet = Ipv4Packet::new(bytes)
            .ok_or_else(|| PingError::Decode("truncated IPv4 header".to_owned()))?;
        let header_size = usize::from(ipv4_packet.get_header_length()) * 4;
        if header_size < IPV4_MIN_HEADER_SIZE || bytes.len() < header_size {
            return Err(PingError::Decode(format!("invalid IPv4 header length {header_size}")));
        }
        (&bytes[header_size..], Some(Ttl(ipv4_packet.get_ttl())))
    } else {
        (bytes, ttl)
    };

    let icmp_package = IcmpPacket::new(icmp_bytes).ok_or_else(|| {
        PingError::Decode(format!("{} bytes is too short for an ICMP message", icmp_bytes.len()))
    })?;
    let icmp_type = icmp_package.get_icmp_type().0;
    if icmp_type != EchoProtocol::EchoV4.echo_reply_type() {
        let icmp_code = icmp_package.get_icmp_code().0;
        return Ok(DecodedMessage::Other { icmp_type, icmp_code });
    }

    let echo_reply_package = EchoReplyPacket::new(icmp_bytes)
        .ok_or_else(|| PingError::Decode("truncated ICMPv4 echo reply".to_owned()))?;
    let reply = new_ping_reply(
        echo_reply_package.payload(),
        echo_reply_package.get_identifier(),
        echo_reply_package.get_sequence_number(),
        ttl,
        source,
        received_at,
    )?;
    Ok(DecodedMessage::EchoReply(reply))
}

fn decode_icmpv6(
    bytes: &[u8],
    source: IpAddr,
    ttl: Option<Ttl>,
    received_at: Timestamp,
) -> PingResult<DecodedMessage> {
    let icmpv6_package = Icmpv6Packet::new(bytes).ok_or_else(|| {
        PingError::Decode(format!("{} bytes is too short for an ICMPv6 message", bytes.len()))
    })?;
    let icmp_type = icmpv6_package.get_icmpv6_type().0;
    if icmp_type != EchoProtocol::EchoV6.echo_reply_type() {
        let icmp_code = icmpv6_package.get_icmpv6_code().0;
        return Ok(DecodedMessage::Other { icmp_type, icmp_code });
    }

    if bytes.len() < ICMP_HEADER_SIZE {
        return Err(PingError::Decode("truncated ICMPv6 echo reply".to_owned()));
    }
    let identifier = u16::from_be_bytes([bytes[4], bytes[5]]);
    let sequence_number = u16::from_be_bytes([bytes[6], bytes[7]]);
    let data = &bytes[ICMP_HEADER_SIZE..];
    let reply = new_ping_reply(data, identifier, sequence_number, ttl, source, received_at)?;
    Ok(DecodedMessage::EchoReply(reply))
}

fn new_ping_reply(
    data: &[u8],
    identifier: u16,
    sequence_number: u16,
    ttl: Option<Ttl>,
    source: IpAddr,
    received_at: Timestamp,
) -> PingResult<PingReply> {
    let timestamp_bytes: [u8; TIMESTAMP_SIZE] = data
        .get(..TIMESTAMP_SIZE)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| {
            PingError::Decode(format!("echo data of {} bytes holds no timestamp", data.len()))
        })?;
    let sent_at = Timestamp::from_be_bytes(timestamp_bytes);
    Ok(PingReply {
        source,
        package_size: data.len(),
        ttl,
        identifier,
        sequence_number: sequence_number.into(),
        rtt: received_at.saturating_duration_since(sent_at),
    })
}
