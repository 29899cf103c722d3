//! Framing of packets on the forwarder link.
//!
//! Each datagram is one packet: a type byte followed by the packet's wire
//! encoding. Response bodies are framed as-is, so an already encoded packet
//! (a stored certificate) goes out byte for byte.

use fieldnode_types::{Data, Interest};

use crate::NetworkError;

/// Largest datagram accepted or produced.
pub const MAX_PACKET_SIZE: usize = 8800;

const INTEREST_TYPE: u8 = 0x05;
const DATA_TYPE: u8 = 0x06;

/// A decoded datagram.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    Interest(Interest),
    Data(Data),
}

impl Packet {
    pub fn encode(&self) -> Result<Vec<u8>, NetworkError> {
        match self {
            Self::Interest(interest) => frame(INTEREST_TYPE, &interest.wire_encode()?),
            Self::Data(data) => frame(DATA_TYPE, &data.wire_encode()?),
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NetworkError> {
        if bytes.len() > MAX_PACKET_SIZE {
            return Err(NetworkError::PacketTooLarge {
                size: bytes.len(),
                max: MAX_PACKET_SIZE,
            });
        }
        match bytes.split_first() {
            Some((&INTEREST_TYPE, body)) => Ok(Self::Interest(Interest::wire_decode(body)?)),
            Some((&DATA_TYPE, body)) => Ok(Self::Data(Data::wire_decode(body)?)),
            Some((other, _)) => Err(NetworkError::Malformed(format!(
                "unknown packet type {other:#04x}"
            ))),
            None => Err(NetworkError::Malformed("empty datagram".into())),
        }
    }
}

/// Frame an already encoded response packet.
pub fn frame_data(wire: &[u8]) -> Result<Vec<u8>, NetworkError> {
    frame(DATA_TYPE, wire)
}

fn frame(packet_type: u8, body: &[u8]) -> Result<Vec<u8>, NetworkError> {
    let size = body.len() + 1;
    if size > MAX_PACKET_SIZE {
        return Err(NetworkError::PacketTooLarge {
            size,
            max: MAX_PACKET_SIZE,
        });
    }
    let mut out = Vec::with_capacity(size);
    out.push(packet_type);
    out.extend_from_slice(body);
    Ok(out)
}
