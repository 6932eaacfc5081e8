//! Camera packet model.
//!
//! ## Packet Format (after COBS decoding)
//!
//! ```text
//! +------+----+----+----+----+----------------------+
//! | KIND | D0 | D1 | D2 | D3 |       PAYLOAD        |
//! +------+----+----+----+----+----------------------+
//! |  1   |  1 |  1 |  1 |  1 |   0..N (100 image)   |
//! +------+----+----+----+----+----------------------+
//! ```
//!
//! `D0..D3` each hold one decimal digit (values 0-9, not ASCII), most
//! significant first, so the index is `D0*1000 + D1*100 + D2*10 + D3`. For an
//! `Info` packet the same field carries the total number of image packets.

use crate::error::{Error, Result};
use crate::protocol::frame::decode_frame;
use log::debug;
use std::fmt;

/// Length of the kind + index header.
pub const HEADER_LEN: usize = 5;

/// Largest value the four-digit index field can carry.
pub const MAX_INDEX: u32 = 9999;

/// Packet kinds sent by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketKind {
    /// Session header; the index field is the packet count.
    Info = 0,
    /// One fixed-size slice of the image.
    Image = 1,
    /// Final, possibly short, tail of the image.
    Finish = 2,
    /// The device (or the frame decoder) flagged a bad packet.
    Error = 3,
}

impl TryFrom<u8> for PacketKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(PacketKind::Info),
            1 => Ok(PacketKind::Image),
            2 => Ok(PacketKind::Finish),
            3 => Ok(PacketKind::Error),
            other => Err(Error::UnknownPacketKind(other)),
        }
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Info => "Info",
            Self::Image => "Image",
            Self::Finish => "Finish",
            Self::Error => "Error",
        };
        f.write_str(name)
    }
}

/// Compose the index from its four decimal-digit bytes.
pub fn decode_index(digits: [u8; 4]) -> u32 {
    digits
        .iter()
        .fold(0, |acc, &d| acc * 10 + u32::from(d))
}

/// Split an index into four decimal-digit bytes.
pub fn encode_index(index: u32) -> Result<[u8; 4]> {
    if index > MAX_INDEX {
        return Err(Error::InvalidIndex(index));
    }
    #[allow(clippy::cast_possible_truncation)] // each digit is < 10
    Ok([
        (index / 1000) as u8,
        (index / 100 % 10) as u8,
        (index / 10 % 10) as u8,
        (index % 10) as u8,
    ])
}

/// One decoded camera packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Packet kind.
    pub kind: PacketKind,
    /// Sequence index (packet count for `Info`).
    pub index: u32,
    /// Bytes following the header.
    pub payload: Vec<u8>,
}

impl Packet {
    /// Build an `Info` packet announcing `packet_count` image packets.
    pub fn info(packet_count: u32) -> Self {
        Self {
            kind: PacketKind::Info,
            index: packet_count,
            payload: Vec::new(),
        }
    }

    /// Build an `Image` packet.
    pub fn image(index: u32, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: PacketKind::Image,
            index,
            payload: payload.into(),
        }
    }

    /// Build a `Finish` packet carrying the image tail.
    pub fn finish(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: PacketKind::Finish,
            index: 0,
            payload: payload.into(),
        }
    }

    /// The placeholder for a packet that could not be decoded.
    pub fn error() -> Self {
        Self {
            kind: PacketKind::Error,
            index: 0,
            payload: Vec::new(),
        }
    }

    /// Total image packets announced by an `Info` packet.
    ///
    /// The wire reuses the index field for this, so it is only meaningful
    /// for `Info`.
    pub fn packet_count(&self) -> Option<u32> {
        (self.kind == PacketKind::Info).then_some(self.index)
    }

    /// Parse a COBS-decoded frame.
    pub fn parse(decoded: &[u8]) -> Result<Self> {
        if decoded.len() < HEADER_LEN {
            return Err(Error::PacketLength { len: decoded.len() });
        }

        let kind = PacketKind::try_from(decoded[0])?;
        let index = decode_index([decoded[1], decoded[2], decoded[3], decoded[4]]);

        Ok(Self {
            kind,
            index,
            payload: decoded[HEADER_LEN..].to_vec(),
        })
    }

    /// Decode and parse a raw frame, degrading any failure to [`Packet::error`].
    ///
    /// A single corrupt frame must not interrupt the receive loop; the
    /// retransmission logic recovers the lost data later.
    pub fn from_frame(encoded: &[u8]) -> Self {
        match decode_frame(encoded).and_then(|decoded| Self::parse(&decoded)) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Dropping bad frame: {e}");
                Self::error()
            },
        }
    }

    /// Serialize header and payload (before COBS framing).
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.push(self.kind as u8);
        buf.extend_from_slice(&encode_index(self.index)?);
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }
}
