//! Error types for agrinode.

use std::io;
use thiserror::Error;

/// Result type for agrinode operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for agrinode operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial link, sysfs writes).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// A received frame is not valid COBS.
    #[error("Frame decode failed: {0}")]
    FrameDecode(String),

    /// A decoded frame is too short to carry a packet header.
    #[error("Packet too short: {len} bytes")]
    PacketLength {
        /// Decoded frame length.
        len: usize,
    },

    /// The kind byte of a decoded frame is not a known packet kind.
    #[error("Unknown packet kind: {0}")]
    UnknownPacketKind(u8),

    /// The device sent packets out of the expected order.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Communication timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// A sequence index does not fit the four-digit wire field.
    #[error("Index {0} does not fit in four decimal digits")]
    InvalidIndex(u32),

    /// USB power control failed.
    #[error("USB power control failed: {0}")]
    UsbPower(String),

    /// Every acquisition attempt failed.
    #[error("Image acquisition failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: usize,
        /// Error of the final attempt.
        last: Box<Error>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error came from the serial link itself.
    pub fn is_link_error(&self) -> bool {
        match self {
            Self::Io(_) => true,
            #[cfg(feature = "native")]
            Self::Serial(_) => true,
            _ => false,
        }
    }

    /// Whether this error only spoils a single packet rather than the session.
    pub fn is_packet_error(&self) -> bool {
        matches!(
            self,
            Self::FrameDecode(_) | Self::PacketLength { .. } | Self::UnknownPacketKind(_)
        )
    }
}
