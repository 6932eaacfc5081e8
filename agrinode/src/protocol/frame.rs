//! Sentinel-delimited COBS framing.
//!
//! The camera wraps every packet in Consistent Overhead Byte Stuffing so that
//! `0x00` never appears inside a frame; `0x00` on the wire therefore always
//! marks a frame boundary and the receiver resynchronises on the next one
//! after any corruption.
//!
//! ```text
//! wire:    | COBS(packet) ... | 0x00 | COBS(packet) ... | 0x00 |
//! ```

use crate::error::{Error, Result};
use log::trace;
use std::io::{ErrorKind, Read};
use std::thread;
use std::time::{Duration, Instant};

/// Frame delimiter.
pub const FRAME_DELIMITER: u8 = 0x00;

/// Pause after a read that returned no bytes and no timeout.
const EMPTY_READ_BACKOFF: Duration = Duration::from_millis(10);

/// Largest encoded frame accepted before the reader gives up on it.
///
/// A full image packet is 105 decoded bytes; anything far beyond that is line
/// noise that lost its delimiter.
pub const MAX_FRAME_LEN: usize = 1024;

/// COBS-decode one frame (without its delimiter).
pub fn decode_frame(encoded: &[u8]) -> Result<Vec<u8>> {
    cobs::decode_vec(encoded)
        .map_err(|_| Error::FrameDecode(format!("malformed COBS frame of {} bytes", encoded.len())))
}

/// COBS-encode `data` and append the delimiter.
pub fn encode_frame(data: &[u8]) -> Vec<u8> {
    let mut frame = cobs::encode_vec(data);
    frame.push(FRAME_DELIMITER);
    frame
}

/// Pulls delimiter-terminated frames off a byte link one byte at a time.
#[derive(Debug)]
pub struct FrameReader {
    max_len: usize,
    buf: Vec<u8>,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    /// Create a reader with the default frame length limit.
    pub fn new() -> Self {
        Self::with_max_len(MAX_FRAME_LEN)
    }

    /// Create a reader with a custom frame length limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len,
            buf: Vec::with_capacity(max_len.min(256)),
        }
    }

    /// Read the next encoded frame, excluding the delimiter.
    ///
    /// Read timeouts on the link are not errors: the reader keeps waiting
    /// until `deadline`, then fails with [`Error::Timeout`]. A frame longer
    /// than the limit is consumed up to its delimiter and reported as
    /// [`Error::FrameDecode`].
    pub fn read_frame<R: Read + ?Sized>(
        &mut self,
        port: &mut R,
        deadline: Instant,
    ) -> Result<Vec<u8>> {
        self.buf.clear();
        let mut overflowed = false;
        let mut byte = [0u8; 1];

        loop {
            if Instant::now() >= deadline {
                return Err(Error::Timeout(format!(
                    "no frame delimiter before deadline ({} bytes pending)",
                    self.buf.len()
                )));
            }

            match port.read(&mut byte) {
                Ok(1) => {
                    if byte[0] == FRAME_DELIMITER {
                        break;
                    }
                    if self.buf.len() < self.max_len {
                        self.buf.push(byte[0]);
                    } else {
                        overflowed = true;
                    }
                },
                // End of stream on a link that stays open; back off instead of spinning.
                Ok(_) => thread::sleep(EMPTY_READ_BACKOFF),
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {},
                Err(e) => return Err(Error::Io(e)),
            }
        }

        if overflowed {
            return Err(Error::FrameDecode(format!(
                "frame exceeded {} bytes",
                self.max_len
            )));
        }

        trace!("Frame of {} encoded bytes", self.buf.len());
        Ok(std::mem::take(&mut self.buf))
    }
}
