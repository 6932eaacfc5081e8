//! Index-addressed reassembly buffer.
//!
//! Sized once from the session's `Info` packet: `packet_count` slots of
//! `packet_size` bytes each, plus a parallel received map. The `Finish`
//! payload is not indexed; it is appended after the last slot.

use crate::error::{Error, Result};

/// Full payload size of an `Image` packet.
pub const PACKET_SIZE: usize = 100;

/// What happened to a payload offered to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// First correct copy for this slot.
    Stored,
    /// Slot already held data; overwritten with the new copy.
    Rewritten,
    /// Payload length was not `packet_size`; nothing written.
    WrongSize,
}

/// Image bytes being filled in by packet index.
#[derive(Debug, Clone)]
pub struct ReassemblyBuffer {
    packet_size: usize,
    data: Vec<u8>,
    received: Vec<bool>,
    received_count: usize,
}

impl ReassemblyBuffer {
    /// Allocate `packet_count` zeroed slots of `packet_size` bytes.
    pub fn new(packet_count: usize, packet_size: usize) -> Self {
        Self {
            packet_size,
            data: vec![0; packet_count * packet_size],
            received: vec![false; packet_count],
            received_count: 0,
        }
    }

    /// Number of indexed slots.
    pub fn packet_count(&self) -> usize {
        self.received.len()
    }

    /// Expected payload size per slot.
    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// Slots holding a correct copy.
    pub fn received_count(&self) -> usize {
        self.received_count
    }

    /// Whether slot `index` holds a correct copy.
    pub fn is_received(&self, index: usize) -> bool {
        self.received.get(index).copied().unwrap_or(false)
    }

    /// Write `payload` into slot `index` if it has the full slot size.
    pub fn place(&mut self, index: usize, payload: &[u8]) -> Result<Placement> {
        if index >= self.packet_count() {
            return Err(Error::ProtocolViolation(format!(
                "image index {index} outside announced packet count {}",
                self.packet_count()
            )));
        }
        if payload.len() != self.packet_size {
            return Ok(Placement::WrongSize);
        }

        let start = index * self.packet_size;
        self.data[start..start + self.packet_size].copy_from_slice(payload);

        if self.received[index] {
            Ok(Placement::Rewritten)
        } else {
            self.received[index] = true;
            self.received_count += 1;
            Ok(Placement::Stored)
        }
    }

    /// Append the unindexed tail of the image.
    pub fn append_tail(&mut self, tail: &[u8]) {
        self.data.extend_from_slice(tail);
    }

    /// Lowest slot without a correct copy.
    pub fn first_missing(&self) -> Option<usize> {
        self.received.iter().position(|r| !r)
    }

    /// Whether every slot holds a correct copy.
    pub fn is_complete(&self) -> bool {
        self.received_count == self.packet_count()
    }

    /// Total image length so far: all slots plus the tail.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image has no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the image bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Take the image bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_sized_by_count() {
        let buf = ReassemblyBuffer::new(3, PACKET_SIZE);
        assert_eq!(buf.len(), 300);
        assert_eq!(buf.packet_count(), 3);
        assert_eq!(buf.first_missing(), Some(0));
        assert!(!buf.is_complete());
    }

    #[test]
    fn test_place_writes_at_index_offset() {
        let mut buf = ReassemblyBuffer::new(3, 4);
        assert_eq!(buf.place(1, &[1, 2, 3, 4]).unwrap(), Placement::Stored);

        assert_eq!(buf.as_bytes(), &[0, 0, 0, 0, 1, 2, 3, 4, 0, 0, 0, 0]);
        assert!(buf.is_received(1));
        assert_eq!(buf.first_missing(), Some(0));
    }

    #[test]
    fn test_wrong_size_leaves_slot_untouched() {
        let mut buf = ReassemblyBuffer::new(2, 4);
        assert_eq!(buf.place(0, &[9, 9]).unwrap(), Placement::WrongSize);
        assert_eq!(buf.as_bytes(), &[0; 8]);
        assert!(!buf.is_received(0));
    }

    #[test]
    fn test_redelivery_is_idempotent() {
        let mut buf = ReassemblyBuffer::new(2, 2);
        buf.place(0, &[5, 6]).unwrap();
        assert_eq!(buf.place(0, &[5, 6]).unwrap(), Placement::Rewritten);
        assert_eq!(buf.received_count(), 1);
        assert_eq!(&buf.as_bytes()[..2], &[5, 6]);
    }

    #[test]
    fn test_out_of_range_index_is_violation() {
        let mut buf = ReassemblyBuffer::new(2, 2);
        assert!(matches!(
            buf.place(2, &[0, 0]),
            Err(Error::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_tail_appends_after_slots() {
        let mut buf = ReassemblyBuffer::new(1, 2);
        buf.place(0, &[1, 2]).unwrap();
        buf.append_tail(&[3]);
        assert_eq!(buf.into_bytes(), vec![1, 2, 3]);
    }

    #[test]
    fn test_zero_packets_is_complete() {
        let buf = ReassemblyBuffer::new(0, PACKET_SIZE);
        assert!(buf.is_complete());
        assert!(buf.is_empty());
        assert_eq!(buf.first_missing(), None);
    }
}
