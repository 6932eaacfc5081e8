//! Retransmission controller: the receive-side state machine of one session.
//!
//! ```text
//!            Info                 Finish             all received,
//! WaitInfo ────────► Receiving ──────────► Finishing ─────────────► Done
//!                                            │  ▲    nothing pending
//!                                            └──┘ resend requests
//! ```
//!
//! The controller does no I/O. Each packet goes through [`handle`], which
//! returns the commands the session must send back to the camera.
//!
//! Once `Finish` has arrived, every processed packet triggers a completion
//! check that requests at most the *lowest* missing slot but *every* slot
//! that arrived with the wrong size. The firmware only ever ships one missing
//! packet per check, so asking for more would just queue duplicate traffic on
//! the slow link.
//!
//! [`handle`]: RetransmitController::handle

use crate::error::{Error, Result};
use crate::protocol::{HostCommand, Packet, PacketKind};
use crate::transfer::reassembly::{Placement, ReassemblyBuffer};
use log::{debug, trace, warn};
use std::collections::BTreeSet;

/// Where a session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Waiting for the `Info` packet that sizes the buffer.
    WaitInfo,
    /// Collecting `Image` packets.
    Receiving,
    /// `Finish` seen; chasing missing and corrupt slots.
    Finishing,
    /// Completion acknowledged; the image is whole.
    Done,
}

/// Tracks one image transfer and decides what to resend.
#[derive(Debug)]
pub struct RetransmitController {
    packet_size: usize,
    state: TransferState,
    buffer: Option<ReassemblyBuffer>,
    pending_resend: BTreeSet<u32>,
}

impl RetransmitController {
    /// Create a controller expecting `packet_size`-byte image payloads.
    pub fn new(packet_size: usize) -> Self {
        Self {
            packet_size,
            state: TransferState::WaitInfo,
            buffer: None,
            pending_resend: BTreeSet::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Whether completion has been acknowledged.
    pub fn is_done(&self) -> bool {
        self.state == TransferState::Done
    }

    /// Slots seen with the wrong payload size and not yet repaired.
    pub fn pending_resend(&self) -> &BTreeSet<u32> {
        &self.pending_resend
    }

    /// The buffer, once `Info` has arrived.
    pub fn buffer(&self) -> Option<&ReassemblyBuffer> {
        self.buffer.as_ref()
    }

    /// `(received, total)` slot counts; `(0, 0)` before `Info`.
    pub fn progress(&self) -> (usize, usize) {
        self.buffer
            .as_ref()
            .map_or((0, 0), |b| (b.received_count(), b.packet_count()))
    }

    /// Feed one packet; returns the commands to send, in order.
    pub fn handle(&mut self, packet: Packet) -> Result<Vec<HostCommand>> {
        trace!(
            "{} packet idx={} len={} in {:?}",
            packet.kind,
            packet.index,
            packet.payload.len(),
            self.state
        );

        match self.state {
            TransferState::Done => {
                debug!("Ignoring {} packet after completion", packet.kind);
                return Ok(Vec::new());
            },
            TransferState::WaitInfo => self.handle_before_info(&packet)?,
            TransferState::Receiving | TransferState::Finishing => self.handle_packet(packet)?,
        }

        if self.state == TransferState::Finishing {
            Ok(self.completion_check())
        } else {
            Ok(Vec::new())
        }
    }

    fn handle_before_info(&mut self, packet: &Packet) -> Result<()> {
        match packet.kind {
            PacketKind::Info => {
                let count = packet.index as usize;
                debug!("Info: expecting {count} image packets");
                self.buffer = Some(ReassemblyBuffer::new(count, self.packet_size));
                self.state = TransferState::Receiving;
                Ok(())
            },
            PacketKind::Error => {
                debug!("Bad packet while waiting for Info");
                Ok(())
            },
            PacketKind::Image | PacketKind::Finish => Err(Error::ProtocolViolation(format!(
                "{} packet before Info",
                packet.kind
            ))),
        }
    }

    fn handle_packet(&mut self, packet: Packet) -> Result<()> {
        let Some(buffer) = self.buffer.as_mut() else {
            return Err(Error::ProtocolViolation("no buffer allocated".into()));
        };

        match packet.kind {
            PacketKind::Info => {
                if packet.index as usize == buffer.packet_count() {
                    debug!("Repeated Info packet ignored");
                    Ok(())
                } else {
                    Err(Error::ProtocolViolation(format!(
                        "Info announced {} packets, then {}",
                        buffer.packet_count(),
                        packet.index
                    )))
                }
            },
            PacketKind::Image => {
                match buffer.place(packet.index as usize, &packet.payload)? {
                    Placement::Stored | Placement::Rewritten => {
                        if self.pending_resend.remove(&packet.index) {
                            debug!("Slot {} repaired", packet.index);
                        }
                    },
                    Placement::WrongSize => {
                        debug!(
                            "Slot {} arrived with {} bytes, expected {}",
                            packet.index,
                            packet.payload.len(),
                            self.packet_size
                        );
                        self.pending_resend.insert(packet.index);
                    },
                }
                Ok(())
            },
            PacketKind::Finish => {
                if self.state == TransferState::Finishing {
                    debug!("Repeated Finish packet ignored");
                } else {
                    debug!("Finish: {} tail bytes", packet.payload.len());
                    buffer.append_tail(&packet.payload);
                    self.state = TransferState::Finishing;
                }
                Ok(())
            },
            PacketKind::Error => {
                warn!("Camera sent an unusable packet");
                Ok(())
            },
        }
    }

    fn completion_check(&mut self) -> Vec<HostCommand> {
        let first_missing = self
            .buffer
            .as_ref()
            .and_then(ReassemblyBuffer::first_missing)
            .and_then(|i| u32::try_from(i).ok());

        let mut commands: Vec<HostCommand> = first_missing
            .into_iter()
            .map(HostCommand::Resend)
            .collect();
        commands.extend(
            self.pending_resend
                .iter()
                .filter(|&&i| Some(i) != first_missing)
                .map(|&i| HostCommand::Resend(i)),
        );

        if first_missing.is_none() && self.pending_resend.is_empty() {
            debug!("All packets received");
            commands.push(HostCommand::Complete);
            self.state = TransferState::Done;
        }

        commands
    }

    /// The finished image, if the session reached [`TransferState::Done`].
    pub fn into_image(self) -> Option<Vec<u8>> {
        if self.state == TransferState::Done {
            self.buffer.map(ReassemblyBuffer::into_bytes)
        } else {
            None
        }
    }
}
