//! Camera wire protocol: framing, packets and host commands.

pub mod command;
pub mod frame;
pub mod packet;

// Re-export common types
pub use command::HostCommand;
pub use frame::{FrameReader, decode_frame, encode_frame};
pub use packet::{Packet, PacketKind, decode_index, encode_index};
