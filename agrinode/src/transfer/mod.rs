//! Reliable image transfer: reassembly, retransmission, sessions, recovery.

pub mod controller;
pub mod reassembly;
pub mod recovery;
pub mod session;

pub use controller::{RetransmitController, TransferState};
pub use reassembly::{PACKET_SIZE, Placement, ReassemblyBuffer};
pub use recovery::{Acquired, RecoveryManager, acquire_image};
pub use session::{ImageSession, TransferConfig};
