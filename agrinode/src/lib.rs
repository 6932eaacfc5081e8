//! # agrinode
//!
//! Reliable still-image transfer from serial-attached camera modules on an
//! edge agricultural-monitoring node.
//!
//! The camera streams an image as COBS-framed packets of 100 bytes over a
//! slow, lossy serial link. This crate turns that stream into a complete,
//! ordered image buffer:
//!
//! - COBS frame decoding with resynchronisation on the `0x00` delimiter
//! - Packet parsing (kind, four decimal-digit index, payload)
//! - Index-addressed reassembly with selective retransmission
//! - Session timeouts and whole-session retries with USB power cycling
//!
//! ## Features
//!
//! - `native` (default): serial links via the `serialport` crate
//! - `serde`: Serialization support for configuration and port types
//!
//! ## Example
//!
//! ```rust,no_run
//! use agrinode::{NativeConnector, SerialConfig, SysfsUsbPower, TransferConfig, acquire_image};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut camera = NativeConnector::new(SerialConfig::new("/dev/ttyUSB_1", 115200));
//!     let power = SysfsUsbPower::new("1-1")?;
//!
//!     let image = acquire_image(&mut camera, power, TransferConfig::default())?;
//!     std::fs::write("capture.jpg", &image.bytes)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod port;
pub mod protocol;
pub mod transfer;
pub mod usb;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::{NativeConnector, NativePort, NativePortEnumerator};
pub use {
    error::{Error, Result},
    port::{Connector, Port, PortEnumerator, PortInfo, SerialConfig},
    protocol::{HostCommand, Packet, PacketKind},
    transfer::{
        Acquired, ImageSession, RecoveryManager, RetransmitController, TransferConfig,
        TransferState, acquire_image,
    },
    usb::{NoUsbPower, SysfsUsbPower, UsbPower},
};
