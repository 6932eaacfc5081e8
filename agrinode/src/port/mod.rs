//! Byte-link abstraction between the transfer protocol and the hardware.
//!
//! The protocol layer only ever sees a [`Port`]: a blocking byte stream with a
//! per-read timeout. Production code uses the `serialport` backed
//! [`NativePort`]; tests drive the same code with scripted in-memory links.
//!
//! ```text
//! +---------------------------+
//! | ImageSession / Recovery   |
//! +-------------+-------------+
//!               |
//!               v
//! +-------------+-------------+
//! |        Port trait         |
//! +------+-------------+------+
//!        |             |
//!        v             v
//! +------+-----+ +-----+------+
//! | NativePort | | fake links |
//! | (serialport)| |  (tests)  |
//! +------------+ +------------+
//! ```

#[cfg(feature = "native")]
pub mod native;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Baud rate the camera firmware talks at.
pub const DEFAULT_BAUD: u32 = 115200;

/// Per-read timeout on the camera link.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Serial link configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB_1", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Timeout for a single blocking read.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD,
            timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the read timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Serial port information.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
}

impl PortInfo {
    /// Whether the port sits behind a USB bridge.
    pub fn is_usb(&self) -> bool {
        self.vid.is_some()
    }
}

/// A blocking, timeout-bounded byte link to one camera module.
///
/// Reads that hit the timeout must fail with [`std::io::ErrorKind::TimedOut`]
/// (or return `Ok(0)`); callers treat both as "nothing yet".
pub trait Port: Read + Write + Send {
    /// Discard anything buffered in either direction.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Close the port and release resources.
    ///
    /// After calling this method, the port cannot be used for further I/O.
    fn close(&mut self) -> Result<()>;

    /// Write all bytes, blocking until complete.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf)?;
        std::io::Write::flush(self)?;
        Ok(())
    }
}

/// Opens a fresh [`Port`] for every session attempt.
///
/// Recovery closes the link before power-cycling the device, so each attempt
/// needs its own handle; this is the "link factory" handed to
/// [`crate::acquire_image`].
pub trait Connector {
    /// Concrete link type produced.
    type Port: Port;

    /// Open the link.
    fn connect(&mut self) -> Result<Self::Port>;
}

/// Trait for listing available serial ports.
///
/// This is separated from `Port` because it's a static operation that
/// doesn't require an open port instance.
pub trait PortEnumerator {
    /// List all available serial ports.
    fn list_ports() -> Result<Vec<PortInfo>>;
}

#[cfg(feature = "native")]
pub use native::{NativeConnector, NativePort, NativePortEnumerator};
