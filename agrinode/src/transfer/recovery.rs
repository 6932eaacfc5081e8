//! Recovery manager: bounded whole-session retries with USB power cycling.
//!
//! A wedged camera usually stops answering altogether, and reopening the
//! serial port does not help; dropping its USB binding and re-enumerating
//! does. Every failed attempt is therefore followed by a power cycle.

use crate::error::{Error, Result};
use crate::port::Connector;
use crate::transfer::session::{ImageSession, TransferConfig};
use crate::usb::UsbPower;
use log::{info, warn};

/// A successfully transferred image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquired {
    /// Image bytes.
    pub bytes: Vec<u8>,
    /// Attempt that succeeded (1-based).
    pub attempts: usize,
}

/// Retries image sessions and power-cycles the camera between them.
pub struct RecoveryManager<U: UsbPower> {
    session: ImageSession,
    power: U,
}

impl<U: UsbPower> RecoveryManager<U> {
    /// Create a manager with the given transfer settings and power control.
    pub fn new(config: TransferConfig, power: U) -> Self {
        Self {
            session: ImageSession::new(config),
            power,
        }
    }

    /// The power control in use.
    pub fn power(&self) -> &U {
        &self.power
    }

    /// Acquire one image, retrying failed sessions.
    ///
    /// # Arguments
    ///
    /// * `connector` - Opens a fresh link for each attempt
    /// * `progress` - Called with (received, total) image packets
    pub fn acquire<C, F>(&mut self, connector: &mut C, mut progress: F) -> Result<Acquired>
    where
        C: Connector + ?Sized,
        F: FnMut(usize, usize),
    {
        let config = self.session.config().clone();
        let max_attempts = config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                info!("Image attempt {attempt}/{max_attempts}");
            }

            match self.session.run(connector, &mut progress) {
                Ok(bytes) => return Ok(Acquired { bytes, attempts: attempt }),
                Err(e) => {
                    warn!("Image attempt {attempt}/{max_attempts} failed: {e}");
                    last_error = Some(e);
                },
            }

            info!("Power-cycling camera");
            if let Err(e) = self
                .power
                .power_cycle(config.power_off_delay, config.power_on_delay)
            {
                warn!("Power cycle failed: {e}");
            }
        }

        Err(Error::RetriesExhausted {
            attempts: max_attempts,
            last: Box::new(last_error.unwrap_or(Error::Timeout("no attempt made".into()))),
        })
    }
}

/// Acquire one image with retries and power cycling.
///
/// This is the entry point for capture code: it owns no state between calls
/// and never leaves the link open.
pub fn acquire_image<C, U>(connector: &mut C, power: U, config: TransferConfig) -> Result<Acquired>
where
    C: Connector + ?Sized,
    U: UsbPower,
{
    RecoveryManager::new(config, power).acquire(connector, |_, _| {})
}
