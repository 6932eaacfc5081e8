//! Session orchestrator: one request → receive → acknowledge cycle.
//!
//! ```text
//! host                                camera
//!  | open link, wait settle delay       |
//!  |---------------- S ---------------->|
//!  |<------------- Info(n) -------------|
//!  |<---------- Image(0..n-1) ----------|
//!  |<------------- Finish --------------|
//!  |--------------- R<i> -------------->|   (per completion check)
//!  |<------------- Image(i) ------------|
//!  |---------------- E ---------------->|
//! ```

use crate::error::{Error, Result};
use crate::port::{Connector, Port};
use crate::protocol::{FrameReader, HostCommand, Packet};
use crate::transfer::controller::RetransmitController;
use crate::transfer::reassembly::PACKET_SIZE;
use log::{debug, info, warn};
use std::thread;
use std::time::{Duration, Instant};

/// Delay after opening the link before the camera accepts commands.
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Overall budget for one session, measured from the image request.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(50);

/// Whole-session attempts before giving up.
pub const MAX_ATTEMPTS: usize = 3;

/// How long the USB device stays unbound during a power cycle.
pub const POWER_OFF_DELAY: Duration = Duration::from_secs(1);

/// How long to wait for the device to re-enumerate after rebinding.
pub const POWER_ON_DELAY: Duration = Duration::from_secs(5);

/// Timing and sizing for image transfers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Full `Image` payload size.
    pub packet_size: usize,
    /// Wait between opening the link and requesting the image.
    pub settle_delay: Duration,
    /// Overall budget for one session.
    pub session_timeout: Duration,
    /// Whole-session attempts made by recovery.
    pub max_attempts: usize,
    /// USB unbind → bind gap.
    pub power_off_delay: Duration,
    /// Wait after rebinding USB.
    pub power_on_delay: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            packet_size: PACKET_SIZE,
            settle_delay: SETTLE_DELAY,
            session_timeout: SESSION_TIMEOUT,
            max_attempts: MAX_ATTEMPTS,
            power_off_delay: POWER_OFF_DELAY,
            power_on_delay: POWER_ON_DELAY,
        }
    }
}

impl TransferConfig {
    /// Set the post-open settle delay.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the overall session budget.
    #[must_use]
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Set the number of whole-session attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set both power-cycle delays.
    #[must_use]
    pub fn with_power_cycle_delays(mut self, off: Duration, on: Duration) -> Self {
        self.power_off_delay = off;
        self.power_on_delay = on;
        self
    }
}

/// Runs single image-transfer sessions.
#[derive(Debug, Clone, Default)]
pub struct ImageSession {
    config: TransferConfig,
}

impl ImageSession {
    /// Create a session runner.
    pub fn new(config: TransferConfig) -> Self {
        Self { config }
    }

    /// The configuration in use.
    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Open a link, transfer one image, and close the link again.
    ///
    /// The link is closed on every exit path.
    ///
    /// # Arguments
    ///
    /// * `connector` - Opens the link to the camera
    /// * `progress` - Called with (received, total) image packets
    pub fn run<C, F>(&self, connector: &mut C, progress: F) -> Result<Vec<u8>>
    where
        C: Connector + ?Sized,
        F: FnMut(usize, usize),
    {
        let mut port = connector.connect()?;
        let result = self.transfer(&mut port, progress);

        if let Err(e) = port.close() {
            warn!("Failed to close {}: {e}", port.name());
        }

        result
    }

    /// Transfer one image over an already-open link.
    pub fn transfer<P, F>(&self, port: &mut P, mut progress: F) -> Result<Vec<u8>>
    where
        P: Port + ?Sized,
        F: FnMut(usize, usize),
    {
        thread::sleep(self.config.settle_delay);
        port.clear_buffers()?;

        send(port, HostCommand::RequestImage)?;
        info!("Requested image on {}", port.name());

        let deadline = Instant::now() + self.config.session_timeout;
        let mut reader = FrameReader::new();
        let mut controller = RetransmitController::new(self.config.packet_size);
        let mut last_received = 0;

        loop {
            let packet = match reader.read_frame(port, deadline) {
                Ok(raw) => Packet::from_frame(&raw),
                Err(e) if e.is_packet_error() => {
                    debug!("{e}");
                    Packet::error()
                },
                Err(Error::Timeout(_)) => return Err(self.timeout_error(&controller)),
                Err(e) => return Err(e),
            };

            for command in controller.handle(packet)? {
                send(port, command)?;
            }

            let (received, total) = controller.progress();
            if received != last_received {
                progress(received, total);
                last_received = received;
            }

            if controller.is_done() {
                break;
            }
            if Instant::now() >= deadline {
                return Err(self.timeout_error(&controller));
            }
        }

        let image = controller
            .into_image()
            .ok_or_else(|| Error::ProtocolViolation("session ended without an image".into()))?;
        info!("Received image of {} bytes", image.len());
        Ok(image)
    }

    fn timeout_error(&self, controller: &RetransmitController) -> Error {
        let (received, total) = controller.progress();
        Error::Timeout(format!(
            "image transfer exceeded {:?} in {:?} ({received}/{total} packets)",
            self.config.session_timeout,
            controller.state()
        ))
    }
}

fn send<P: Port + ?Sized>(port: &mut P, command: HostCommand) -> Result<()> {
    debug!("-> {command}");
    port.write_all_bytes(&command.encode())
}
