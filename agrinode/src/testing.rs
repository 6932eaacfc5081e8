//! Scripted camera and power fakes shared by the transfer tests.

use crate::error::{Error, Result};
use crate::port::{Connector, Port};
use crate::protocol::{HostCommand, Packet, encode_frame};
use crate::transfer::{PACKET_SIZE, TransferConfig};
use crate::usb::UsbPower;
use std::collections::{BTreeSet, VecDeque};
use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Transfer settings with no sleeps and a short session budget.
pub(crate) fn fast_config() -> TransferConfig {
    TransferConfig::default()
        .with_settle_delay(Duration::ZERO)
        .with_session_timeout(Duration::from_millis(200))
        .with_power_cycle_delays(Duration::ZERO, Duration::ZERO)
}

/// Deterministic image bytes of the given length.
pub(crate) fn test_image(len: usize) -> Vec<u8> {
    #[allow(clippy::cast_possible_truncation)]
    (0..len).map(|i| (i * 7 + i / 100) as u8).collect()
}

/// How the camera misbehaves during one session.
#[derive(Debug, Clone, Default)]
pub(crate) struct Script {
    /// Slots left out of the initial burst.
    pub drop: BTreeSet<u32>,
    /// Slots sent short in the initial burst.
    pub truncate: BTreeSet<u32>,
    /// Slots sent twice in the initial burst.
    pub duplicate: BTreeSet<u32>,
    /// Leading undecodable frame.
    pub noise: bool,
    /// Never answers `S`.
    pub silent: bool,
    /// Sends an image slot before `Info`.
    pub image_first: bool,
    /// Never answers `R<n>`.
    pub ignore_resend: bool,
}

#[derive(Debug)]
struct CameraState {
    image: Vec<u8>,
    scripts: VecDeque<Script>,
    current: Script,
    failed_opens: usize,
    outbox: VecDeque<u8>,
    line: Vec<u8>,
    commands: Vec<HostCommand>,
    opens: usize,
    closes: usize,
}

impl CameraState {
    fn full_slots(&self) -> u32 {
        u32::try_from(self.image.len() / PACKET_SIZE).unwrap()
    }

    fn slot(&self, index: u32) -> Vec<u8> {
        let start = index as usize * PACKET_SIZE;
        self.image[start..start + PACKET_SIZE].to_vec()
    }

    fn emit(&mut self, packet: &Packet) {
        self.outbox
            .extend(encode_frame(&packet.encode().unwrap()));
    }

    fn on_command(&mut self, command: HostCommand) {
        self.commands.push(command);
        match command {
            HostCommand::RequestImage => self.send_image(),
            HostCommand::Resend(index) if !self.current.ignore_resend => {
                let payload = self.slot(index);
                self.emit(&Packet::image(index, payload));
            },
            HostCommand::Resend(_) | HostCommand::Complete => {},
        }
    }

    fn send_image(&mut self) {
        let script = self.current.clone();
        if script.silent {
            return;
        }
        if script.noise {
            self.outbox.extend([0x09, 0x01, 0x00]);
        }
        if script.image_first {
            let payload = self.slot(0);
            self.emit(&Packet::image(0, payload));
        }

        let slots = self.full_slots();
        self.emit(&Packet::info(slots));
        for index in 0..slots {
            if script.drop.contains(&index) {
                continue;
            }
            let mut payload = self.slot(index);
            if script.truncate.contains(&index) {
                payload.truncate(PACKET_SIZE - 20);
            }
            if script.duplicate.contains(&index) {
                self.emit(&Packet::image(index, payload.clone()));
            }
            self.emit(&Packet::image(index, payload));
            if script.noise && index == 0 {
                self.outbox.extend([0x02, 0x01, 0x00]);
            }
        }

        let tail = self.image[slots as usize * PACKET_SIZE..].to_vec();
        self.emit(&Packet::finish(tail));
    }
}

/// A camera module that speaks the transfer protocol from memory.
#[derive(Debug, Clone)]
pub(crate) struct FakeCamera {
    state: Arc<Mutex<CameraState>>,
}

impl FakeCamera {
    pub(crate) fn new(image: Vec<u8>) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self {
            state: Arc::new(Mutex::new(CameraState {
                image,
                scripts: VecDeque::new(),
                current: Script::default(),
                failed_opens: 0,
                outbox: VecDeque::new(),
                line: Vec::new(),
                commands: Vec::new(),
                opens: 0,
                closes: 0,
            })),
        }
    }

    /// Queue the behaviour for the next session; later sessions behave.
    pub(crate) fn with_script(self, script: Script) -> Self {
        self.lock().scripts.push_back(script);
        self
    }

    /// Fail the first `count` opens.
    pub(crate) fn with_failed_opens(self, count: usize) -> Self {
        self.lock().failed_opens = count;
        self
    }

    pub(crate) fn commands(&self) -> Vec<HostCommand> {
        self.lock().commands.clone()
    }

    pub(crate) fn opens(&self) -> usize {
        self.lock().opens
    }

    pub(crate) fn closes(&self) -> usize {
        self.lock().closes
    }

    fn lock(&self) -> MutexGuard<'_, CameraState> {
        self.state.lock().unwrap()
    }
}

impl Connector for FakeCamera {
    type Port = FakeLink;

    fn connect(&mut self) -> Result<FakeLink> {
        let mut state = self.lock();
        if state.failed_opens > 0 {
            state.failed_opens -= 1;
            return Err(Error::Io(std::io::Error::new(
                ErrorKind::NotFound,
                "no such device",
            )));
        }
        state.opens += 1;
        state.current = state.scripts.pop_front().unwrap_or_default();
        state.outbox.clear();
        state.line.clear();
        Ok(FakeLink {
            state: Arc::clone(&self.state),
            open: true,
        })
    }
}

/// One open link to a [`FakeCamera`].
pub(crate) struct FakeLink {
    state: Arc<Mutex<CameraState>>,
    open: bool,
}

impl Read for FakeLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        let mut n = 0;
        while n < buf.len() {
            match state.outbox.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                },
                None => break,
            }
        }
        if n == 0 {
            drop(state);
            std::thread::sleep(Duration::from_millis(1));
            return Err(std::io::Error::new(ErrorKind::TimedOut, "no data"));
        }
        Ok(n)
    }
}

impl Write for FakeLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut state = self.state.lock().unwrap();
        for &b in buf {
            if b == b'\n' {
                let line = String::from_utf8_lossy(&state.line).into_owned();
                state.line.clear();
                if let Some(command) = HostCommand::parse(&line) {
                    state.on_command(command);
                }
            } else {
                state.line.push(b);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Port for FakeLink {
    fn clear_buffers(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "fake-camera"
    }

    fn close(&mut self) -> Result<()> {
        if std::mem::take(&mut self.open) {
            self.state.lock().unwrap().closes += 1;
        }
        Ok(())
    }
}

/// Records power-control calls instead of touching sysfs.
#[derive(Debug, Default)]
pub(crate) struct RecordingPower {
    pub events: Vec<&'static str>,
    pub fail: bool,
}

impl RecordingPower {
    pub(crate) fn events(&self) -> Vec<&'static str> {
        self.events.clone()
    }

    fn record(&mut self, event: &'static str) -> Result<()> {
        self.events.push(event);
        if self.fail {
            Err(Error::UsbPower(format!("{event} refused")))
        } else {
            Ok(())
        }
    }
}

impl UsbPower for RecordingPower {
    fn unbind(&mut self) -> Result<()> {
        self.record("unbind")
    }

    fn bind(&mut self) -> Result<()> {
        self.record("bind")
    }
}
