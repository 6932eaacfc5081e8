//! USB power control for wedged camera modules.
//!
//! Linux exposes per-device unbind/bind hooks on the generic USB driver:
//! writing a bus path such as `1-1` to `/sys/bus/usb/drivers/usb/unbind`
//! powers the device's port down, and writing it to `bind` brings it back.
//! Both files are root-only; run as root or grant write access via udev.

use crate::error::{Error, Result};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Default sysfs directory of the generic USB device driver.
pub const DEFAULT_DRIVER_DIR: &str = "/sys/bus/usb/drivers/usb";

/// Controls power to one USB device.
pub trait UsbPower {
    /// Detach the device from its driver.
    fn unbind(&mut self) -> Result<()>;

    /// Reattach the device to its driver.
    fn bind(&mut self) -> Result<()>;

    /// Unbind, wait `off`, bind, wait `settle`.
    ///
    /// Binding is attempted even if unbinding failed; the first error wins.
    fn power_cycle(&mut self, off: Duration, settle: Duration) -> Result<()> {
        let unbound = self.unbind();
        thread::sleep(off);
        let bound = self.bind();
        thread::sleep(settle);
        unbound.and(bound)
    }
}

impl<U: UsbPower + ?Sized> UsbPower for &mut U {
    fn unbind(&mut self) -> Result<()> {
        (**self).unbind()
    }

    fn bind(&mut self) -> Result<()> {
        (**self).bind()
    }

    fn power_cycle(&mut self, off: Duration, settle: Duration) -> Result<()> {
        (**self).power_cycle(off, settle)
    }
}

/// Power control through the sysfs driver bind/unbind files.
#[derive(Debug, Clone)]
pub struct SysfsUsbPower {
    bus_path: String,
    driver_dir: PathBuf,
}

impl SysfsUsbPower {
    /// Control the device at `bus_path` (e.g. `1-1` or `1-1.3`).
    pub fn new(bus_path: impl Into<String>) -> Result<Self> {
        let bus_path = bus_path.into();
        if !is_valid_bus_path(&bus_path) {
            return Err(Error::Config(format!("invalid USB bus path '{bus_path}'")));
        }
        Ok(Self {
            bus_path,
            driver_dir: PathBuf::from(DEFAULT_DRIVER_DIR),
        })
    }

    /// Use a different driver directory.
    #[must_use]
    pub fn with_driver_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.driver_dir = dir.into();
        self
    }

    /// The bus path being controlled.
    pub fn bus_path(&self) -> &str {
        &self.bus_path
    }

    fn write_hook(&self, hook: &str) -> Result<()> {
        let path = self.driver_dir.join(hook);
        debug!("Writing {} to {}", self.bus_path, path.display());
        fs::write(&path, self.bus_path.as_bytes()).map_err(|e| {
            Error::UsbPower(format!("{hook} {} via {}: {e}", self.bus_path, path.display()))
        })
    }

    /// The driver directory in use.
    pub fn driver_dir(&self) -> &Path {
        &self.driver_dir
    }
}

impl UsbPower for SysfsUsbPower {
    fn unbind(&mut self) -> Result<()> {
        self.write_hook("unbind")
    }

    fn bind(&mut self) -> Result<()> {
        self.write_hook("bind")
    }
}

/// Power control for setups where the camera cannot be power-cycled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUsbPower;

impl UsbPower for NoUsbPower {
    fn unbind(&mut self) -> Result<()> {
        Ok(())
    }

    fn bind(&mut self) -> Result<()> {
        Ok(())
    }

    fn power_cycle(&mut self, _off: Duration, _settle: Duration) -> Result<()> {
        debug!("USB power control disabled; skipping power cycle");
        Ok(())
    }
}

/// Bus paths look like `<bus>-<port>[.<port>...]`, all numeric.
fn is_valid_bus_path(path: &str) -> bool {
    let Some((bus, ports)) = path.split_once('-') else {
        return false;
    };
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    numeric(bus) && ports.split('.').all(numeric)
}
