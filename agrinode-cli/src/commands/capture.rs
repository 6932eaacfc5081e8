//! Image capture command.

use agrinode::{
    Acquired, Connector, NativeConnector, NoUsbPower, RecoveryManager, SysfsUsbPower,
    TransferConfig, UsbPower,
};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::{Cli, use_fancy_output};

/// Device id used in file names when none is configured.
const DEFAULT_DEVICE_ID: &str = "agrinode";

/// Options of the `capture` subcommand.
pub(crate) struct CaptureArgs<'a> {
    pub output: Option<&'a Path>,
    pub slot: Option<u8>,
    pub no_power_cycle: bool,
    pub json: bool,
}

/// A saved capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CaptureReport {
    pub path: PathBuf,
    pub bytes: usize,
    pub attempts: usize,
}

/// Acquire one image and store it as a JPEG file.
pub(crate) fn cmd_capture(cli: &Cli, config: &Config, args: &CaptureArgs<'_>) -> Result<()> {
    let Some(port) = cli.port.clone().or_else(|| config.link.port.clone()) else {
        bail!("No camera port given; use --port or set [link] port in the config file");
    };

    let slot = args
        .slot
        .or_else(|| slot_from_port(&port))
        .unwrap_or(0);

    // Resolve the destination before touching the camera.
    let output = match args.output {
        Some(path) => path.to_path_buf(),
        None => default_image_path(config, slot, &Local::now())?,
    };
    debug!("Image destination: {}", output.display());

    let serial = config.serial_config(&port, cli.baud);
    let transfer = config.transfer_config();
    let mut connector = NativeConnector::new(serial);

    let bus_path = cli
        .usb_path
        .clone()
        .or_else(|| config.link.usb_bus_path.clone());

    let mut sysfs;
    let mut none = NoUsbPower;
    let power: &mut dyn UsbPower = match bus_path {
        Some(bus) if !args.no_power_cycle => {
            sysfs = SysfsUsbPower::new(bus).context("Invalid USB bus path")?;
            if let Some(dir) = &config.link.usb_driver_dir {
                sysfs = sysfs.with_driver_dir(dir);
            }
            debug!(
                "Power cycling bus {} via {}",
                sysfs.bus_path(),
                sysfs.driver_dir().display()
            );
            &mut sysfs
        },
        Some(_) => &mut none,
        None => {
            debug!("No USB bus path configured; retries will not power-cycle the camera");
            &mut none
        },
    };

    if !cli.quiet && !args.json {
        eprintln!(
            "{} Capturing image from {}",
            style("📷").cyan(),
            style(&port).cyan()
        );
    }

    let pb = progress_bar(cli.quiet || args.json);
    let result = acquire_and_save(&mut connector, power, transfer, &output, |received, total| {
        pb.set_length(total as u64);
        pb.set_position(received as u64);
    });

    let report = match result {
        Ok(report) => {
            pb.finish_and_clear();
            report
        },
        Err(e) => {
            pb.abandon();
            error!("Capture from {port} failed: {e:#}");
            return Err(e);
        },
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else if !cli.quiet {
        eprintln!(
            "{} Saved {} bytes to {}{}",
            style("✓").green(),
            report.bytes,
            style(report.path.display()).cyan(),
            if report.attempts > 1 {
                format!(" after {} attempts", report.attempts)
            } else {
                String::new()
            }
        );
    }

    Ok(())
}

/// Acquire one image over `connector` and write it to `output`.
///
/// Nothing is written unless the transfer completes.
fn acquire_and_save<C, U, F>(
    connector: &mut C,
    power: U,
    transfer: TransferConfig,
    output: &Path,
    progress: F,
) -> Result<CaptureReport>
where
    C: Connector + ?Sized,
    U: UsbPower,
    F: FnMut(usize, usize),
{
    let acquired = RecoveryManager::new(transfer, power)
        .acquire(connector, progress)
        .context("Failed to acquire image")?;

    save_image(output, &acquired)?;

    Ok(CaptureReport {
        path: output.to_path_buf(),
        bytes: acquired.bytes.len(),
        attempts: acquired.attempts,
    })
}

fn report_json(report: &CaptureReport) -> serde_json::Value {
    serde_json::json!({
        "path": report.path.display().to_string(),
        "bytes": report.bytes,
        "attempts": report.attempts,
    })
}

fn progress_bar(hidden: bool) -> ProgressBar {
    if hidden || !use_fancy_output() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(0);
    #[allow(clippy::unwrap_used)] // Static template string
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} packets",
            )
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    pb
}

fn save_image(path: &Path, acquired: &Acquired) -> Result<()> {
    if acquired.bytes.is_empty() {
        warn!("Camera returned an empty image");
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, &acquired.bytes).with_context(|| format!("Failed to write {}", path.display()))
}

/// Camera slot encoded as the last digit of the port name (`/dev/ttyUSB_1` is slot 1).
fn slot_from_port(port: &str) -> Option<u8> {
    port.chars()
        .last()
        .and_then(|c| c.to_digit(10))
        .and_then(|d| u8::try_from(d).ok())
}

/// `<image_dir>/image<slot>/<YYYYMMDD>/<device>_<slot>_HDR_<YYYYMMDD-HHMM>.jpg`
fn default_image_path(config: &Config, slot: u8, now: &DateTime<Local>) -> Result<PathBuf> {
    let Some(image_dir) = &config.camera.image_dir else {
        bail!("No output path given; use --output or set [camera] image_dir in the config file");
    };
    let device_id = config
        .node
        .device_id
        .as_deref()
        .unwrap_or(DEFAULT_DEVICE_ID);

    let day = now.format("%Y%m%d").to_string();
    let stamp = now.format("%Y%m%d-%H%M");

    Ok(image_dir
        .join(format!("image{slot}"))
        .join(&day)
        .join(format!("{device_id}_{slot:02}_HDR_{stamp}.jpg")))
}
