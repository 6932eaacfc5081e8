//! agrinode CLI - Capture images from the camera module of an agrinode field node.
//!
//! ## Features
//!
//! - Reliable image capture over the COBS-framed camera link
//! - Automatic retries with USB power cycling of a wedged camera
//! - Dated image storage under the configured image directory
//! - Serial port listing
//! - Shell completion generation
//! - Environment variable and config file support

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

/// Check if emoji/animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(std::sync::atomic::Ordering::Relaxed) && console::colors_enabled_stderr()
}

mod commands;
mod config;

use commands::capture::{CaptureArgs, cmd_capture};
use commands::completions::cmd_completions;
use commands::ports::cmd_list_ports;
use config::Config;

/// agrinode - Capture images from an agrinode camera module.
///
/// Environment variables:
///   AGRINODE_PORT       - Camera serial port
///   AGRINODE_BAUD       - Baud rate (default: 115200)
///   AGRINODE_USB_PATH   - USB bus path of the camera for power cycling (e.g. 1-1)
#[derive(Parser)]
#[command(name = "agrinode")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port of the camera.
    #[arg(short, long, global = true, env = "AGRINODE_PORT")]
    port: Option<String>,

    /// Baud rate of the camera link (default: 115200).
    #[arg(short, long, global = true, env = "AGRINODE_BAUD")]
    baud: Option<u32>,

    /// USB bus path of the camera, used to power-cycle it between attempts.
    #[arg(long, global = true, env = "AGRINODE_USB_PATH", value_name = "BUS_PATH")]
    usb_path: Option<String>,

    /// Verbose output level (-v, -vv, -vvv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Capture one image and save it as a JPEG file.
    Capture {
        /// Output file (default: dated path under the configured image directory).
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Camera slot used in the file name (default: last digit of the port name).
        #[arg(long)]
        slot: Option<u8>,

        /// Retry without power-cycling the camera.
        #[arg(long)]
        no_power_cycle: bool,

        /// Print the result as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e:#}", style("Error:").red().bold());
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, std::sync::atomic::Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "agrinode v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Capture {
            output,
            slot,
            no_power_cycle,
            json,
        } => {
            let args = CaptureArgs {
                output: output.as_deref(),
                slot: *slot,
                no_power_cycle: *no_power_cycle,
                json: *json,
            };
            cmd_capture(&cli, &config, &args)?;
        },
        Commands::ListPorts { json } => {
            cmd_list_ports(*json)?;
        },
        Commands::Completions { shell } => {
            cmd_completions(*shell);
        },
    }

    Ok(())
}
