//! Configuration file support for agrinode.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (AGRINODE_*)
//! 3. Local config file (./agrinode.toml)
//! 4. Global config file (~/.config/agrinode/config.toml)
//!
//! `--config PATH` replaces levels 3 and 4 with that single file.

use agrinode::{SerialConfig, TransferConfig};
use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Local configuration file name.
pub const LOCAL_CONFIG: &str = "agrinode.toml";

/// Node identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Device identifier used as the image file-name prefix.
    pub device_id: Option<String>,
}

/// Image storage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Root directory for saved images.
    pub image_dir: Option<PathBuf>,
}

/// Camera link settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Serial port of the camera (e.g., "/dev/ttyUSB_1").
    pub port: Option<String>,
    /// Baud rate.
    pub baud: Option<u32>,
    /// USB bus path used for power cycling (e.g., "1-1").
    pub usb_bus_path: Option<String>,
    /// Override of the sysfs USB driver directory.
    pub usb_driver_dir: Option<PathBuf>,
}

/// Transfer timing overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferSection {
    /// Overall budget per session, in seconds.
    pub session_timeout_secs: Option<u64>,
    /// Delay after opening the link, in seconds.
    pub settle_secs: Option<u64>,
    /// Per-read timeout, in seconds.
    pub read_timeout_secs: Option<u64>,
    /// Whole-session attempts.
    pub max_attempts: Option<usize>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Node identity.
    #[serde(default)]
    pub node: NodeConfig,
    /// Image storage.
    #[serde(default)]
    pub camera: CameraConfig,
    /// Camera link.
    #[serde(default)]
    pub link: LinkConfig,
    /// Transfer timing.
    #[serde(default)]
    pub transfer: TransferSection,
}

impl Config {
    /// Load configuration from the global and local files.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG)) {
            debug!("Loaded local config from {LOCAL_CONFIG}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "agrinode").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one; set values in `other` win.
    fn merge(&mut self, other: Self) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.node.device_id, other.node.device_id);
        take(&mut self.camera.image_dir, other.camera.image_dir);

        take(&mut self.link.port, other.link.port);
        take(&mut self.link.baud, other.link.baud);
        take(&mut self.link.usb_bus_path, other.link.usb_bus_path);
        take(&mut self.link.usb_driver_dir, other.link.usb_driver_dir);

        take(
            &mut self.transfer.session_timeout_secs,
            other.transfer.session_timeout_secs,
        );
        take(&mut self.transfer.settle_secs, other.transfer.settle_secs);
        take(
            &mut self.transfer.read_timeout_secs,
            other.transfer.read_timeout_secs,
        );
        take(&mut self.transfer.max_attempts, other.transfer.max_attempts);
    }

    /// Transfer settings with file overrides applied to the defaults.
    pub fn transfer_config(&self) -> TransferConfig {
        let mut config = TransferConfig::default();
        if let Some(secs) = self.transfer.session_timeout_secs {
            config = config.with_session_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.transfer.settle_secs {
            config = config.with_settle_delay(Duration::from_secs(secs));
        }
        if let Some(attempts) = self.transfer.max_attempts {
            config = config.with_max_attempts(attempts);
        }
        config
    }

    /// Serial settings for `port`, using the configured baud and read timeout.
    pub fn serial_config(&self, port: &str, baud: Option<u32>) -> SerialConfig {
        let baud = baud
            .or(self.link.baud)
            .unwrap_or(agrinode::port::DEFAULT_BAUD);
        let mut config = SerialConfig::new(port, baud);
        if let Some(secs) = self.transfer.read_timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.node.device_id.is_none());
        assert!(config.camera.image_dir.is_none());
        assert!(config.link.port.is_none());
        assert!(config.link.usb_bus_path.is_none());
        assert!(config.transfer.max_attempts.is_none());
    }

    #[test]
    fn test_config_merge_overrides_set_values() {
        let mut base = Config::default();
        base.link.port = Some("/dev/ttyUSB_1".to_string());
        base.link.baud = Some(57600);

        let mut other = Config::default();
        other.link.port = Some("/dev/ttyUSB_2".to_string());
        other.node.device_id = Some("pinode-07".to_string());

        base.merge(other);

        assert_eq!(base.link.port.as_deref(), Some("/dev/ttyUSB_2"));
        assert_eq!(base.link.baud, Some(57600));
        assert_eq!(base.node.device_id.as_deref(), Some("pinode-07"));
    }

    #[test]
    fn test_config_merge_does_not_overwrite_with_none() {
        let mut base = Config::default();
        base.camera.image_dir = Some(PathBuf::from("/data/images"));
        base.transfer.max_attempts = Some(5);

        base.merge(Config::default());

        assert_eq!(base.camera.image_dir, Some(PathBuf::from("/data/images")));
        assert_eq!(base.transfer.max_attempts, Some(5));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
[node]
device_id = "pinode-03"

[camera]
image_dir = "/home/pinode/images"

[link]
port = "/dev/ttyUSB_1"
usb_bus_path = "1-1"

[transfer]
session_timeout_secs = 90
max_attempts = 5
"#;
        let config: Config = toml::from_str(toml_str).unwrap();

        assert_eq!(config.node.device_id.as_deref(), Some("pinode-03"));
        assert_eq!(
            config.camera.image_dir,
            Some(PathBuf::from("/home/pinode/images"))
        );
        assert_eq!(config.link.usb_bus_path.as_deref(), Some("1-1"));
        assert_eq!(config.transfer.session_timeout_secs, Some(90));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[link]\nbaud = 9600\n").unwrap();
        assert_eq!(config.link.baud, Some(9600));
        assert!(config.node.device_id.is_none());
    }

    #[test]
    fn test_transfer_config_applies_overrides() {
        let mut config = Config::default();
        config.transfer.session_timeout_secs = Some(90);
        config.transfer.max_attempts = Some(5);

        let transfer = config.transfer_config();
        assert_eq!(transfer.session_timeout, Duration::from_secs(90));
        assert_eq!(transfer.max_attempts, 5);
        assert_eq!(transfer.settle_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_serial_config_baud_priority() {
        let mut config = Config::default();
        assert_eq!(config.serial_config("/dev/x", None).baud_rate, 115200);

        config.link.baud = Some(57600);
        assert_eq!(config.serial_config("/dev/x", None).baud_rate, 57600);
        assert_eq!(config.serial_config("/dev/x", Some(9600)).baud_rate, 9600);
    }

    #[test]
    fn test_load_from_path_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agrinode.toml");
        let mut config = Config::default();
        config.link.port = Some("/dev/ttyUSB_4".to_string());
        fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = Config::load_from_path(&path);
        assert_eq!(loaded.link.port.as_deref(), Some("/dev/ttyUSB_4"));
    }

    #[test]
    fn test_load_from_path_reads_only_that_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.toml");
        fs::write(&path, "[link]\nport = \"/dev/ttyUSB_1\"\n").unwrap();

        let loaded = Config::load_from_path(&path);

        assert_eq!(loaded.link.port.as_deref(), Some("/dev/ttyUSB_1"));
        assert!(loaded.node.device_id.is_none());
        assert!(loaded.camera.image_dir.is_none());
        assert!(loaded.link.usb_bus_path.is_none());
        assert!(loaded.transfer.max_attempts.is_none());
    }

    #[test]
    fn test_load_from_invalid_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "this is [not toml").unwrap();

        let loaded = Config::load_from_path(&path);
        assert!(loaded.link.port.is_none());
    }
}
