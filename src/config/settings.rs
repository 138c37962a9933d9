//! Application settings and paths.
//!
//! Settings live in `settings.json` under the XDG config directory
//! (`~/.config/sweep` on Linux). A missing file means defaults.

use crate::discovery::DiscoveryConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::output::OutputFormat;
use crate::scanner::{PortScanConfig, CONNECT_TIMEOUT, SANITY_LIMIT};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Application directory paths following the XDG Base Directory layout.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/sweep)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Resolve the per-user directories.
    pub fn new() -> ConfigResult<Self> {
        let project =
            ProjectDirs::from("com", "sweep", "sweep").ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Application-wide defaults, overridable per command on the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Timeout for one TCP connect attempt, in milliseconds.
    pub port_timeout_ms: u64,
    /// Concurrent connect attempts; clamped to the sanity limit on use.
    pub port_concurrency: usize,
    /// How long a host sweep waits for echo replies, in seconds.
    pub discovery_timeout_secs: u64,
    /// Cap on echo probes in flight. `null` means no cap.
    pub discovery_max_in_flight: Option<usize>,
    /// Default output format.
    pub output_format: OutputFormat,
    /// Port for the echo test server and client.
    pub echo_port: u16,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            port_timeout_ms: CONNECT_TIMEOUT.as_millis() as u64,
            port_concurrency: SANITY_LIMIT,
            discovery_timeout_secs: 20,
            discovery_max_in_flight: None,
            output_format: OutputFormat::Plain,
            echo_port: 5000,
        }
    }
}

impl AppSettings {
    /// Load settings from the default location.
    ///
    /// Falls back to defaults when there is no home directory to look in.
    pub fn load() -> ConfigResult<Self> {
        let file = match Paths::new() {
            Ok(paths) => paths.settings_file(),
            Err(ConfigError::DirectoryNotFound) => {
                debug!("no configuration directory, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e),
        };
        if !file.exists() {
            debug!(path = %file.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    /// Port scan tuning derived from these settings.
    pub fn port_scan_config(&self) -> PortScanConfig {
        PortScanConfig::default()
            .with_concurrency(self.port_concurrency)
            .with_timeout(Duration::from_millis(self.port_timeout_ms))
    }

    /// Sweep tuning derived from these settings.
    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig::new(Duration::from_secs(self.discovery_timeout_secs))
            .with_max_in_flight(self.discovery_max_in_flight)
    }
}
