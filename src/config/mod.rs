//! Configuration module for the analyzer controller
//!
//! This module handles:
//! - The TOML configuration file (link, timing, acquisition and panel defaults)
//! - Application state persistence (last sensitivities, last export path)
//!
//! # App Data Location
//!
//! Application data is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/org.hp3582.control/`
//! - **macOS**: `~/Library/Application Support/org.hp3582.control/`
//! - **Windows**: `%APPDATA%\org.hp3582.control\`
//!
//! # Files
//!
//! - `config.toml` - [`AppConfig`], edited by hand or passed with `--config`
//! - `app_state.json` - [`AppState`], written by the binary after each run
//! - `logs/` - Daily rolling log files
//!
//! # Example
//!
//! ```ignore
//! use hp3582_control::config::{AppConfig, AppState};
//!
//! let config = AppConfig::load_or_default(None);
//! let mut state = AppState::load_or_default();
//! state.last_export = Some("SA_data/data_set.csv".into());
//! state.save()?;
//! ```

pub mod settings;

pub use settings::*;

use crate::backend::SettlePolicy;
use crate::error::{AnalyzerError, Result};
use crate::types::SensitivityLevel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for data directories
pub const APP_ID: &str = "org.hp3582.control";

/// Config filename inside the app data directory
pub const CONFIG_FILE: &str = "config.toml";

/// App state filename
pub const APP_STATE_FILE: &str = "app_state.json";

/// Default directory for exported measurements
pub const DEFAULT_EXPORT_DIR: &str = "SA_data";

/// Default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default read timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Line terminator for both directions
pub const DEFAULT_TERMINATOR: &str = "\r\n";

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        AnalyzerError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            AnalyzerError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the app state file
pub fn app_state_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(APP_STATE_FILE))
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== App Config ====================

/// Instrument link settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Serial port name, e.g. `/dev/ttyUSB0` or `COM3`
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Bounded wait for a reply before failing with a communication error
    pub timeout_ms: u64,
    /// Appended to every written line and stripped from replies
    pub terminator: String,
    /// GPIB address when the port is a Prologix-style GPIB-USB controller
    pub gpib_address: Option<u8>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            terminator: DEFAULT_TERMINATOR.to_string(),
            gpib_address: None,
        }
    }
}

/// Instrument settle times
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait after each state-changing command
    pub command_settle_ms: u64,
    /// Wait between sequential sweep reads
    pub sweep_settle_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            command_settle_ms: 100,
            sweep_settle_ms: 500,
        }
    }
}

impl TimingConfig {
    pub fn settle_policy(&self) -> SettlePolicy {
        SettlePolicy::new(
            Duration::from_millis(self.command_settle_ms),
            Duration::from_millis(self.sweep_settle_ms),
        )
    }
}

/// Acquisition defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub resolution: ResolutionStrategy,
    /// Directory exports land in when no explicit path is given
    pub export_dir: PathBuf,
    /// Read the axis back from the device (`LAD`/`LSP`) instead of trusting the panel snapshot
    pub axis_from_device: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            resolution: ResolutionStrategy::Full,
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
            axis_from_device: false,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Panel state applied by `hp3582 panel --apply`
    #[serde(default)]
    pub panel: PanelSettings,
}

impl AppConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AnalyzerError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: AppConfig = toml::from_str(&content).map_err(|e| {
            AnalyzerError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.panel.validate()?;
        Ok(config)
    }

    /// Load `path` (or the default location), returning defaults on any error
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) => path,
            None => return Self::default(),
        };
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the config as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AnalyzerError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| AnalyzerError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            AnalyzerError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}

// ==================== App State ====================

/// State remembered between runs
///
/// Sensitivity levels found by auto-ranging are kept here rather than in the
/// controller, which only ever returns them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    /// Version for future migration support
    #[serde(default = "default_app_state_version")]
    pub version: u32,

    /// Levels chosen by the last auto-ranging run
    #[serde(default)]
    pub last_sensitivity: Option<(SensitivityLevel, SensitivityLevel)>,

    /// Path of the last exported file
    #[serde(default)]
    pub last_export: Option<PathBuf>,

    /// Port used by the last successful connection
    #[serde(default)]
    pub last_port: Option<String>,
}

fn default_app_state_version() -> u32 {
    1
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            version: 1,
            last_sensitivity: None,
            last_export: None,
            last_port: None,
        }
    }
}

impl AppState {
    /// Load app state from the default location
    pub fn load() -> Result<Self> {
        let path = app_state_path().ok_or_else(|| {
            AnalyzerError::Config("Could not determine app state path".to_string())
        })?;
        Self::load_from(&path)
    }

    /// Load app state from an explicit file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AnalyzerError::Config(format!("Failed to read app state: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| AnalyzerError::Config(format!("Failed to parse app state: {}", e)))
    }

    /// Load app state, returning defaults on any error
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load app state, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save app state to the default location
    pub fn save(&self) -> Result<()> {
        let dir = ensure_app_data_dir()?;
        self.save_to(&dir.join(APP_STATE_FILE))
    }

    /// Save app state to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| AnalyzerError::Config(format!("Failed to serialize app state: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| AnalyzerError::Config(format!("Failed to write app state: {}", e)))
    }
}
