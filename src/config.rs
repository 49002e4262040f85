//! Configuration management module.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::fiscal::Timing;
use crate::fiscal::types::DEFAULT_BAUD_RATE;
use crate::serial::{Parity, SerialSettings};

/// Configuration load result.
#[derive(Debug)]
pub enum ConfigLoadResult {
    /// Config loaded successfully.
    Loaded(AppConfig),
    /// Config file missing (first run).
    Missing,
    /// Config file exists but invalid.
    Invalid(ConfigError),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl From<ConfigError> for crate::error::AppError {
    fn from(e: ConfigError) -> Self {
        crate::error::AppError::config(e.to_string())
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub printer: PrinterConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial link settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterConfig {
    /// Serial port name (e.g. "COM3", "/dev/ttyUSB0").
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    /// Reply deadline for ordinary commands in milliseconds (default: 2000).
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
    /// Reply deadline for document closure and Z report in seconds (default: 30).
    #[serde(default = "default_closing_timeout_secs")]
    pub closing_timeout_secs: u64,
}

fn default_port() -> String {
    if cfg!(windows) {
        "COM1".to_string()
    } else {
        "/dev/ttyUSB0".to_string()
    }
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_response_timeout_ms() -> u64 {
    2000
}

fn default_closing_timeout_secs() -> u64 {
    30
}

/// Inter-command pauses in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,
}

fn default_settle_ms() -> u64 {
    100
}

fn default_step_delay_ms() -> u64 {
    100
}

fn default_item_delay_ms() -> u64 {
    200
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for daily log files; console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Get config file path (per-user config directory).
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("", "", "fiscal-bridge")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Attempt to load config with detailed result.
    pub fn try_load(path: &Path) -> ConfigLoadResult {
        if !path.exists() {
            return ConfigLoadResult::Missing;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<AppConfig>(&content) {
                Ok(config) => match config.validate() {
                    Ok(()) => ConfigLoadResult::Loaded(config),
                    Err(e) => ConfigLoadResult::Invalid(e),
                },
                Err(e) => ConfigLoadResult::Invalid(ConfigError::Parse(e)),
            },
            Err(e) => ConfigLoadResult::Invalid(ConfigError::Read(e)),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.printer.port.trim().is_empty() {
            return Err(ConfigError::Validation("Printer port cannot be empty".to_string()));
        }
        if self.printer.baud_rate == 0 {
            return Err(ConfigError::Validation(
                "Baud rate must be greater than 0".to_string(),
            ));
        }
        if !(5..=8).contains(&self.printer.data_bits) {
            return Err(ConfigError::Validation("Data bits must be between 5 and 8".to_string()));
        }
        if !matches!(self.printer.stop_bits, 1 | 2) {
            return Err(ConfigError::Validation("Stop bits must be 1 or 2".to_string()));
        }
        if self.printer.response_timeout_ms < 100 {
            return Err(ConfigError::Validation(
                "Response timeout must be at least 100 ms".to_string(),
            ));
        }
        if self.printer.closing_timeout_secs < 1 {
            return Err(ConfigError::Validation(
                "Closing timeout must be at least 1 second".to_string(),
            ));
        }
        if self.printer.closing_timeout_secs.saturating_mul(1000) < self.printer.response_timeout_ms {
            return Err(ConfigError::Validation(
                "Closing timeout cannot be shorter than the response timeout".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Validation("Log level cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Save configuration to file, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Engine timing from the configured values.
    pub fn to_timing(&self) -> Timing {
        Timing {
            response_timeout: Duration::from_millis(self.printer.response_timeout_ms),
            closing_timeout: Duration::from_secs(self.printer.closing_timeout_secs),
            settle: Duration::from_millis(self.timing.settle_ms),
            step_delay: Duration::from_millis(self.timing.step_delay_ms),
            item_delay: Duration::from_millis(self.timing.item_delay_ms),
        }
    }
}

impl PrinterConfig {
    /// Serial line settings for the transport.
    pub fn serial_settings(&self) -> SerialSettings {
        SerialSettings {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            parity: self.parity,
            data_bits: self.data_bits,
            stop_bits: self.stop_bits,
        }
    }
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            parity: Parity::Even,
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            response_timeout_ms: default_response_timeout_ms(),
            closing_timeout_secs: default_closing_timeout_secs(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            step_delay_ms: default_step_delay_ms(),
            item_delay_ms: default_item_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_timing_matches_engine() {
        assert_eq!(AppConfig::default().to_timing(), Timing::default());
    }

    #[test]
    fn test_serial_settings_defaults() {
        let settings = AppConfig::default().printer.serial_settings();
        assert_eq!(settings.baud_rate, 9600);
        assert_eq!(settings.parity, Parity::Even);
        assert_eq!((settings.data_bits, settings.stop_bits), (8, 1));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str("[printer]\nport = \"COM7\"\n").unwrap();
        assert_eq!(config.printer.port, "COM7");
        assert_eq!(config.printer.closing_timeout_secs, 30);
        assert_eq!(config.timing.item_delay_ms, 200);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validation_empty_port() {
        let mut config = AppConfig::default();
        config.printer.port = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_line_settings() {
        let mut config = AppConfig::default();
        config.printer.data_bits = 9;
        assert!(config.validate().is_err());

        config.printer.data_bits = 8;
        config.printer.stop_bits = 0;
        assert!(config.validate().is_err());

        config.printer.stop_bits = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_timeouts() {
        let mut config = AppConfig::default();

        config.printer.response_timeout_ms = 50;
        assert!(config.validate().is_err());

        config.printer.response_timeout_ms = 5000;
        config.printer.closing_timeout_secs = 2;
        assert!(config.validate().is_err());

        config.printer.closing_timeout_secs = 60;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("fiscal-bridge-config-{}", std::process::id()));
        let path = dir.join("config.toml");

        let mut config = AppConfig::default();
        config.printer.port = "COM9".to_string();
        config.timing.item_delay_ms = 250;
        config.save(&path).unwrap();

        match AppConfig::try_load(&path) {
            ConfigLoadResult::Loaded(loaded) => {
                assert_eq!(loaded.printer.port, "COM9");
                assert_eq!(loaded.timing.item_delay_ms, 250);
            }
            other => panic!("unexpected load result: {other:?}"),
        }

        std::fs::write(&path, "[printer]\nport = \"\"\n").unwrap();
        assert!(matches!(AppConfig::try_load(&path), ConfigLoadResult::Invalid(ConfigError::Validation(_))));

        std::fs::write(&path, "not = [valid").unwrap();
        assert!(matches!(AppConfig::try_load(&path), ConfigLoadResult::Invalid(ConfigError::Parse(_))));

        let _ = std::fs::remove_dir_all(&dir);
        assert!(matches!(AppConfig::try_load(&path), ConfigLoadResult::Missing));
    }
}
