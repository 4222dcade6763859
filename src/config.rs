//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional; a missing file yields
//! [`Config::default`].
//!
//! ```toml
//! [serial]
//! port = "auto"
//! baud_rate = 921600
//!
//! [link]
//! packet_rate_hz = 50
//!
//! [mappings.axes]
//! axis_0 = { channel = 1 }
//! axis_1 = { channel = 2, invert = true }
//!
//! [mappings.buttons]
//! button_0 = { channel = 5 }
//!
//! [mappings.hats]
//! hat_0_x = { channel = 7 }
//! ```

use serde::de::Error;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::controller::mapping::{ChannelMapping, InputSource, MappingTable};
use crate::error::{BridgeError, Result};
use crate::serial::{is_supported_baud_rate, AUTO_PORT, DEFAULT_BAUD_RATE, SUPPORTED_BAUD_RATES};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub mappings: MappingsConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SerialConfig {
    /// Device path, or `"auto"` for the first discovered port
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Upper bound on one frame write
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
}

/// Link loop timing
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LinkConfig {
    #[serde(default = "default_packet_rate_hz")]
    pub packet_rate_hz: u32,

    /// Upper bound on one serial read
    #[serde(default = "default_read_poll_ms")]
    pub read_poll_ms: u64,

    /// Transmitted packets between status log lines
    #[serde(default = "default_status_interval_packets")]
    pub status_interval_packets: u64,
}

/// Controller configuration
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct ControllerConfig {
    /// evdev node, empty to auto-detect the first joystick
    #[serde(default)]
    pub device_path: String,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// Write snapshots to JSONL files
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    /// Period of the telemetry report
    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,
}

/// Application log output
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct LoggingConfig {
    /// Directory for daily-rolling log files; console only when unset
    #[serde(default)]
    pub file_dir: Option<String>,
}

/// Input-to-channel mappings, one table per input kind
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct MappingsConfig {
    #[serde(default)]
    pub axes: BTreeMap<String, ChannelMapping>,

    #[serde(default)]
    pub buttons: BTreeMap<String, ChannelMapping>,

    #[serde(default)]
    pub hats: BTreeMap<String, ChannelMapping>,
}

// Default value functions
fn default_serial_port() -> String { AUTO_PORT.to_string() }
fn default_baud_rate() -> u32 { DEFAULT_BAUD_RATE }
fn default_timeout_ms() -> u64 { 100 }
fn default_reconnect_interval_ms() -> u64 { 1000 }

fn default_packet_rate_hz() -> u32 { 50 }
fn default_read_poll_ms() -> u64 { 10 }
fn default_status_interval_packets() -> u64 { 500 }

fn default_telemetry_enabled() -> bool { false }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_interval_ms() -> u64 { 1000 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            packet_rate_hz: default_packet_rate_hz(),
            read_poll_ms: default_read_poll_ms(),
            status_interval_packets: default_status_interval_packets(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            log_interval_ms: default_log_interval_ms(),
        }
    }
}

impl LinkConfig {
    /// Time between two RC channel frames.
    pub fn packet_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.packet_rate_hz.max(1)))
    }
}

impl MappingsConfig {
    /// Build the mapping table, checking every key against its section.
    ///
    /// # Errors
    ///
    /// Returns `Config` if a key does not parse, names the wrong input kind
    /// for its section, or maps to a channel outside 1-16.
    pub fn to_table(&self) -> Result<MappingTable> {
        let mut table = MappingTable::new();

        let sections = [
            ("axes", &self.axes),
            ("buttons", &self.buttons),
            ("hats", &self.hats),
        ];

        for (section, entries) in sections {
            for (key, mapping) in entries {
                let source: InputSource = key.parse().map_err(|e: String| {
                    BridgeError::Config(toml::de::Error::custom(format!("mappings.{}: {}", section, e)))
                })?;

                let kind_matches = matches!(
                    (section, source),
                    ("axes", InputSource::Axis(_))
                        | ("buttons", InputSource::Button(_))
                        | ("hats", InputSource::HatAxis(..))
                );
                if !kind_matches {
                    return Err(BridgeError::Config(toml::de::Error::custom(format!(
                        "mappings.{}: '{}' does not belong in this section",
                        section, key
                    ))));
                }

                if !mapping.is_valid() {
                    return Err(BridgeError::Config(toml::de::Error::custom(format!(
                        "mappings.{}.{}: channel {} is out of range (must be 1-16)",
                        section, key, mapping.channel
                    ))));
                }

                table.insert(source, *mapping);
            }
        }

        Ok(table)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use crsf_bridge::config::Config;
    ///
    /// let config = Config::load("config.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.trim().is_empty() {
            return Err(BridgeError::Config(toml::de::Error::custom(
                "serial port cannot be empty (use \"auto\" to pick the first port)",
            )));
        }

        if !is_supported_baud_rate(self.serial.baud_rate) {
            return Err(BridgeError::Config(toml::de::Error::custom(format!(
                "baud_rate must be one of: {:?}",
                SUPPORTED_BAUD_RATES
            ))));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(BridgeError::Config(toml::de::Error::custom(
                "timeout_ms must be between 1 and 10000",
            )));
        }

        if self.serial.reconnect_interval_ms == 0 || self.serial.reconnect_interval_ms > 60000 {
            return Err(BridgeError::Config(toml::de::Error::custom(
                "reconnect_interval_ms must be between 1 and 60000",
            )));
        }

        if self.link.packet_rate_hz == 0 || self.link.packet_rate_hz > 500 {
            return Err(BridgeError::Config(toml::de::Error::custom(
                "packet_rate_hz must be between 1 and 500",
            )));
        }

        if self.link.read_poll_ms == 0 || self.link.read_poll_ms > 1000 {
            return Err(BridgeError::Config(toml::de::Error::custom(
                "read_poll_ms must be between 1 and 1000",
            )));
        }

        if self.link.status_interval_packets == 0 {
            return Err(BridgeError::Config(toml::de::Error::custom(
                "status_interval_packets must be greater than 0",
            )));
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(BridgeError::Config(toml::de::Error::custom(
                "telemetry log_dir cannot be empty when enabled",
            )));
        }

        if self.telemetry.log_interval_ms == 0 || self.telemetry.log_interval_ms > 60000 {
            return Err(BridgeError::Config(toml::de::Error::custom(
                "log_interval_ms must be between 1 and 60000",
            )));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(BridgeError::Config(toml::de::Error::custom(
                "max_records_per_file must be greater than 0",
            )));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(BridgeError::Config(toml::de::Error::custom(
                "max_files_to_keep must be greater than 0",
            )));
        }

        if let Some(dir) = &self.logging.file_dir {
            if dir.trim().is_empty() {
                return Err(BridgeError::Config(toml::de::Error::custom(
                    "logging file_dir cannot be empty when set",
                )));
            }
        }

        self.mappings.to_table()?;

        Ok(())
    }
}
