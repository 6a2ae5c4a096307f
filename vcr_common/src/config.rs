//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load TOML configuration files
//! across all vCR applications.
//!
//! # Usage
//!
//! ```rust,no_run
//! use vcr_common::config::{ConfigError, ConfigLoader, GloveConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = GloveConfig::load(Path::new("glove.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::consts::{
    DEFAULT_AUDIT_CAPACITY, DEFAULT_AUTO_BUZZ_AMPLITUDE, DEFAULT_DISCONNECT_ALL_REFRESH_DELAY_MS,
    DEFAULT_DISCONNECT_REFRESH_DELAY_MS, DEFAULT_PAIR_REFRESH_DELAY_MS, DEFAULT_POLL_INTERVAL_MS,
    LONG_BUZZ_SECONDS, MAX_AMPLITUDE,
};
use crate::pattern::{StimulationLimits, VcrParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Per-tick detail.
    Debug,
    /// Lifecycle events.
    #[default]
    Info,
    /// Degraded paths.
    Warn,
    /// Serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields shared across all vCR applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "vcr-glove-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Discovery cadence and pairing follow-up delays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Snapshot poll interval while scanning.
    pub poll_interval_ms: u64,
    /// Delay before the refresh that follows a pair request.
    pub pair_refresh_delay_ms: u64,
    /// Delay before the refresh that follows a disconnect request.
    pub disconnect_refresh_delay_ms: u64,
    /// Delay before the refresh that follows a disconnect-all request.
    pub disconnect_all_refresh_delay_ms: u64,
    /// Amplitude of the one-shot buzz sent after pairing; 0 disables it.
    pub auto_buzz_amplitude: u8,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            pair_refresh_delay_ms: DEFAULT_PAIR_REFRESH_DELAY_MS,
            disconnect_refresh_delay_ms: DEFAULT_DISCONNECT_REFRESH_DELAY_MS,
            disconnect_all_refresh_delay_ms: DEFAULT_DISCONNECT_ALL_REFRESH_DELAY_MS,
            auto_buzz_amplitude: DEFAULT_AUTO_BUZZ_AMPLITUDE,
        }
    }
}

impl DiscoveryConfig {
    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Pair follow-up delay as a `Duration`.
    pub fn pair_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.pair_refresh_delay_ms)
    }

    /// Disconnect follow-up delay as a `Duration`.
    pub fn disconnect_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.disconnect_refresh_delay_ms)
    }

    /// Disconnect-all follow-up delay as a `Duration`.
    pub fn disconnect_all_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.disconnect_all_refresh_delay_ms)
    }
}

/// Default stimulation parameters and input limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulationConfig {
    /// Defaults offered for a new vCR session.
    pub vcr: VcrParams,
    /// Ranges user input is clamped into.
    pub limits: StimulationLimits,
    /// Length of a long buzz session.
    pub long_buzz_seconds: u64,
}

impl Default for StimulationConfig {
    fn default() -> Self {
        Self {
            vcr: VcrParams::default(),
            limits: StimulationLimits::default(),
            long_buzz_seconds: LONG_BUZZ_SECONDS,
        }
    }
}

/// Audit log retention and export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Entries kept in memory.
    pub capacity: usize,
    /// Append every entry to this JSONL file when set.
    pub jsonl_path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_AUDIT_CAPACITY,
            jsonl_path: None,
        }
    }
}

/// Top-level configuration of the glove controller.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "vcr-glove"
///
/// [discovery]
/// poll_interval_ms = 800
///
/// [stimulation.vcr]
/// amplitude = 70.0
/// cycle_hz = 1.5
/// burst_ms = 100.0
/// motor_count = 4.0
///
/// [audit]
/// jsonl_path = "/var/log/vcr/audit.jsonl"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GloveConfig {
    /// Common fields.
    pub shared: SharedConfig,
    /// Discovery cadence.
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Stimulation defaults.
    #[serde(default)]
    pub stimulation: StimulationConfig,
    /// Audit log.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl GloveConfig {
    /// Configuration with every default and the given service name.
    pub fn with_service_name(service_name: impl Into<String>) -> Self {
        Self {
            shared: SharedConfig {
                log_level: LogLevel::default(),
                service_name: service_name.into(),
            },
            discovery: DiscoveryConfig::default(),
            stimulation: StimulationConfig::default(),
            audit: AuditConfig::default(),
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `shared.service_name` is empty
    /// - `discovery.poll_interval_ms` is zero
    /// - `discovery.auto_buzz_amplitude` exceeds 100
    /// - the default vCR frequency is not a positive number
    /// - the default vCR motor count is below one
    /// - a limit range is inverted
    /// - `audit.capacity` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.discovery.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "discovery.poll_interval_ms must be > 0".to_string(),
            ));
        }
        if self.discovery.auto_buzz_amplitude > MAX_AMPLITUDE {
            return Err(ConfigError::ValidationError(format!(
                "discovery.auto_buzz_amplitude {} exceeds {MAX_AMPLITUDE}",
                self.discovery.auto_buzz_amplitude
            )));
        }

        let vcr = &self.stimulation.vcr;
        if !(vcr.cycle_hz.is_finite() && vcr.cycle_hz > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "stimulation.vcr.cycle_hz must be positive, got {}",
                vcr.cycle_hz
            )));
        }
        if vcr.motor_count.is_nan() || vcr.motor_count < 1.0 {
            return Err(ConfigError::ValidationError(
                "stimulation.vcr.motor_count must be >= 1".to_string(),
            ));
        }

        let limits = &self.stimulation.limits;
        if limits.amplitude.0 > limits.amplitude.1
            || limits.amplitude.1 > MAX_AMPLITUDE
            || !(limits.cycle_hz.0 > 0.0 && limits.cycle_hz.0 <= limits.cycle_hz.1)
            || limits.burst_ms.0 > limits.burst_ms.1
            || limits.motor_count.0 > limits.motor_count.1
        {
            return Err(ConfigError::ValidationError(
                "stimulation.limits contains an invalid range".to_string(),
            ));
        }

        if self.audit.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "audit.capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// Blanket-implemented for any `serde::de::DeserializeOwned` type.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        tracing::debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}
