//! # Configuration Management
//!
//! Centralized configuration for both halves of the bridge.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! The wire constants below are part of the frame format and are not
//! configurable; changing [`PROTOCOL_MAGIC`] breaks every deployed peer.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Magic half of the packed version word ("SV")
pub const PROTOCOL_MAGIC: u16 = 0x5356;

/// Minor protocol revision written by this build
pub const PROTOCOL_MINOR: u8 = 2;

/// Patch protocol revision written by this build
pub const PROTOCOL_PATCH: u8 = 0;

/// Max allowed frame size (1 MiB); a few hundred participants fit in a few KB
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Longest participant name carried on the wire, in UTF-16 code units
pub const MAX_NAME_UNITS: usize = 256;

/// Well-known channel name shared by the game and voice processes
pub const DEFAULT_PIPE_NAME: &str = "8a3c5d1e-6f2b-4b7a-9c1d-3e5f7a9b2c4d";

/// Marker prefix for side-channel identity announcements
pub const IDENTITY_MARKER: &str = "SVB_IDENT";

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct BridgeConfig {
    /// Byte-stream channel configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Per-tick update pipeline configuration
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| BridgeError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| BridgeError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| BridgeError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("SVB_PIPE_NAME") {
            config.transport.pipe_name = name;
        }

        if let Ok(per_tick) = std::env::var("SVB_RELAY_UPDATES_PER_TICK") {
            if let Ok(val) = per_tick.parse::<usize>() {
                config.pipeline.relay_updates_per_tick = val;
            }
        }

        if let Ok(max) = std::env::var("SVB_RECONNECT_MAX_MS") {
            if let Ok(val) = max.parse::<u64>() {
                config.transport.reconnect_max = Duration::from_millis(val);
            }
        }

        if let Ok(level) = std::env::var("SVB_LOG_LEVEL") {
            config.logging.log_level = level.parse::<Level>().map_err(|_| {
                BridgeError::ConfigError(format!("Invalid SVB_LOG_LEVEL: {level}"))
            })?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BridgeError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| BridgeError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.transport.validate());
        errors.extend(self.pipeline.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(BridgeError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Byte-stream channel configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Channel name; mapped to `\\.\pipe\<name>` or `<tmp>/<name>.sock`
    pub pipe_name: String,

    /// Delay before the first reconnect attempt
    #[serde(with = "duration_serde")]
    pub reconnect_initial: Duration,

    /// Upper bound for the reconnect delay
    #[serde(with = "duration_serde")]
    pub reconnect_max: Duration,

    /// Growth factor applied to the delay after each failed cycle
    pub reconnect_multiplier: f64,

    /// Frames queued for the writer task before ticks start skipping
    pub write_queue: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            pipe_name: String::from(DEFAULT_PIPE_NAME),
            reconnect_initial: Duration::from_millis(100),
            reconnect_max: Duration::from_secs(5),
            reconnect_multiplier: 2.0,
            write_queue: 1,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.pipe_name.is_empty() {
            errors.push("Pipe name cannot be empty".to_string());
        } else if self.pipe_name.contains(|c: char| c == '/' || c == '\\') {
            errors.push(format!(
                "Pipe name must be a bare name without separators: '{}'",
                self.pipe_name
            ));
        }

        if self.reconnect_initial.as_millis() < 10 {
            errors.push("Reconnect delay too short (minimum: 10ms)".to_string());
        }

        if self.reconnect_max < self.reconnect_initial {
            errors.push("Reconnect maximum must not be below the initial delay".to_string());
        } else if self.reconnect_max.as_secs() > 300 {
            errors.push("Reconnect maximum too long (maximum: 300s)".to_string());
        }

        if !(1.0..=10.0).contains(&self.reconnect_multiplier) {
            errors.push(format!(
                "Invalid reconnect multiplier: {} (valid range: 1.0-10.0)",
                self.reconnect_multiplier
            ));
        }

        if self.write_queue == 0 {
            errors.push("Write queue must hold at least one frame".to_string());
        } else if self.write_queue > 64 {
            errors.push(format!(
                "Write queue too deep: {} (frames would arrive stale; maximum: 64)",
                self.write_queue
            ));
        }

        errors
    }
}

/// Per-tick update pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Participants whose relay set is recomputed per tick (round-robin)
    pub relay_updates_per_tick: usize,

    /// Gate `HAS_CONNECTION` on the antenna relay graph
    pub radio_gating: bool,

    /// Send positions in the listener's reference frame instead of world space
    pub listener_relative: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            relay_updates_per_tick: 1,
            radio_gating: true,
            listener_relative: true,
        }
    }
}

impl PipelineConfig {
    /// Validate pipeline configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.radio_gating && self.relay_updates_per_tick == 0 {
            errors.push(
                "relay_updates_per_tick must be greater than 0 when radio_gating is enabled"
                    .to_string(),
            );
        } else if self.relay_updates_per_tick > 64 {
            errors.push(format!(
                "relay_updates_per_tick very high: {} (each update floods the relay graph)",
                self.relay_updates_per_tick
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("spatial-voice-bridge"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
