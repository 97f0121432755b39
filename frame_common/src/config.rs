//! Configuration loading traits and types.
//!
//! Frame channel participants describe the channel they join in TOML. The
//! loader is a blanket trait over any `serde` deserializable struct, so
//! applications embed [`SharedConfig`] and [`ChannelConfig`] into their
//! own configuration types.
//!
//! # Usage
//!
//! ```rust,no_run
//! use frame_common::config::{ChannelConfig, ConfigError, ConfigLoader, SharedConfig};
//! use serde::Deserialize;
//! use std::path::Path;
//!
//! #[derive(Debug, Deserialize)]
//! struct MyAppConfig {
//!     shared: SharedConfig,
//!     channel: ChannelConfig,
//! }
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = MyAppConfig::load(Path::new("config.toml"))?;
//!     config.channel.validate()?;
//!     println!("Channel: {}", config.channel.base_name);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::consts::DEFAULT_MODE;

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
    /// Most verbose, includes per-frame skip traces.
    Trace,
    /// Per-frame exposition timing.
    Debug,
    /// Channel lifecycle events.
    #[default]
    Info,
    /// Rejected frames and teardown problems.
    Warn,
    /// Fatal channel failures.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields shared across all frame channel applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "cam0-producer"
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

fn default_mode() -> u32 {
    DEFAULT_MODE
}

/// Construction-time parameters of a frame channel.
///
/// # TOML Example
///
/// ```toml
/// [channel]
/// base_name = "cam0"
/// mode = 0o660
/// remove_on_close = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Base name shared out-of-band by all participants.
    pub base_name: String,

    /// Permission bits for the three named objects.
    #[serde(default = "default_mode")]
    pub mode: u32,

    /// Unlink the named objects when this participant closes the channel.
    #[serde(default)]
    pub remove_on_close: bool,
}

impl ChannelConfig {
    /// Channel config with default permissions and shared (non-owner) semantics.
    pub fn new(base_name: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
            mode: DEFAULT_MODE,
            remove_on_close: false,
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `base_name` is empty or only slashes
    /// - `base_name` contains `/` past the leading one, or NUL
    /// - `mode` has bits outside `0o777`
    pub fn validate(&self) -> Result<(), ConfigError> {
        let stripped = self.base_name.trim_start_matches('/');
        if stripped.is_empty() {
            return Err(ConfigError::ValidationError(
                "base_name cannot be empty".to_string(),
            ));
        }
        if stripped.contains('/') || stripped.contains('\0') {
            return Err(ConfigError::ValidationError(format!(
                "base_name '{}' must not contain '/' or NUL",
                self.base_name
            )));
        }
        if self.mode & !0o777 != 0 {
            return Err(ConfigError::ValidationError(format!(
                "mode {:#o} has bits outside 0o777",
                self.mode
            )));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
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
