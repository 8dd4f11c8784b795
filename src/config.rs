//! Coordinator Configuration
//!
//! Configuration for anchors, coordinators and logging. Can be built in code
//! with the `with_*` methods, loaded from JSON, and overlaid with
//! `GRANT_COORDINATOR_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::{CoordinatorError, CoordinatorResult};
use crate::runtime::channels::EVENT_CHANNEL_SIZE;

/// Prefix of the environment variables read by `with_env_overrides`
pub const ENV_PREFIX: &str = "GRANT_COORDINATOR_";

/// Default number of trigger firings whose answers may be outstanding at once
pub const TRIGGER_BUFFER: usize = 16;

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (overridden by `RUST_LOG`)
    #[serde(default = "default_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,

    /// Directory for daily rolling log files (stderr only if unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// File name prefix for rolling log files
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_file_prefix() -> String {
    "grant-coordinator".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            log_dir: None,
            file_prefix: default_file_prefix(),
        }
    }
}

impl LoggingConfig {
    /// Set the default filter directive
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Enable or disable JSON output
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Write logs to daily rolling files in `dir`
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }
}

/// Configuration for the grant coordinator
///
/// ```ignore
/// let config = CoordinatorConfig::new()
///     .with_verbose(true)
///     .with_trigger_buffer(4)
///     .with_env_overrides()?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Log every capability answer at debug level
    #[serde(default)]
    pub verbose: bool,

    /// Buffer size of the authority event channel
    #[serde(default = "default_event_channel_size")]
    pub event_channel_size: usize,

    /// Trigger firings whose answers may be outstanding at once
    #[serde(default = "default_trigger_buffer")]
    pub trigger_buffer: usize,

    /// Logging setup
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_event_channel_size() -> usize {
    EVENT_CHANNEL_SIZE
}

fn default_trigger_buffer() -> usize {
    TRIGGER_BUFFER
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            event_channel_size: EVENT_CHANNEL_SIZE,
            trigger_buffer: TRIGGER_BUFFER,
            logging: LoggingConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Create a default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> CoordinatorResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> CoordinatorResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "Loaded coordinator config");
        Self::from_json_str(&contents)
    }

    /// Enable or disable per-capability debug logging
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the event channel buffer size
    pub fn with_event_channel_size(mut self, size: usize) -> Self {
        self.event_channel_size = size;
        self
    }

    /// Set how many trigger firings may be outstanding at once
    pub fn with_trigger_buffer(mut self, size: usize) -> Self {
        self.trigger_buffer = size;
        self
    }

    /// Set the logging configuration
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Overlay `GRANT_COORDINATOR_*` environment variables
    pub fn with_env_overrides(self) -> CoordinatorResult<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from a `GRANT_COORDINATOR_*` lookup
    ///
    /// Recognized keys: `VERBOSE`, `EVENT_CHANNEL_SIZE`, `TRIGGER_BUFFER`,
    /// `LOG_LEVEL`, `LOG_JSON`, `LOG_DIR`.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> CoordinatorResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(value) = get("VERBOSE") {
            self.verbose = parse_bool("VERBOSE", &value)?;
        }
        if let Some(value) = get("EVENT_CHANNEL_SIZE") {
            self.event_channel_size = parse_usize("EVENT_CHANNEL_SIZE", &value)?;
        }
        if let Some(value) = get("TRIGGER_BUFFER") {
            self.trigger_buffer = parse_usize("TRIGGER_BUFFER", &value)?;
        }
        if let Some(value) = get("LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = get("LOG_JSON") {
            self.logging.json = parse_bool("LOG_JSON", &value)?;
        }
        if let Some(value) = get("LOG_DIR") {
            self.logging.log_dir = Some(PathBuf::from(value));
        }

        self.validate()?;
        Ok(self)
    }

    /// Check that every value is usable
    pub fn validate(&self) -> CoordinatorResult<()> {
        if self.event_channel_size == 0 {
            return Err(CoordinatorError::Config(
                "event_channel_size must be greater than zero".into(),
            ));
        }
        if self.trigger_buffer == 0 {
            return Err(CoordinatorError::Config(
                "trigger_buffer must be greater than zero".into(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(CoordinatorError::Config("logging.level must not be empty".into()));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> CoordinatorResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CoordinatorError::Config(format!(
            "{}{} must be a boolean, got '{}'",
            ENV_PREFIX, key, other
        ))),
    }
}

fn parse_usize(key: &str, value: &str) -> CoordinatorResult<usize> {
    value.trim().parse().map_err(|_| {
        CoordinatorError::Config(format!(
            "{}{} must be a positive integer, got '{}'",
            ENV_PREFIX, key, value
        ))
    })
}
