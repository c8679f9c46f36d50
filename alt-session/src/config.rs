//! Configuration for a collection session
//!
//! Controls tick cadence, state retrieval, console verbosity, the output
//! file and the environment codes of each context.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::EnvironmentContext;
use crate::error::{Result, SessionError};

/// Horizontal-grid environment used for the primary context by default
pub const DEFAULT_PRIMARY_ENVIRONMENT: &str = "AntilatencyAltEnvironmentHorizontalGrid~AgAHB2q8dD8zM7M-abeyviGwsj4AAAAAAQAAQEAhsDI_AA0GAQMDAgEGAwMCAwIGBQMDBAEEBgIGBgIBBgIAAwMABQMEAwAAAQM";

/// Horizontal-grid environment used for the secondary context by default
pub const DEFAULT_SECONDARY_ENVIRONMENT: &str = "AntilatencyAltEnvironmentHorizontalGrid~AgAFBQgFXz_NzMw-Jo7OvZqZmT4AAAAAATMzM0CamRk_AAYABAMAAQEBAAIEAAIEAgMEBAI";

/// Session configuration
///
/// Durations are stored in milliseconds when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Target period of the polling loop
    /// Default: 16 ms (~60 Hz)
    #[serde(with = "duration_millis")]
    pub tick_interval: Duration,

    /// Averaging window for angular velocity when retrieving states
    /// Default: 0.03 s
    pub angular_velocity_window_secs: f32,

    /// Per-device console diagnostics are printed only while at most this
    /// many devices are tracked
    /// Default: 2
    pub verbose_device_limit: usize,

    /// File samples are appended to
    /// Default: nodeData.txt
    pub output_path: PathBuf,

    /// Environment code of the primary context
    pub primary_environment: String,

    /// Environment code of the secondary context
    pub secondary_environment: String,

    /// Context active at startup
    /// Default: primary
    pub initial_context: EnvironmentContext,

    /// Wait after the network is created before the first discovery
    /// Default: 1 second
    #[serde(with = "duration_millis")]
    pub settle_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(16),
            angular_velocity_window_secs: 0.03,
            verbose_device_limit: 2,
            output_path: PathBuf::from("nodeData.txt"),
            primary_environment: DEFAULT_PRIMARY_ENVIRONMENT.to_string(),
            secondary_environment: DEFAULT_SECONDARY_ENVIRONMENT.to_string(),
            initial_context: EnvironmentContext::Primary,
            settle_delay: Duration::from_secs(1),
        }
    }
}

impl SessionConfig {
    /// Create a new SessionConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON configuration file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| SessionError::ConfigLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&contents).map_err(|e| SessionError::ConfigLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_angular_velocity_window(mut self, secs: f32) -> Self {
        self.angular_velocity_window_secs = secs;
        self
    }

    pub fn with_verbose_device_limit(mut self, limit: usize) -> Self {
        self.verbose_device_limit = limit;
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_environments(mut self, primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        self.primary_environment = primary.into();
        self.secondary_environment = secondary.into();
        self
    }

    pub fn with_initial_context(mut self, context: EnvironmentContext) -> Self {
        self.initial_context = context;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Check that the values can drive a session
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(SessionError::Config("tick interval must be positive".to_string()));
        }

        if !self.angular_velocity_window_secs.is_finite() || self.angular_velocity_window_secs <= 0.0 {
            return Err(SessionError::Config(format!(
                "angular velocity window must be a positive number of seconds, got {}",
                self.angular_velocity_window_secs
            )));
        }

        if self.output_path.as_os_str().is_empty() {
            return Err(SessionError::Config("output path must not be empty".to_string()));
        }

        if self.primary_environment.trim().is_empty() || self.secondary_environment.trim().is_empty() {
            return Err(SessionError::Config(
                "both environment codes must be set".to_string(),
            ));
        }

        Ok(())
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
