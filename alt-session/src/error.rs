use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the device session manager
#[derive(Error, Debug)]
pub enum SessionError {
    /// Parent node reported no hardware serial number
    #[error("Empty serial number for {0}")]
    EmptySerial(alt_tracking::NodeHandle),

    /// Serial number is not a hexadecimal device id
    #[error("Invalid serial number '{serial}': {source}")]
    InvalidSerial {
        serial: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Error reported by the tracking network or a tracking task
    #[error("Tracking error: {0}")]
    Tracking(#[from] alt_tracking::TrackingError),

    /// Output sink could not be written
    #[error("Output sink error: {0}")]
    Sink(#[from] std::io::Error),

    /// Environment code for a context could not be loaded
    #[error("Failed to create {context} environment: {source}")]
    Environment {
        context: crate::context::EnvironmentContext,
        #[source]
        source: alt_tracking::TrackingError,
    },

    /// Configuration file could not be read or parsed
    #[error("Failed to load configuration from {path}: {message}")]
    ConfigLoad { path: PathBuf, message: String },

    /// Configuration values are inconsistent
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
