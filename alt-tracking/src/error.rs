use thiserror::Error;

use crate::types::NodeHandle;

/// Errors reported by the tracking network and its tasks
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackingError {
    /// Node is no longer part of the network
    #[error("Node {0} not found")]
    NodeNotFound(NodeHandle),

    /// Node exists but does not support the requested operation
    #[error("Node {0} does not support tracking")]
    InvalidNode(NodeHandle),

    /// The task stopped producing states
    #[error("Tracking task for {0} has finished")]
    TaskFinished(NodeHandle),

    /// Environment code could not be turned into an environment
    #[error("Invalid environment code: {0}")]
    InvalidEnvironment(String),

    /// Any other transport failure
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for tracking network operations
pub type Result<T> = std::result::Result<T, TrackingError>;
