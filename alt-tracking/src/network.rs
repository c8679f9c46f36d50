//! Capability traits for the device network
//!
//! The session manager depends only on these traits. A backend (the
//! in-process simulator in [`crate::sim`], or an adapter over a vendor
//! library) implements them.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::types::{NodeHandle, TrackingState, UpdateId};

/// Property key holding a device's hardware serial number (hex string)
pub const HARDWARE_SERIAL_NUMBER_KEY: &str = "sys/HardwareSerialNumber";

/// Transport service of the device network
pub trait Network: Send + Sync {
    /// Current generation of the visible node set
    fn update_id(&self) -> UpdateId;

    /// Parent of `node` in the device tree
    fn node_parent(&self, node: NodeHandle) -> Result<NodeHandle>;

    /// String property of `node`; an absent property is an empty string
    fn node_string_property(&self, node: NodeHandle, key: &str) -> Result<String>;
}

/// A long-lived computation producing pose estimates for one node
///
/// Dropping the task releases it on the network. Implementations must not
/// panic in `Drop`.
pub trait TrackingTask: Send {
    /// True once the task stopped, e.g. because its node disconnected
    fn is_task_finished(&self) -> bool;

    /// Latest state, with angular velocity averaged over `angular_velocity_window_secs`
    fn state(&mut self, angular_velocity_window_secs: f32) -> Result<TrackingState>;
}

/// Opaque tracking-space descriptor
pub trait Environment: Send + Sync + fmt::Debug {
    /// Code the environment was created from
    fn code(&self) -> &str;
}

/// Resolves environment codes into environments
pub trait EnvironmentLibrary {
    fn create_environment(&self, code: &str) -> Result<Arc<dyn Environment>>;
}

/// Starts tracking tasks on supported nodes
pub trait TaskFactory {
    /// Nodes that currently accept a tracking task
    fn find_supported_nodes(&self, network: &dyn Network) -> Result<Vec<NodeHandle>>;

    /// Start a tracking task for `node` in `environment`
    fn start_task(
        &self,
        network: &dyn Network,
        node: NodeHandle,
        environment: &dyn Environment,
    ) -> Result<Box<dyn TrackingTask>>;
}
