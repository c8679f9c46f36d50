//! # Alt Tracking
//!
//! Boundary contracts between the alt-collector session manager and a
//! motion-tracking device network.
//!
//! ## Overview
//!
//! The session manager never talks to a tracking library directly. It
//! consumes four narrow capabilities:
//!
//! - [`Network`]: node tree and update generation of the device network
//! - [`TaskFactory`]: finds trackable nodes and starts tracking tasks
//! - [`TrackingTask`]: one running pose estimator (released on drop)
//! - [`EnvironmentLibrary`]: turns environment codes into [`Environment`]s
//!
//! The [`sim`] module implements all of them in-process.
//!
//! ## Architecture
//!
//! ```text
//! alt-session (discovery, polling loop)
//!     ↓
//! alt-tracking traits
//!     ↓
//! backend (sim::SimNetwork, or an adapter over a vendor library)
//! ```

mod error;
mod network;
pub mod sim;
mod types;

pub use error::{Result, TrackingError};
pub use network::{
    Environment, EnvironmentLibrary, Network, TaskFactory, TrackingTask,
    HARDWARE_SERIAL_NUMBER_KEY,
};
pub use types::{NodeHandle, Pose, Quaternion, Stability, Stage, TrackingState, UpdateId, Vector3};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Environment, EnvironmentLibrary, Network, NodeHandle, Stage, TaskFactory, TrackingError,
        TrackingState, TrackingTask, Vector3,
    };
}
