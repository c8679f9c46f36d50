//! # Alt Session
//!
//! Device session manager for the alt-collector.
//!
//! ## Overview
//!
//! This crate keeps a live registry of tracking devices on a network,
//! starts one tracking task per device under the active environment
//! context, polls every task at a fixed cadence and appends the samples
//! that pass its quality gates to an output sink.
//!
//! - [`DiscoveryEngine`] reconciles the registry with the network
//! - [`DevicePoller`] turns tracking states into [`SampleRecord`]s
//! - [`Session`] owns everything and drives the loop
//!
//! ## Architecture
//!
//! ```text
//! CommandSource ──► Session ──► DiscoveryEngine ──► DeviceRegistry
//!                     │                                  │
//!                     └──────► DevicePoller ◄────────────┘
//!                                   │
//!                                   ▼
//!                              OutputSink
//! ```
//!
//! The tracking network itself is reached only through the traits of
//! [`alt_tracking`].

pub mod command;
pub mod config;
pub mod context;
pub mod device;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod polling;
pub mod registry;
pub mod session;
pub mod shutdown;
pub mod sink;
pub mod task_guard;

pub use command::{ChannelCommands, Command, CommandSource, DeviceStatus, NoCommands, StatusReport, COMMAND_HELP};
pub use config::{SessionConfig, DEFAULT_PRIMARY_ENVIRONMENT, DEFAULT_SECONDARY_ENVIRONMENT};
pub use context::{ContextSet, EnvironmentContext};
pub use device::{DeviceHandle, DeviceId, SubscriptionType};
pub use discovery::{DiscoveryEngine, DiscoveryReport};
pub use error::{Result, SessionError};
pub use logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};
pub use polling::{DevicePoller, TickSummary};
pub use registry::DeviceRegistry;
pub use session::{Session, StatusHandler};
pub use shutdown::ShutdownToken;
pub use sink::{FileSink, MemorySink, OutputSink, SampleRecord, SessionMarker};
pub use task_guard::TaskGuard;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ChannelCommands, Command, CommandSource, ContextSet, DeviceId, DeviceRegistry,
        EnvironmentContext, FileSink, OutputSink, Session, SessionConfig, SessionError,
        ShutdownToken,
    };
}
