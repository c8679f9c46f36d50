//! Device identity and the per-device handle stored in the registry

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use alt_tracking::{NodeHandle, TrackingState, TrackingTask};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::context::EnvironmentContext;
use crate::error::{Result, SessionError};
use crate::task_guard::TaskGuard;

/// Unique identifier of a physical tracker
///
/// Derived from the hardware serial number of the tracker's parent node,
/// read as a hexadecimal number. Displays as uppercase hex without padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(u64);

impl DeviceId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Parse a hardware serial number
    ///
    /// Surrounding whitespace and an optional `0x` prefix are ignored.
    pub fn from_serial(serial: &str) -> Result<Self> {
        let trimmed = serial.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        u64::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|source| SessionError::InvalidSerial {
                serial: serial.to_string(),
                source,
            })
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

impl FromStr for DeviceId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_serial(s)
    }
}

impl From<u64> for DeviceId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// How a device's data is consumed downstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SubscriptionType {
    #[default]
    None,
    Position,
    Full,
}

/// One tracked device and the task bound to it
///
/// Identity fields are immutable. The task guard sits behind a mutex so
/// handles can be shared as `Arc<DeviceHandle>` between the registry and
/// a polling snapshot.
#[derive(Debug)]
pub struct DeviceHandle {
    id: DeviceId,
    subscription_type: SubscriptionType,
    node: NodeHandle,
    context: EnvironmentContext,
    guard: Mutex<TaskGuard>,
}

impl DeviceHandle {
    /// Wrap a freshly started task; the handle owns it until disposed
    pub fn new(
        id: DeviceId,
        subscription_type: SubscriptionType,
        task: Box<dyn TrackingTask>,
        node: NodeHandle,
        context: EnvironmentContext,
    ) -> Self {
        Self {
            id,
            subscription_type,
            node,
            context,
            guard: Mutex::new(TaskGuard::new(task)),
        }
    }

    /// Id parsed from the device's hardware serial
    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn subscription_type(&self) -> SubscriptionType {
        self.subscription_type
    }

    /// Tracking node the task runs on
    pub fn node(&self) -> NodeHandle {
        self.node
    }

    /// Context the task was started under
    pub fn context(&self) -> EnvironmentContext {
        self.context
    }

    /// True when the handle was started under a context other than `active`
    pub fn is_stale(&self, active: EnvironmentContext) -> bool {
        self.context != active
    }

    /// Stop the task. Later calls do nothing.
    pub fn dispose(&self) {
        self.guard.lock().dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.guard.lock().is_disposed()
    }

    /// True once the task ended on its own or the handle was disposed
    pub fn is_finished(&self) -> bool {
        self.guard.lock().is_finished()
    }

    /// Latest extrapolated reading
    ///
    /// `Ok(None)` after dispose. Errors come straight from the task.
    pub fn state(&self, angular_velocity_window_secs: f32) -> Result<Option<TrackingState>> {
        self.guard.lock().state(angular_velocity_window_secs)
    }

    /// Offset from task start of the last 6-DoF reading, zero before the first
    pub fn last_stable_reading(&self) -> Duration {
        self.guard.lock().last_stable_reading()
    }

    /// Time elapsed since the last 6-DoF reading, `None` before the first
    pub fn since_last_stable_reading(&self) -> Option<Duration> {
        self.guard.lock().since_last_stable_reading()
    }
}
