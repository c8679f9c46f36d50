//! In-process simulated device network
//!
//! Implements every capability trait of [`crate::network`] against a shared
//! in-memory node tree. Used by the collector binary when no hardware
//! backend is available, and by tests that want realistic behavior
//! (busy nodes, finishing tasks, stage warm-up) without a device.
//!
//! ```rust
//! use alt_tracking::sim::{SimEnvironmentLibrary, SimNetwork, SimTaskFactory, SimTiming};
//! use alt_tracking::{EnvironmentLibrary, Network, TaskFactory};
//!
//! let network = SimNetwork::with_timing(SimTiming::instant());
//! network.connect_device("1A2B");
//!
//! let factory = SimTaskFactory::new(network.clone());
//! let environment = SimEnvironmentLibrary
//!     .create_environment("AntilatencyAltEnvironmentHorizontalGrid~AgAF")
//!     .unwrap();
//!
//! let nodes = factory.find_supported_nodes(&network).unwrap();
//! let mut task = factory.start_task(&network, nodes[0], environment.as_ref()).unwrap();
//! assert!(!task.is_task_finished());
//! assert!(task.state(0.03).unwrap().stage().is_locked());
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::{Result, TrackingError};
use crate::network::{
    Environment, EnvironmentLibrary, Network, TaskFactory, TrackingTask,
    HARDWARE_SERIAL_NUMBER_KEY,
};
use crate::types::{NodeHandle, Pose, Quaternion, Stability, Stage, TrackingState, UpdateId, Vector3};

/// Prefix every accepted environment code starts with
pub const ENVIRONMENT_CODE_PREFIX: &str = "AntilatencyAltEnvironment";

/// How long a simulated task spends in each warm-up stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimTiming {
    /// Time in `InertialDataInitialization`
    pub warmup: Duration,
    /// Time in `Tracking3Dof` before the 6-DoF lock
    pub orientation: Duration,
}

impl SimTiming {
    /// Tasks are locked from their first state
    pub fn instant() -> Self {
        Self {
            warmup: Duration::ZERO,
            orientation: Duration::ZERO,
        }
    }
}

impl Default for SimTiming {
    fn default() -> Self {
        Self {
            warmup: Duration::from_millis(300),
            orientation: Duration::from_millis(500),
        }
    }
}

#[derive(Debug)]
struct SimDevice {
    serial: String,
    device_node: NodeHandle,
    tracker_node: NodeHandle,
}

#[derive(Debug)]
struct SimState {
    timing: SimTiming,
    next_node: u32,
    update_id: UpdateId,
    devices: Vec<SimDevice>,
    parents: HashMap<NodeHandle, NodeHandle>,
    properties: HashMap<(NodeHandle, String), String>,
    running: HashSet<NodeHandle>,
    tasks_started: usize,
}

impl SimState {
    fn allocate_node(&mut self) -> NodeHandle {
        self.next_node += 1;
        NodeHandle::new(self.next_node)
    }

    fn node_exists(&self, node: NodeHandle) -> bool {
        self.devices
            .iter()
            .any(|d| d.device_node == node || d.tracker_node == node)
    }

    fn bump(&mut self) {
        self.update_id = self.update_id.wrapping_add(1);
    }
}

/// Simulated device network
///
/// Cheap to clone; all clones share the same node tree.
#[derive(Debug, Clone)]
pub struct SimNetwork {
    inner: Arc<Mutex<SimState>>,
}

impl SimNetwork {
    pub fn new() -> Self {
        Self::with_timing(SimTiming::default())
    }

    pub fn with_timing(timing: SimTiming) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                timing,
                next_node: 0,
                update_id: 0,
                devices: Vec::new(),
                parents: HashMap::new(),
                properties: HashMap::new(),
                running: HashSet::new(),
                tasks_started: 0,
            })),
        }
    }

    /// Plug in a tracker whose device node reports `serial`
    ///
    /// Returns the tracker node tasks are started on.
    pub fn connect_device(&self, serial: &str) -> NodeHandle {
        let mut state = self.inner.lock();
        let device_node = state.allocate_node();
        let tracker_node = state.allocate_node();
        state.parents.insert(tracker_node, device_node);
        state.properties.insert(
            (device_node, HARDWARE_SERIAL_NUMBER_KEY.to_string()),
            serial.to_string(),
        );
        state.devices.push(SimDevice {
            serial: serial.to_string(),
            device_node,
            tracker_node,
        });
        state.bump();
        tracing::debug!("Simulated device {} connected as {}", serial, tracker_node);
        tracker_node
    }

    /// Unplug every tracker reporting `serial`
    ///
    /// Returns false when no such device was connected.
    pub fn disconnect_device(&self, serial: &str) -> bool {
        let mut state = self.inner.lock();
        let removed: Vec<SimDevice> = {
            let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.devices)
                .into_iter()
                .partition(|d| d.serial == serial);
            state.devices = kept;
            gone
        };
        if removed.is_empty() {
            return false;
        }
        for device in &removed {
            state.parents.remove(&device.tracker_node);
            state
                .properties
                .retain(|(node, _), _| *node != device.device_node && *node != device.tracker_node);
            tracing::debug!("Simulated device {} disconnected", device.serial);
        }
        state.bump();
        true
    }

    /// Overwrite a string property on any node
    pub fn set_property(&self, node: NodeHandle, key: &str, value: &str) {
        self.inner
            .lock()
            .properties
            .insert((node, key.to_string()), value.to_string());
    }

    /// Device node (parent) of a tracker node
    pub fn device_node(&self, tracker: NodeHandle) -> Option<NodeHandle> {
        self.inner.lock().parents.get(&tracker).copied()
    }

    /// Number of tasks currently alive
    pub fn running_task_count(&self) -> usize {
        self.inner.lock().running.len()
    }

    /// Total number of tasks ever started
    pub fn tasks_started(&self) -> usize {
        self.inner.lock().tasks_started
    }

    pub fn device_count(&self) -> usize {
        self.inner.lock().devices.len()
    }
}

impl Default for SimNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl Network for SimNetwork {
    fn update_id(&self) -> UpdateId {
        self.inner.lock().update_id
    }

    fn node_parent(&self, node: NodeHandle) -> Result<NodeHandle> {
        self.inner
            .lock()
            .parents
            .get(&node)
            .copied()
            .ok_or(TrackingError::NodeNotFound(node))
    }

    fn node_string_property(&self, node: NodeHandle, key: &str) -> Result<String> {
        let state = self.inner.lock();
        if !state.node_exists(node) {
            return Err(TrackingError::NodeNotFound(node));
        }
        Ok(state
            .properties
            .get(&(node, key.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

/// Simulated environment
#[derive(Debug, Clone, PartialEq)]
pub struct SimEnvironment {
    code: String,
}

impl Environment for SimEnvironment {
    fn code(&self) -> &str {
        &self.code
    }
}

/// Accepts codes shaped like `AntilatencyAltEnvironment<Kind>~<payload>`
#[derive(Debug, Clone, Copy, Default)]
pub struct SimEnvironmentLibrary;

impl EnvironmentLibrary for SimEnvironmentLibrary {
    fn create_environment(&self, code: &str) -> Result<Arc<dyn Environment>> {
        let (kind, payload) = code
            .split_once('~')
            .ok_or_else(|| TrackingError::InvalidEnvironment(code.to_string()))?;
        if !kind.starts_with(ENVIRONMENT_CODE_PREFIX)
            || kind.len() == ENVIRONMENT_CODE_PREFIX.len()
            || payload.is_empty()
        {
            return Err(TrackingError::InvalidEnvironment(code.to_string()));
        }
        Ok(Arc::new(SimEnvironment {
            code: code.to_string(),
        }))
    }
}

/// Starts [`SimTask`]s on a [`SimNetwork`]
///
/// The factory resolves nodes against its own network handle; the
/// `network` argument of the trait methods is accepted for interface
/// compatibility.
#[derive(Debug, Clone)]
pub struct SimTaskFactory {
    network: SimNetwork,
}

impl SimTaskFactory {
    pub fn new(network: SimNetwork) -> Self {
        Self { network }
    }
}

impl TaskFactory for SimTaskFactory {
    fn find_supported_nodes(&self, _network: &dyn Network) -> Result<Vec<NodeHandle>> {
        let state = self.network.inner.lock();
        Ok(state.devices.iter().map(|d| d.tracker_node).collect())
    }

    fn start_task(
        &self,
        _network: &dyn Network,
        node: NodeHandle,
        environment: &dyn Environment,
    ) -> Result<Box<dyn TrackingTask>> {
        let mut state = self.network.inner.lock();
        let index = state
            .devices
            .iter()
            .position(|d| d.tracker_node == node)
            .ok_or(TrackingError::InvalidNode(node))?;
        if !state.running.insert(node) {
            return Err(TrackingError::Transport(format!("{} is busy", node)));
        }
        state.tasks_started += 1;
        tracing::debug!("Simulated task started on {} in {}", node, environment.code());

        Ok(Box::new(SimTask {
            network: Arc::clone(&self.network.inner),
            node,
            phase: index as f32,
            timing: state.timing,
            started: Instant::now(),
        }))
    }
}

/// Simulated tracking task
///
/// Walks through the warm-up stages, then reports a 6-DoF lock while
/// circling at head height. Finishes when its node disconnects.
#[derive(Debug)]
pub struct SimTask {
    network: Arc<Mutex<SimState>>,
    node: NodeHandle,
    phase: f32,
    timing: SimTiming,
    started: Instant,
}

impl SimTask {
    const RADIUS: f32 = 1.5;
    const HEIGHT: f32 = 1.7;
    const ANGULAR_SPEED: f32 = 0.5;

    fn stage_at(&self, elapsed: Duration) -> Stage {
        if elapsed < self.timing.warmup {
            Stage::InertialDataInitialization
        } else if elapsed < self.timing.warmup + self.timing.orientation {
            Stage::Tracking3Dof
        } else {
            Stage::Tracking6Dof
        }
    }
}

impl TrackingTask for SimTask {
    fn is_task_finished(&self) -> bool {
        !self.network.lock().node_exists(self.node)
    }

    fn state(&mut self, _angular_velocity_window_secs: f32) -> Result<TrackingState> {
        if self.is_task_finished() {
            return Err(TrackingError::TaskFinished(self.node));
        }

        let elapsed = self.started.elapsed();
        let stage = self.stage_at(elapsed);
        if !stage.is_locked() {
            return Ok(TrackingState {
                stability: Stability { stage, value: 0.0 },
                ..TrackingState::default()
            });
        }

        let angle = self.phase + elapsed.as_secs_f32() * Self::ANGULAR_SPEED;
        let position = Vector3::new(
            Self::RADIUS * angle.cos(),
            Self::HEIGHT,
            Self::RADIUS * angle.sin(),
        );
        let velocity = Vector3::new(
            -Self::RADIUS * Self::ANGULAR_SPEED * angle.sin(),
            0.0,
            Self::RADIUS * Self::ANGULAR_SPEED * angle.cos(),
        );

        Ok(TrackingState {
            pose: Pose {
                position,
                rotation: Quaternion::IDENTITY,
            },
            velocity,
            local_angular_velocity: Vector3::new(0.0, Self::ANGULAR_SPEED, 0.0),
            stability: Stability { stage, value: 1.0 },
        })
    }
}

impl Drop for SimTask {
    fn drop(&mut self) {
        self.network.lock().running.remove(&self.node);
    }
}
