//! Scripted tracking network for testing.
//!
//! Provides mock implementations of the `alt_tracking` traits whose node
//! tree, readings and failure modes are set directly by the test. Every
//! task start and release is appended to a shared event log so tests can
//! check the order in which tasks come and go.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use alt_session::{ContextSet, EnvironmentContext};
use alt_tracking::{
    Environment, EnvironmentLibrary, Network, NodeHandle, Stage, TaskFactory, TrackingError,
    TrackingState, TrackingTask, UpdateId, Vector3, HARDWARE_SERIAL_NUMBER_KEY,
};

pub const PRIMARY_CODE: &str = "mock-primary";
pub const SECONDARY_CODE: &str = "mock-secondary";

/// Task lifecycle events in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Started { node: NodeHandle, environment: String },
    Released { node: NodeHandle },
}

#[derive(Debug, Clone)]
struct MockNode {
    tracker: NodeHandle,
    parent: NodeHandle,
    serial: String,
    stage: Stage,
    position: Vector3,
    fail_state: bool,
    finished: bool,
}

#[derive(Debug, Default)]
struct NetState {
    update_id: UpdateId,
    next_handle: u32,
    nodes: Vec<MockNode>,
    events: Vec<TaskEvent>,
    fail_discovery: bool,
}

impl NetState {
    fn node(&self, tracker: NodeHandle) -> Option<&MockNode> {
        self.nodes.iter().find(|n| n.tracker == tracker)
    }

    fn node_mut(&mut self, tracker: NodeHandle) -> Option<&mut MockNode> {
        self.nodes.iter_mut().find(|n| n.tracker == tracker)
    }
}

/// Mock network whose nodes are scripted by the test.
///
/// Cloning shares the same state, so one clone can go into a session
/// while the test keeps another to drive it.
#[derive(Debug, Clone, Default)]
pub struct MockNetwork {
    inner: Arc<Mutex<NetState>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tracker whose parent reports `serial`. Bumps the update id.
    pub fn add_device(&self, serial: &str) -> NodeHandle {
        let mut state = self.inner.lock().unwrap();
        state.next_handle += 2;
        let parent = NodeHandle::new(state.next_handle - 1);
        let tracker = NodeHandle::new(state.next_handle);
        state.nodes.push(MockNode {
            tracker,
            parent,
            serial: serial.to_string(),
            stage: Stage::InertialDataInitialization,
            position: Vector3::ZERO,
            fail_state: false,
            finished: false,
        });
        state.update_id += 1;
        tracker
    }

    /// Remove a tracker from the tree. Bumps the update id.
    pub fn remove_device(&self, tracker: NodeHandle) {
        let mut state = self.inner.lock().unwrap();
        state.nodes.retain(|n| n.tracker != tracker);
        state.update_id += 1;
    }

    /// Set what the tracker's task reports from now on
    pub fn set_reading(&self, tracker: NodeHandle, stage: Stage, position: Vector3) {
        let mut state = self.inner.lock().unwrap();
        if let Some(node) = state.node_mut(tracker) {
            node.stage = stage;
            node.position = position;
        }
    }

    /// Make state retrieval fail for the tracker's task
    pub fn fail_state(&self, tracker: NodeHandle) {
        if let Some(node) = self.inner.lock().unwrap().node_mut(tracker) {
            node.fail_state = true;
        }
    }

    /// Make the tracker's task report finished
    pub fn finish(&self, tracker: NodeHandle) {
        if let Some(node) = self.inner.lock().unwrap().node_mut(tracker) {
            node.finished = true;
        }
    }

    pub fn fail_discovery(&self, fail: bool) {
        self.inner.lock().unwrap().fail_discovery = fail;
    }

    /// Advance the update id without changing the tree
    pub fn bump(&self) {
        self.inner.lock().unwrap().update_id += 1;
    }

    pub fn events(&self) -> Vec<TaskEvent> {
        self.inner.lock().unwrap().events.clone()
    }

    pub fn started(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, TaskEvent::Started { .. }))
            .count()
    }

    pub fn released(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, TaskEvent::Released { .. }))
            .count()
    }

    /// Tasks started and not yet released
    pub fn live_tasks(&self) -> usize {
        self.started() - self.released()
    }

    fn record(&self, event: TaskEvent) {
        self.inner.lock().unwrap().events.push(event);
    }
}

impl Network for MockNetwork {
    fn update_id(&self) -> UpdateId {
        self.inner.lock().unwrap().update_id
    }

    fn node_parent(&self, node: NodeHandle) -> alt_tracking::Result<NodeHandle> {
        self.inner
            .lock()
            .unwrap()
            .node(node)
            .map(|n| n.parent)
            .ok_or(TrackingError::NodeNotFound(node))
    }

    fn node_string_property(&self, node: NodeHandle, key: &str) -> alt_tracking::Result<String> {
        let state = self.inner.lock().unwrap();
        let owner = state
            .nodes
            .iter()
            .find(|n| n.parent == node)
            .ok_or(TrackingError::NodeNotFound(node))?;
        if key == HARDWARE_SERIAL_NUMBER_KEY {
            Ok(owner.serial.clone())
        } else {
            Ok(String::new())
        }
    }
}

/// Mock task reading its script from the network state
pub struct MockTask {
    network: MockNetwork,
    node: NodeHandle,
}

impl TrackingTask for MockTask {
    fn is_task_finished(&self) -> bool {
        let state = self.network.inner.lock().unwrap();
        state.node(self.node).map_or(true, |n| n.finished)
    }

    fn state(&mut self, _window: f32) -> alt_tracking::Result<TrackingState> {
        let state = self.network.inner.lock().unwrap();
        let node = state
            .node(self.node)
            .ok_or(TrackingError::TaskFinished(self.node))?;
        if node.fail_state {
            return Err(TrackingError::Transport("scripted failure".to_string()));
        }
        Ok(TrackingState::at(node.stage, node.position))
    }
}

impl Drop for MockTask {
    fn drop(&mut self) {
        self.network.record(TaskEvent::Released { node: self.node });
    }
}

/// Mock factory that starts [`MockTask`]s on every node of a [`MockNetwork`]
#[derive(Debug, Clone)]
pub struct MockFactory {
    network: MockNetwork,
    fail_start: Arc<AtomicBool>,
    plug_during_listing: Arc<Mutex<Option<String>>>,
}

impl MockFactory {
    pub fn new(network: MockNetwork) -> Self {
        Self {
            network,
            fail_start: Arc::new(AtomicBool::new(false)),
            plug_during_listing: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Plug in `serial` right after the next node listing is taken, so the
    /// listing misses it while the update id moves past it.
    pub fn plug_during_next_listing(&self, serial: &str) {
        *self.plug_during_listing.lock().unwrap() = Some(serial.to_string());
    }
}

impl TaskFactory for MockFactory {
    fn find_supported_nodes(&self, _network: &dyn Network) -> alt_tracking::Result<Vec<NodeHandle>> {
        let nodes = {
            let state = self.network.inner.lock().unwrap();
            if state.fail_discovery {
                return Err(TrackingError::Transport("scripted discovery failure".to_string()));
            }
            state.nodes.iter().map(|n| n.tracker).collect()
        };

        if let Some(serial) = self.plug_during_listing.lock().unwrap().take() {
            self.network.add_device(&serial);
        }
        Ok(nodes)
    }

    fn start_task(
        &self,
        _network: &dyn Network,
        node: NodeHandle,
        environment: &dyn Environment,
    ) -> alt_tracking::Result<Box<dyn TrackingTask>> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(TrackingError::Transport("scripted start failure".to_string()));
        }
        self.network.record(TaskEvent::Started {
            node,
            environment: environment.code().to_string(),
        });
        Ok(Box::new(MockTask {
            network: self.network.clone(),
            node,
        }))
    }
}

#[derive(Debug)]
pub struct MockEnvironment {
    code: String,
}

impl Environment for MockEnvironment {
    fn code(&self) -> &str {
        &self.code
    }
}

/// Accepts every code except the empty string
pub struct MockLibrary;

impl EnvironmentLibrary for MockLibrary {
    fn create_environment(&self, code: &str) -> alt_tracking::Result<Arc<dyn Environment>> {
        if code.is_empty() {
            return Err(TrackingError::InvalidEnvironment(code.to_string()));
        }
        Ok(Arc::new(MockEnvironment {
            code: code.to_string(),
        }))
    }
}

/// Both mock environments, with `active` selected
pub fn mock_contexts(active: EnvironmentContext) -> ContextSet {
    ContextSet::load(&MockLibrary, PRIMARY_CODE, SECONDARY_CODE, active)
        .expect("mock environments always load")
}
