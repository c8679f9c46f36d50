//! Discovery and reconnection of tracking devices
//!
//! Reconciles the [`DeviceRegistry`] with the nodes the network currently
//! offers, under the active [`EnvironmentContext`].

use std::sync::Arc;

use alt_tracking::{Network, NodeHandle, TaskFactory, HARDWARE_SERIAL_NUMBER_KEY};

use crate::context::ContextSet;
use crate::device::{DeviceHandle, DeviceId, SubscriptionType};
use crate::error::{Result, SessionError};
use crate::registry::DeviceRegistry;

/// Counts from one discovery pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Nodes the factory reported as supported
    pub found: usize,
    /// New handles registered for previously unseen devices
    pub connected: usize,
    /// Stale handles torn down and restarted under the active context
    pub replaced: usize,
    /// Devices already tracked under the active context
    pub already_tracked: usize,
    /// Nodes skipped because of an error
    pub skipped: usize,
}

enum NodeOutcome {
    Connected,
    Replaced,
    AlreadyTracked,
}

/// Discovery over one network and task factory
pub struct DiscoveryEngine<'a> {
    network: &'a dyn Network,
    factory: &'a dyn TaskFactory,
}

impl<'a> DiscoveryEngine<'a> {
    pub fn new(network: &'a dyn Network, factory: &'a dyn TaskFactory) -> Self {
        Self { network, factory }
    }

    /// Register a handle for every supported node not yet tracked under the active context
    ///
    /// Each node is handled independently: a failure on one node is logged
    /// and counted, and the pass continues with the next node.
    pub fn discover_and_add(&self, contexts: &ContextSet, registry: &DeviceRegistry) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        let nodes = match self.factory.find_supported_nodes(self.network) {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::warn!("Failed to query supported nodes: {}", e);
                return report;
            }
        };

        report.found = nodes.len();
        if !nodes.is_empty() {
            tracing::info!("Found {} supported nodes", nodes.len());
        }

        for node in nodes {
            match self.connect_node(node, contexts, registry) {
                Ok(NodeOutcome::Connected) => report.connected += 1,
                Ok(NodeOutcome::Replaced) => report.replaced += 1,
                Ok(NodeOutcome::AlreadyTracked) => report.already_tracked += 1,
                Err(SessionError::EmptySerial(node)) => {
                    tracing::warn!("Empty serial number for {}, skipping", node);
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to connect device on {}: {}", node, e);
                    report.skipped += 1;
                }
            }
        }

        tracing::debug!(?report, "Discovery pass complete");
        report
    }

    /// Dispose every registered device, then rediscover under the active context
    ///
    /// All old tasks are released before any new task starts, so a
    /// physical device is never bound to two tasks at once.
    pub fn reconnect_all(&self, contexts: &ContextSet, registry: &DeviceRegistry) -> DiscoveryReport {
        let disposed = registry.dispose_all();
        tracing::info!(
            "Disconnected {} devices, reconnecting under {}",
            disposed,
            contexts.active()
        );
        self.discover_and_add(contexts, registry)
    }

    /// Hardware serial number of the device a tracking node belongs to
    fn resolve_device_id(&self, node: NodeHandle) -> Result<DeviceId> {
        let parent = self.network.node_parent(node)?;
        let serial = self
            .network
            .node_string_property(parent, HARDWARE_SERIAL_NUMBER_KEY)?;
        if serial.trim().is_empty() {
            return Err(SessionError::EmptySerial(node));
        }
        DeviceId::from_serial(&serial)
    }

    fn connect_node(
        &self,
        node: NodeHandle,
        contexts: &ContextSet,
        registry: &DeviceRegistry,
    ) -> Result<NodeOutcome> {
        let id = self.resolve_device_id(node)?;
        let active = contexts.active();

        let mut outcome = NodeOutcome::Connected;
        if let Some(existing) = registry.get(id) {
            if !existing.is_stale(active) {
                return Ok(NodeOutcome::AlreadyTracked);
            }

            if let Some(stale) = registry.try_remove(id) {
                stale.dispose();
            }
            tracing::info!(
                "Device {} was tracked under {}, restarting under {}",
                id,
                existing.context(),
                active
            );
            outcome = NodeOutcome::Replaced;
        }

        let task = self
            .factory
            .start_task(self.network, node, contexts.active_environment())?;
        let handle = Arc::new(DeviceHandle::new(id, SubscriptionType::None, task, node, active));

        if !registry.try_add(id, Arc::clone(&handle)) {
            handle.dispose();
            return Ok(NodeOutcome::AlreadyTracked);
        }

        tracing::info!("Connected device: {} ({})", id, active);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EnvironmentContext;
    use alt_tracking::sim::{SimEnvironmentLibrary, SimNetwork, SimTaskFactory, SimTiming};

    fn contexts() -> ContextSet {
        ContextSet::load(
            &SimEnvironmentLibrary,
            "AntilatencyAltEnvironmentHorizontalGrid~AAAA",
            "AntilatencyAltEnvironmentHorizontalGrid~BBBB",
            EnvironmentContext::Primary,
        )
        .unwrap()
    }

    #[test]
    fn test_discovers_simulated_devices() {
        let network = SimNetwork::with_timing(SimTiming::instant());
        network.connect_device("1A2B");
        network.connect_device("FF");
        let factory = SimTaskFactory::new(network.clone());
        let registry = DeviceRegistry::new();

        let engine = DiscoveryEngine::new(&network, &factory);
        let report = engine.discover_and_add(&contexts(), &registry);

        assert_eq!(report.found, 2);
        assert_eq!(report.connected, 2);
        assert!(registry.contains_key(DeviceId::new(0x1A2B)));
        assert!(registry.contains_key(DeviceId::new(0xFF)));
        assert_eq!(network.running_task_count(), 2);
    }

    #[test]
    fn test_second_pass_is_a_no_op() {
        let network = SimNetwork::with_timing(SimTiming::instant());
        network.connect_device("1A2B");
        let factory = SimTaskFactory::new(network.clone());
        let registry = DeviceRegistry::new();
        let contexts = contexts();
        let engine = DiscoveryEngine::new(&network, &factory);

        engine.discover_and_add(&contexts, &registry);
        let before = registry.get(DeviceId::new(0x1A2B)).unwrap();
        let report = engine.discover_and_add(&contexts, &registry);

        assert_eq!(report.already_tracked, 1);
        assert_eq!(report.connected, 0);
        assert!(Arc::ptr_eq(&before, &registry.get(DeviceId::new(0x1A2B)).unwrap()));
        assert_eq!(network.tasks_started(), 1);
    }

    #[test]
    fn test_reconnect_moves_devices_to_new_context() {
        let network = SimNetwork::with_timing(SimTiming::instant());
        network.connect_device("AA");
        let factory = SimTaskFactory::new(network.clone());
        let registry = DeviceRegistry::new();
        let mut contexts = contexts();
        let engine = DiscoveryEngine::new(&network, &factory);

        engine.discover_and_add(&contexts, &registry);
        let old = registry.get(DeviceId::new(0xAA)).unwrap();

        contexts.toggle();
        let report = engine.reconnect_all(&contexts, &registry);

        assert!(old.is_disposed());
        assert_eq!(report.connected, 1);
        let new = registry.get(DeviceId::new(0xAA)).unwrap();
        assert_eq!(new.context(), EnvironmentContext::Secondary);
        assert_eq!(network.running_task_count(), 1);
    }
}
