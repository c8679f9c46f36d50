//! Concurrent registry of tracked devices
//!
//! Maps [`DeviceId`] to a shared [`DeviceHandle`]. Every operation is
//! individually atomic, so the registry can be read from any thread while
//! the polling thread mutates it.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::device::{DeviceHandle, DeviceId};

/// Thread-safe device registry
///
/// Insertion never overwrites: replacing a handle is an explicit
/// `try_remove` followed by `try_add`.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: DashMap<DeviceId, Arc<DeviceHandle>>,
}

impl DeviceRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            devices: DashMap::new(),
        }
    }

    /// Insert `handle` under `id` if no handle is registered there yet
    ///
    /// Returns false, leaving the existing entry untouched, when `id` is taken.
    pub fn try_add(&self, id: DeviceId, handle: Arc<DeviceHandle>) -> bool {
        match self.devices.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(handle);
                true
            }
        }
    }

    /// True when a handle is registered under `id`
    pub fn contains_key(&self, id: DeviceId) -> bool {
        self.devices.contains_key(&id)
    }

    /// Shared handle registered under `id`, if any
    pub fn get(&self, id: DeviceId) -> Option<Arc<DeviceHandle>> {
        self.devices.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove and return the handle registered under `id`
    ///
    /// The handle is not disposed.
    pub fn try_remove(&self, id: DeviceId) -> Option<Arc<DeviceHandle>> {
        self.devices.remove(&id).map(|(_, handle)| handle)
    }

    /// Remove `handle` if it is still the one registered under its id
    ///
    /// Returns false when the entry is gone or was replaced by another handle.
    pub fn remove_handle(&self, handle: &Arc<DeviceHandle>) -> bool {
        // Identity, not id: a replacement registered meanwhile must survive
        self.devices
            .remove_if(&handle.id(), |_, registered| Arc::ptr_eq(registered, handle))
            .is_some()
    }

    /// Remove every entry without disposing them
    pub fn clear(&self) {
        self.devices.clear();
    }

    /// Snapshot of every registered handle
    ///
    /// Safe to iterate while the registry is mutated; removed handles stay
    /// alive in the snapshot.
    pub fn values(&self) -> Vec<Arc<DeviceHandle>> {
        self.devices
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Registered ids in ascending order
    pub fn ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.devices.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// True when no device is registered
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Remove every entry and dispose its task
    ///
    /// Returns the number of handles disposed.
    pub fn dispose_all(&self) -> usize {
        let mut disposed = 0;
        for id in self.ids() {
            if let Some(handle) = self.try_remove(id) {
                handle.dispose();
                disposed += 1;
            }
        }
        // Anything inserted concurrently after the id snapshot
        for handle in self.values() {
            handle.dispose();
        }
        self.clear();
        disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EnvironmentContext;
    use crate::device::SubscriptionType;
    use alt_tracking::{NodeHandle, TrackingState, TrackingTask};

    struct IdleTask;

    impl TrackingTask for IdleTask {
        fn is_task_finished(&self) -> bool {
            false
        }

        fn state(&mut self, _window: f32) -> alt_tracking::Result<TrackingState> {
            Ok(TrackingState::default())
        }
    }

    fn handle(id: u64, context: EnvironmentContext) -> Arc<DeviceHandle> {
        Arc::new(DeviceHandle::new(
            DeviceId::new(id),
            SubscriptionType::None,
            Box::new(IdleTask),
            NodeHandle::new(id as u32),
            context,
        ))
    }

    #[test]
    fn test_try_add_does_not_overwrite() {
        let registry = DeviceRegistry::new();
        let id = DeviceId::new(0xAA);

        assert!(registry.try_add(id, handle(0xAA, EnvironmentContext::Primary)));
        assert!(!registry.try_add(id, handle(0xAA, EnvironmentContext::Secondary)));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(id).unwrap().context(), EnvironmentContext::Primary);
    }

    #[test]
    fn test_try_remove_returns_handle_once() {
        let registry = DeviceRegistry::new();
        let id = DeviceId::new(1);
        registry.try_add(id, handle(1, EnvironmentContext::Primary));

        let removed = registry.try_remove(id).unwrap();
        assert!(!removed.is_disposed());
        assert!(registry.try_remove(id).is_none());
        assert!(!registry.contains_key(id));
    }

    #[test]
    fn test_remove_handle_ignores_replacement() {
        let registry = DeviceRegistry::new();
        let id = DeviceId::new(7);
        let old = handle(7, EnvironmentContext::Primary);
        registry.try_add(id, Arc::clone(&old));
        registry.try_remove(id);

        let new = handle(7, EnvironmentContext::Secondary);
        registry.try_add(id, Arc::clone(&new));

        assert!(!registry.remove_handle(&old));
        assert!(registry.contains_key(id));
        assert!(registry.remove_handle(&new));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clear_does_not_dispose() {
        let registry = DeviceRegistry::new();
        let kept = handle(1, EnvironmentContext::Primary);
        registry.try_add(DeviceId::new(1), Arc::clone(&kept));

        registry.clear();
        assert!(registry.is_empty());
        assert!(!kept.is_disposed());
    }

    #[test]
    fn test_snapshot_survives_removal() {
        let registry = DeviceRegistry::new();
        for id in 1..=3 {
            registry.try_add(DeviceId::new(id), handle(id, EnvironmentContext::Primary));
        }

        let snapshot = registry.values();
        for entry in &snapshot {
            registry.try_remove(entry.id());
        }
        assert_eq!(snapshot.len(), 3);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_dispose_all_disposes_and_empties() {
        let registry = DeviceRegistry::new();
        let handles: Vec<_> = (1..=4).map(|id| handle(id, EnvironmentContext::Primary)).collect();
        for h in &handles {
            registry.try_add(h.id(), Arc::clone(h));
        }

        assert_eq!(registry.dispose_all(), 4);
        assert!(registry.is_empty());
        assert!(handles.iter().all(|h| h.is_disposed()));
    }

    #[test]
    fn test_ids_are_sorted() {
        let registry = DeviceRegistry::new();
        for id in [0x30, 0x10, 0x20] {
            registry.try_add(DeviceId::new(id), handle(id, EnvironmentContext::Primary));
        }
        assert_eq!(
            registry.ids(),
            vec![DeviceId::new(0x10), DeviceId::new(0x20), DeviceId::new(0x30)]
        );
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let registry = Arc::new(DeviceRegistry::new());
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        for handle in registry.values() {
                            let _ = handle.id();
                        }
                    }
                })
            })
            .collect();

        for id in 0..200 {
            registry.try_add(DeviceId::new(id), handle(id, EnvironmentContext::Primary));
            if id % 2 == 0 {
                registry.try_remove(DeviceId::new(id));
            }
        }
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(registry.len(), 100);
    }
}
