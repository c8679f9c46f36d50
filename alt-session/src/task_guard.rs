//! Safe lifecycle wrapper around a single tracking task

use std::time::{Duration, Instant};

use alt_tracking::{TrackingState, TrackingTask};

use crate::Result;

/// Owns at most one tracking task
///
/// The guard is either active (holds a task) or disposed (the slot is
/// empty). Disposal is terminal: once the task is released it is never
/// replaced, and further `dispose()` calls do nothing.
pub struct TaskGuard {
    task: Option<Box<dyn TrackingTask>>,
    created: Instant,
    /// Offset from `created` of the latest 6-DoF reading, zero until one is seen
    last_stable_reading: Duration,
}

impl TaskGuard {
    pub fn new(task: Box<dyn TrackingTask>) -> Self {
        Self {
            task: Some(task),
            created: Instant::now(),
            last_stable_reading: Duration::ZERO,
        }
    }

    /// Release the task if still held
    ///
    /// Dropping the task releases it on the network; nothing here can fail.
    pub fn dispose(&mut self) {
        if let Some(task) = self.task.take() {
            drop(task);
            tracing::debug!("Tracking task disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.task.is_none()
    }

    /// True once disposed, otherwise whatever the task reports
    pub fn is_finished(&self) -> bool {
        match &self.task {
            Some(task) => task.is_task_finished(),
            None => true,
        }
    }

    /// Retrieve the current state of the task
    ///
    /// Returns `Ok(None)` when the guard is disposed. Task errors are
    /// passed through unchanged; no filtering on tracking quality happens here.
    pub fn state(&mut self, angular_velocity_window_secs: f32) -> Result<Option<TrackingState>> {
        let Some(task) = self.task.as_mut() else {
            return Ok(None);
        };

        let state = task.state(angular_velocity_window_secs)?;
        if state.stage().is_locked() {
            self.last_stable_reading = self.created.elapsed();
        }
        Ok(Some(state))
    }

    /// Time since guard creation at which the last 6-DoF reading was retrieved
    pub fn last_stable_reading(&self) -> Duration {
        self.last_stable_reading
    }

    /// How long ago the last 6-DoF reading was retrieved, if there was one
    pub fn since_last_stable_reading(&self) -> Option<Duration> {
        if self.last_stable_reading.is_zero() {
            return None;
        }
        Some(self.created.elapsed().saturating_sub(self.last_stable_reading))
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for TaskGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGuard")
            .field("disposed", &self.is_disposed())
            .field("last_stable_reading", &self.last_stable_reading)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alt_tracking::{NodeHandle, Stage, TrackingError, Vector3};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeTask {
        stage: Stage,
        finished: Arc<AtomicBool>,
        drops: Arc<AtomicUsize>,
        fail: bool,
    }

    impl TrackingTask for FakeTask {
        fn is_task_finished(&self) -> bool {
            self.finished.load(Ordering::SeqCst)
        }

        fn state(&mut self, _window: f32) -> alt_tracking::Result<TrackingState> {
            if self.fail {
                return Err(TrackingError::TaskFinished(NodeHandle::new(1)));
            }
            Ok(TrackingState::at(self.stage, Vector3::new(1.0, 2.0, 3.0)))
        }
    }

    impl Drop for FakeTask {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fake_guard(stage: Stage, fail: bool) -> (TaskGuard, Arc<AtomicBool>, Arc<AtomicUsize>) {
        let finished = Arc::new(AtomicBool::new(false));
        let drops = Arc::new(AtomicUsize::new(0));
        let task = FakeTask {
            stage,
            finished: Arc::clone(&finished),
            drops: Arc::clone(&drops),
            fail,
        };
        (TaskGuard::new(Box::new(task)), finished, drops)
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let (mut guard, _, drops) = fake_guard(Stage::Tracking6Dof, false);
        assert!(!guard.is_disposed());

        for _ in 0..3 {
            guard.dispose();
            assert!(guard.is_disposed());
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        drop(guard);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_finished_delegates_until_disposed() {
        let (mut guard, finished, _) = fake_guard(Stage::Tracking6Dof, false);
        assert!(!guard.is_finished());

        finished.store(true, Ordering::SeqCst);
        assert!(guard.is_finished());

        finished.store(false, Ordering::SeqCst);
        guard.dispose();
        assert!(guard.is_finished());
    }

    #[test]
    fn test_disposed_guard_reports_no_state() {
        let (mut guard, _, _) = fake_guard(Stage::Tracking6Dof, false);
        guard.dispose();
        assert!(guard.state(0.03).unwrap().is_none());
    }

    #[test]
    fn test_task_errors_are_not_masked() {
        let (mut guard, _, _) = fake_guard(Stage::Tracking6Dof, true);
        assert!(guard.state(0.03).is_err());
        assert!(!guard.is_disposed());
    }

    #[test]
    fn test_stable_reading_only_recorded_on_lock() {
        let (mut guard, _, _) = fake_guard(Stage::Tracking3Dof, false);
        assert_eq!(guard.last_stable_reading(), Duration::ZERO);

        let state = guard.state(0.03).unwrap().unwrap();
        assert_eq!(state.stage(), Stage::Tracking3Dof);
        assert_eq!(guard.last_stable_reading(), Duration::ZERO);
        assert!(guard.since_last_stable_reading().is_none());

        let (mut locked, _, _) = fake_guard(Stage::Tracking6Dof, false);
        std::thread::sleep(Duration::from_millis(2));
        locked.state(0.03).unwrap();
        assert!(locked.last_stable_reading() > Duration::ZERO);
        assert!(locked.since_last_stable_reading().is_some());
    }
}
