//! Per-tick polling of every tracked device
//!
//! One pass walks a snapshot of the registry, retrieves each device's state
//! and writes the samples that pass the quality gates. Devices whose task
//! finished or failed are collected during the pass and removed after it.

use std::sync::Arc;

use alt_tracking::Stage;
use chrono::NaiveTime;

use crate::context::EnvironmentContext;
use crate::device::DeviceHandle;
use crate::error::Result;
use crate::registry::DeviceRegistry;
use crate::sink::{OutputSink, SampleRecord};

/// Counts from one polling pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Devices in the snapshot
    pub polled: usize,
    /// Samples written to the sink
    pub emitted: usize,
    /// Readings dropped because the device was not in 6-DoF tracking
    pub unlocked: usize,
    /// Readings dropped because the position was exactly zero
    pub zero_position: usize,
    /// Devices removed from the registry after the pass
    pub removed: usize,
}

enum Outcome {
    Emitted,
    Unlocked(Stage),
    ZeroPosition,
    NoState,
    Finished,
}

/// Polls device states and writes accepted samples
#[derive(Debug, Clone, Copy)]
pub struct DevicePoller {
    angular_velocity_window_secs: f32,
    verbose_device_limit: usize,
}

impl DevicePoller {
    pub fn new(angular_velocity_window_secs: f32, verbose_device_limit: usize) -> Self {
        Self {
            angular_velocity_window_secs,
            verbose_device_limit,
        }
    }

    /// Run one polling pass over every registered device
    ///
    /// Records carry `now` as their timestamp and the `context` label.
    /// Errors never escape: a device whose state or write fails is logged
    /// and removed, the others are still polled.
    pub fn poll_devices(
        &self,
        registry: &DeviceRegistry,
        context: EnvironmentContext,
        sink: &mut dyn OutputSink,
        now: NaiveTime,
    ) -> TickSummary {
        let snapshot = registry.values();
        let verbose = snapshot.len() <= self.verbose_device_limit;
        let mut summary = TickSummary {
            polled: snapshot.len(),
            ..TickSummary::default()
        };
        let mut evicted: Vec<Arc<DeviceHandle>> = Vec::new();

        for handle in &snapshot {
            match self.poll_device(handle, context, sink, now, verbose) {
                Ok(Outcome::Emitted) => summary.emitted += 1,
                Ok(Outcome::Unlocked(stage)) => {
                    summary.unlocked += 1;
                    if verbose {
                        tracing::info!("Device {}: {} (waiting for 6DoF)", handle.id(), stage);
                    }
                }
                Ok(Outcome::ZeroPosition) => summary.zero_position += 1,
                Ok(Outcome::NoState) => {}
                Ok(Outcome::Finished) => {
                    tracing::info!("Device {} task finished", handle.id());
                    evicted.push(Arc::clone(handle));
                }
                Err(e) => {
                    tracing::error!("Error processing device {}: {}", handle.id(), e);
                    evicted.push(Arc::clone(handle));
                }
            }
        }

        for handle in evicted {
            if registry.remove_handle(&handle) {
                summary.removed += 1;
                tracing::info!("Removed device {}", handle.id());
            }
            handle.dispose();
        }

        summary
    }

    fn poll_device(
        &self,
        handle: &DeviceHandle,
        context: EnvironmentContext,
        sink: &mut dyn OutputSink,
        now: NaiveTime,
        verbose: bool,
    ) -> Result<Outcome> {
        if handle.is_finished() {
            return Ok(Outcome::Finished);
        }

        let Some(state) = handle.state(self.angular_velocity_window_secs)? else {
            return Ok(Outcome::NoState);
        };

        let stage = state.stage();
        if !stage.is_locked() {
            return Ok(Outcome::Unlocked(stage));
        }

        // An exact zero position is what the tracker reports before a fix
        let position = state.position();
        if position.is_zero() {
            return Ok(Outcome::ZeroPosition);
        }

        sink.write_record(&SampleRecord {
            timestamp: now,
            device_id: handle.id(),
            context,
            position,
        })?;

        if verbose {
            tracing::info!(
                "Device {} {}: ({:.3}, {:.3}, {:.3})",
                handle.id(),
                context,
                position.x,
                position.y,
                position.z
            );
        }

        Ok(Outcome::Emitted)
    }
}
