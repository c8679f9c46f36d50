//! The collection session: owns every resource and drives the polling loop
//!
//! A [`Session`] ticks at a fixed cadence. Each tick handles pending
//! operator commands, rediscovers devices when the network changed and
//! polls every tracked device. Teardown runs exactly once, either from
//! [`Session::shutdown`] or from `Drop`.

use std::time::{Duration, Instant};

use alt_tracking::{Network, TaskFactory, UpdateId};
use chrono::Local;

use crate::command::{Command, CommandSource, DeviceStatus, StatusReport};
use crate::config::SessionConfig;
use crate::context::{ContextSet, EnvironmentContext};
use crate::discovery::{DiscoveryEngine, DiscoveryReport};
use crate::error::Result;
use crate::polling::{DevicePoller, TickSummary};
use crate::registry::DeviceRegistry;
use crate::shutdown::ShutdownToken;
use crate::sink::{OutputSink, SessionMarker};

/// Receives status reports requested by the operator
pub type StatusHandler = Box<dyn FnMut(&StatusReport) + Send>;

/// Device session over one tracking network
///
/// # Example
///
/// ```rust,no_run
/// use alt_session::prelude::*;
/// use alt_tracking::sim::{SimEnvironmentLibrary, SimNetwork, SimTaskFactory};
///
/// # fn main() -> alt_session::Result<()> {
/// let network = SimNetwork::new();
/// network.connect_device("1A2B");
/// let config = SessionConfig::default();
/// let contexts = ContextSet::load(
///     &SimEnvironmentLibrary,
///     &config.primary_environment,
///     &config.secondary_environment,
///     config.initial_context,
/// )?;
///
/// let mut session = Session::new(
///     Box::new(network.clone()),
///     Box::new(SimTaskFactory::new(network)),
///     contexts,
///     Box::new(FileSink::open(&config.output_path)?),
///     config,
/// )?;
/// let (keys, mut commands) = ChannelCommands::channel();
/// keys.send(Command::Quit).ok();
/// session.run(&mut commands)?;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    network: Box<dyn Network>,
    factory: Box<dyn TaskFactory>,
    contexts: ContextSet,
    registry: DeviceRegistry,
    sink: Box<dyn OutputSink>,
    shutdown: ShutdownToken,
    config: SessionConfig,
    poller: DevicePoller,
    status_handler: StatusHandler,
    last_update_id: UpdateId,
    closed: bool,
}

impl Session {
    /// Create a session and write the session-start marker
    ///
    /// Fails when the configuration is invalid or the marker cannot be
    /// written.
    pub fn new(
        network: Box<dyn Network>,
        factory: Box<dyn TaskFactory>,
        contexts: ContextSet,
        mut sink: Box<dyn OutputSink>,
        config: SessionConfig,
    ) -> Result<Self> {
        config.validate()?;
        sink.write_marker(SessionMarker::Started(Local::now().naive_local()))?;
        sink.flush()?;

        tracing::info!(
            "Session created: writing to {}, active environment {}",
            sink.describe(),
            contexts.active()
        );

        Ok(Self {
            network,
            factory,
            contexts,
            registry: DeviceRegistry::new(),
            sink,
            shutdown: ShutdownToken::new(),
            poller: DevicePoller::new(config.angular_velocity_window_secs, config.verbose_device_limit),
            config,
            status_handler: Box::new(|report| println!("{}", report)),
            last_update_id: 0,
            closed: false,
        })
    }

    /// Use an externally created shutdown token
    pub fn with_shutdown_token(mut self, token: ShutdownToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Replace the default status handler, which prints to stdout
    pub fn with_status_handler(mut self, handler: impl FnMut(&StatusReport) + Send + 'static) -> Self {
        self.status_handler = Box::new(handler);
        self
    }

    /// A clone of the token that stops this session
    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn active_context(&self) -> EnvironmentContext {
        self.contexts.active()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        !self.closed && self.shutdown.is_running()
    }

    /// Drive ticks until the shutdown token is cancelled, then tear down
    ///
    /// Waits for the configured settle delay before the first tick.
    pub fn run(&mut self, commands: &mut dyn CommandSource) -> Result<()> {
        self.settle();

        let interval = self.config.tick_interval;
        let mut deadline = Instant::now() + interval;

        while self.is_running() {
            let summary = self.tick(commands);
            if summary.removed > 0 || summary.emitted > 0 {
                tracing::trace!(?summary, "Tick complete");
            }

            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
                deadline += interval;
            } else {
                // Overran: restart the schedule instead of catching up
                deadline = now + interval;
            }
        }

        self.shutdown()
    }

    /// Run one iteration of the loop: commands, discovery, polling
    ///
    /// Does nothing once the session has been shut down.
    pub fn tick(&mut self, commands: &mut dyn CommandSource) -> TickSummary {
        if self.closed {
            return TickSummary::default();
        }

        while let Some(command) = commands.poll() {
            self.handle_command(command);
            if self.shutdown.is_cancelled() {
                break;
            }
        }

        if self.closed {
            return TickSummary::default();
        }

        self.refresh_devices();

        self.poller.poll_devices(
            &self.registry,
            self.contexts.active(),
            self.sink.as_mut(),
            Local::now().time(),
        )
    }

    /// Dispatch one operator command
    ///
    /// After shutdown only `Status` has an effect.
    pub fn handle_command(&mut self, command: Command) {
        if self.closed && command != Command::Status {
            tracing::debug!("Ignoring {:?} after shutdown", command);
            return;
        }

        match command {
            Command::Quit => {
                if self.shutdown.cancel() {
                    tracing::info!("Quit requested");
                }
            }
            Command::Status => {
                let report = self.status();
                (self.status_handler)(&report);
            }
            Command::ToggleContext => {
                self.toggle_context();
            }
        }
    }

    /// Switch to the other context and restart every device under it
    pub fn toggle_context(&mut self) -> DiscoveryReport {
        // Read before listing nodes, so a change during the pass is still seen next tick
        let update_id = self.network.update_id();

        let context = self.contexts.toggle();
        tracing::info!("Environment switched to {}", context);

        let report = DiscoveryEngine::new(self.network.as_ref(), self.factory.as_ref())
            .reconnect_all(&self.contexts, &self.registry);
        self.last_update_id = update_id;
        report
    }

    /// Rediscover devices if the network generation changed since the last check
    pub fn refresh_devices(&mut self) -> Option<DiscoveryReport> {
        let update_id = self.network.update_id();
        if update_id == self.last_update_id {
            return None;
        }

        tracing::debug!("Network update {} -> {}", self.last_update_id, update_id);
        self.last_update_id = update_id;
        Some(
            DiscoveryEngine::new(self.network.as_ref(), self.factory.as_ref())
                .discover_and_add(&self.contexts, &self.registry),
        )
    }

    /// Read-only snapshot of the session
    pub fn status(&self) -> StatusReport {
        let devices = self
            .registry
            .ids()
            .into_iter()
            .filter_map(|id| self.registry.get(id))
            .map(|handle| DeviceStatus {
                id: handle.id(),
                context: handle.context(),
                since_last_stable: handle.since_last_stable_reading(),
            })
            .collect::<Vec<_>>();

        StatusReport {
            device_count: devices.len(),
            active_context: self.contexts.active(),
            running: self.is_running(),
            output: self.sink.describe(),
            devices,
        }
    }

    /// Dispose every device, write the end marker and close the sink
    ///
    /// Only the first call does any work. The sink is closed even when
    /// writing the marker fails; the first error is returned.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.shutdown.cancel();

        let disposed = self.registry.dispose_all();
        tracing::info!("Shutting down, disposed {} devices", disposed);

        let marker = self
            .sink
            .write_marker(SessionMarker::Ended(Local::now().naive_local()))
            .and_then(|()| self.sink.flush());
        let closed = self.sink.close();

        marker?;
        closed?;
        Ok(())
    }

    fn settle(&self) {
        let delay = self.config.settle_delay;
        if delay.is_zero() {
            return;
        }

        tracing::debug!("Waiting {:?} for the network to settle", delay);
        let until = Instant::now() + delay;
        let step = self.config.tick_interval.min(Duration::from_millis(50));
        while self.shutdown.is_running() {
            let now = Instant::now();
            if now >= until {
                break;
            }
            std::thread::sleep(step.min(until - now));
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!("Error during session teardown: {}", e);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("devices", &self.registry.len())
            .field("active_context", &self.contexts.active())
            .field("last_update_id", &self.last_update_id)
            .field("closed", &self.closed)
            .finish()
    }
}
