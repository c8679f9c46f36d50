//! Interactive operator commands

use std::fmt;
use std::sync::mpsc;
use std::time::Duration;

use crate::context::EnvironmentContext;
use crate::device::DeviceId;

/// Help line listing the single-key commands
pub const COMMAND_HELP: &str = "Commands: [Q]uit, [S]tatus, [T]oggle environment";

/// A command issued by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Stop the polling loop
    Quit,
    /// Print a read-only status report
    Status,
    /// Switch to the other context and reconnect every device
    ToggleContext,
}

impl Command {
    /// Map a key press to a command (case-insensitive)
    pub fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_lowercase() {
            'q' => Some(Command::Quit),
            's' => Some(Command::Status),
            't' => Some(Command::ToggleContext),
            _ => None,
        }
    }
}

/// Non-blocking source of commands polled once per tick
pub trait CommandSource {
    /// Next pending command, if any. Must not block.
    fn poll(&mut self) -> Option<Command>;
}

/// Commands delivered over a channel
///
/// The sending half typically lives on a keyboard reader thread.
#[derive(Debug)]
pub struct ChannelCommands {
    rx: mpsc::Receiver<Command>,
}

impl ChannelCommands {
    pub fn new(rx: mpsc::Receiver<Command>) -> Self {
        Self { rx }
    }

    /// Create a connected sender / source pair
    pub fn channel() -> (mpsc::Sender<Command>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self::new(rx))
    }
}

impl CommandSource for ChannelCommands {
    fn poll(&mut self) -> Option<Command> {
        self.rx.try_recv().ok()
    }
}

/// A source that never yields a command
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCommands;

impl CommandSource for NoCommands {
    fn poll(&mut self) -> Option<Command> {
        None
    }
}

/// One tracked device in a status report
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatus {
    pub id: DeviceId,
    pub context: EnvironmentContext,
    pub since_last_stable: Option<Duration>,
}

/// Read-only snapshot of a session
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub device_count: usize,
    pub active_context: EnvironmentContext,
    pub running: bool,
    pub output: String,
    pub devices: Vec<DeviceStatus>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Status ===")?;
        writeln!(f, "Connected devices: {}", self.device_count)?;
        writeln!(f, "Current environment: {}", self.active_context)?;
        writeln!(f, "Running: {}", self.running)?;
        writeln!(f, "Data file: {}", self.output)?;
        write!(f, "{}", COMMAND_HELP)?;
        for device in &self.devices {
            write!(f, "\n  Device {} ({})", device.id, device.context)?;
            match device.since_last_stable {
                Some(age) => write!(f, " last 6DoF {:.1}s ago", age.as_secs_f32())?,
                None => write!(f, " no 6DoF yet")?,
            }
        }
        Ok(())
    }
}
