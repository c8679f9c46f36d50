//! Command line arguments and configuration loading

use std::path::PathBuf;
use std::time::Duration;

use alt_session::{EnvironmentContext, SessionConfig};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Serials of the simulated devices plugged in when none are given
pub const DEFAULT_SIM_DEVICES: [&str; 2] = ["1A2B", "FF"];

/// Collects 6-DoF tracking samples from every device on the network
///
/// Samples are appended to the output file while the collector runs.
/// Press Q to quit, S for status and T to switch the environment.
#[derive(Parser, Debug)]
#[command(name = "alt-collector")]
#[command(about = "Collect 6-DoF position samples from tracking devices")]
#[command(version)]
pub struct Args {
    /// JSON configuration file (default: <config dir>/alt-collector/config.json if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// File samples are appended to
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Polling period in milliseconds
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Environment context active at startup
    #[arg(long, value_enum)]
    pub context: Option<ContextArg>,

    /// Environment code of the primary context
    #[arg(long)]
    pub primary_env: Option<String>,

    /// Environment code of the secondary context
    #[arg(long)]
    pub secondary_env: Option<String>,

    /// Wait before the first discovery, in milliseconds
    #[arg(long)]
    pub settle_ms: Option<u64>,

    /// Print per-device diagnostics only while at most this many devices are tracked
    #[arg(long)]
    pub verbose_devices: Option<usize>,

    /// Serial number of a simulated device (repeatable)
    #[arg(long = "device", value_name = "SERIAL")]
    pub devices: Vec<String>,

    /// Do not read commands from the keyboard
    #[arg(long)]
    pub no_keyboard: bool,

    /// Log filter used when ALT_LOG_LEVEL and RUST_LOG are unset
    ///
    /// A bare level (info, debug) or directives like `alt_session=debug,warn`.
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ContextArg {
    Primary,
    Secondary,
}

impl From<ContextArg> for EnvironmentContext {
    fn from(arg: ContextArg) -> Self {
        match arg {
            ContextArg::Primary => EnvironmentContext::Primary,
            ContextArg::Secondary => EnvironmentContext::Secondary,
        }
    }
}

impl Args {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if self.tick_ms == Some(0) {
            return Err(anyhow::anyhow!("Tick interval must be positive"));
        }

        if let Some(filter) = &self.log_level {
            EnvFilter::try_new(filter)
                .with_context(|| format!("Invalid log filter '{}'", filter))?;
        }

        Ok(())
    }

    /// Serials of the simulated devices to plug in
    pub fn sim_devices(&self) -> Vec<String> {
        if self.devices.is_empty() {
            DEFAULT_SIM_DEVICES.iter().map(|s| s.to_string()).collect()
        } else {
            self.devices.clone()
        }
    }

    /// Overlay the flags that were given on top of `config`
    pub fn apply(&self, mut config: SessionConfig) -> SessionConfig {
        if let Some(output) = &self.output {
            config.output_path = output.clone();
        }
        if let Some(ms) = self.tick_ms {
            config.tick_interval = Duration::from_millis(ms);
        }
        if let Some(context) = self.context {
            config.initial_context = context.into();
        }
        if let Some(code) = &self.primary_env {
            config.primary_environment = code.clone();
        }
        if let Some(code) = &self.secondary_env {
            config.secondary_environment = code.clone();
        }
        if let Some(ms) = self.settle_ms {
            config.settle_delay = Duration::from_millis(ms);
        }
        if let Some(limit) = self.verbose_devices {
            config.verbose_device_limit = limit;
        }
        config
    }

    /// Load the configuration file, apply the flags and validate the result
    pub fn load_config(&self) -> Result<SessionConfig> {
        let base = match self.config_path() {
            Some(path) => SessionConfig::load(&path)
                .with_context(|| format!("Failed to load configuration file {}", path.display()))?,
            None => SessionConfig::default(),
        };

        let config = self.apply(base);
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Explicit `--config`, else the default file if it exists
    fn config_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config {
            return Some(path.clone());
        }
        default_config_path().filter(|path| path.is_file())
    }
}

/// `<config dir>/alt-collector/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("alt-collector").join("config.json"))
}
