//! Environment contexts: the tracking-space configurations a session can run in

use std::fmt;
use std::sync::Arc;

use alt_tracking::{Environment, EnvironmentLibrary};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// One of the mutually exclusive tracking-space configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentContext {
    #[default]
    Primary,
    Secondary,
}

impl EnvironmentContext {
    pub const ALL: [EnvironmentContext; 2] = [EnvironmentContext::Primary, EnvironmentContext::Secondary];

    /// Label written to output records and status lines
    pub fn label(&self) -> &'static str {
        match self {
            EnvironmentContext::Primary => "PRIMARY",
            EnvironmentContext::Secondary => "SECONDARY",
        }
    }

    /// The context that follows this one
    pub fn toggle(self) -> Self {
        match self {
            EnvironmentContext::Primary => EnvironmentContext::Secondary,
            EnvironmentContext::Secondary => EnvironmentContext::Primary,
        }
    }
}

impl fmt::Display for EnvironmentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The environments of every context plus which one is active
#[derive(Debug, Clone)]
pub struct ContextSet {
    primary: Arc<dyn Environment>,
    secondary: Arc<dyn Environment>,
    active: EnvironmentContext,
}

impl ContextSet {
    pub fn new(
        primary: Arc<dyn Environment>,
        secondary: Arc<dyn Environment>,
        active: EnvironmentContext,
    ) -> Self {
        Self {
            primary,
            secondary,
            active,
        }
    }

    /// Create both environments from their codes
    ///
    /// A failure here is a setup error: the session cannot run without
    /// every context it may be switched into.
    pub fn load(
        library: &dyn EnvironmentLibrary,
        primary_code: &str,
        secondary_code: &str,
        active: EnvironmentContext,
    ) -> Result<Self> {
        let create = |context: EnvironmentContext, code: &str| {
            library
                .create_environment(code)
                .map_err(|source| SessionError::Environment { context, source })
        };

        let primary = create(EnvironmentContext::Primary, primary_code)?;
        let secondary = create(EnvironmentContext::Secondary, secondary_code)?;
        tracing::info!("Loaded {} and {} environments", EnvironmentContext::Primary, EnvironmentContext::Secondary);

        Ok(Self::new(primary, secondary, active))
    }

    pub fn active(&self) -> EnvironmentContext {
        self.active
    }

    /// Environment of the active context
    pub fn active_environment(&self) -> &dyn Environment {
        self.environment(self.active)
    }

    pub fn environment(&self, context: EnvironmentContext) -> &dyn Environment {
        match context {
            EnvironmentContext::Primary => self.primary.as_ref(),
            EnvironmentContext::Secondary => self.secondary.as_ref(),
        }
    }

    /// Switch to the next context and return it
    ///
    /// Only flips the flag; callers must reconnect every device afterwards.
    pub fn toggle(&mut self) -> EnvironmentContext {
        self.active = self.active.toggle();
        self.active
    }
}
