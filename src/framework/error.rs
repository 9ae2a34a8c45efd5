//! # Lifecycle Errors
//!
//! Every transition reports failure through [`LifecycleError`]. Callers that
//! only care about the broad category use [`LifecycleError::kind`].

use crate::framework::LifecycleState;

/// Error returned by a component hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// The lifecycle operation being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Init,
    Start,
    Stop,
    Destroy,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Start => "start",
            Phase::Stop => "stop",
            Phase::Destroy => "destroy",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broad classification of a [`LifecycleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The call is not legal in the component's current state. A usage error;
    /// retrying will not help.
    InvalidTransition,
    /// Component logic failed inside a hook.
    HookFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("cannot {phase} `{component}` while it is {state}")]
    InvalidTransition {
        component: String,
        phase: Phase,
        state: LifecycleState,
    },

    #[error("{phase} hook of `{component}` failed: {source}")]
    HookFailure {
        component: String,
        phase: Phase,
        #[source]
        source: HookError,
    },

    /// Several children failed during one propagation pass.
    #[error("{} child component(s) failed to {phase}", .failures.len())]
    Aggregate {
        phase: Phase,
        failures: Vec<LifecycleError>,
    },
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            LifecycleError::HookFailure { .. } | LifecycleError::Aggregate { .. } => {
                ErrorKind::HookFailure
            }
        }
    }

    pub(crate) fn invalid(component: &str, phase: Phase, state: LifecycleState) -> Self {
        LifecycleError::InvalidTransition {
            component: component.to_string(),
            phase,
            state,
        }
    }

    pub(crate) fn hook(component: &str, phase: Phase, source: HookError) -> Self {
        LifecycleError::HookFailure {
            component: component.to_string(),
            phase,
            source,
        }
    }
}

/// Raised when a hook outlives the core's configured timeout.
#[derive(Debug, thiserror::Error)]
#[error("hook did not complete within {0:?}")]
pub struct HookTimeout(pub std::time::Duration);
