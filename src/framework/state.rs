//! # Lifecycle States
//!
//! The fixed set of states every component moves through, and the event
//! fired to listeners on each move.
//!
//! ```text
//! NEW → INITIALIZING → INITIALIZED → STARTING → STARTED → STOPPING → STOPPED → DESTROYING → DESTROYED
//!                                       ↑                                │
//!                                       └──────────── (restart) ─────────┘
//! Any transition may end in FAILED.
//! ```

use std::fmt;

/// Where a component currently sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    New,
    Initializing,
    Initialized,
    Starting,
    Started,
    Stopping,
    Stopped,
    Destroying,
    Destroyed,
    Failed,
}

impl LifecycleState {
    /// `true` while the component may serve work (`STARTING` or `STARTED`).
    pub fn is_available(self) -> bool {
        matches!(self, LifecycleState::Starting | LifecycleState::Started)
    }

    /// `DESTROYED` and `FAILED` have no forward transitions of their own.
    ///
    /// `FAILED` still accepts `stop()`/`destroy()` for cleanup; those are the
    /// only calls the lifecycle core lets through.
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Destroyed | LifecycleState::Failed)
    }

    /// Whether `self → next` is an edge of the state graph.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;

        if next == Failed {
            return matches!(self, Initializing | Starting | Stopping);
        }
        matches!(
            (self, next),
            (New, Initializing)
                | (Initializing, Initialized)
                | (Initialized, Starting)
                | (Stopped, Starting)
                | (Starting, Started)
                | (Starting, Stopping)
                | (Started, Stopping)
                | (Failed, Stopping)
                | (Stopping, Stopped)
                | (New, Destroying)
                | (Initialized, Destroying)
                | (Stopped, Destroying)
                | (Failed, Destroying)
                | (Destroying, Destroyed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::New => "NEW",
            LifecycleState::Initializing => "INITIALIZING",
            LifecycleState::Initialized => "INITIALIZED",
            LifecycleState::Starting => "STARTING",
            LifecycleState::Started => "STARTED",
            LifecycleState::Stopping => "STOPPING",
            LifecycleState::Stopped => "STOPPED",
            LifecycleState::Destroying => "DESTROYING",
            LifecycleState::Destroyed => "DESTROYED",
            LifecycleState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change, delivered synchronously to every registered listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    /// Name of the component that changed state.
    pub source: String,
    pub previous: LifecycleState,
    pub state: LifecycleState,
}

/// Errors a listener may report. They are logged and otherwise ignored.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Observer of state changes.
///
/// Listeners run on the thread performing the transition, in registration
/// order. They must not call back into the lifecycle of the component that
/// notified them.
pub trait LifecycleListener: Send + Sync {
    fn lifecycle_event(&self, event: &LifecycleEvent) -> Result<(), ListenerError>;
}

impl<F> LifecycleListener for F
where
    F: Fn(&LifecycleEvent) -> Result<(), ListenerError> + Send + Sync,
{
    fn lifecycle_event(&self, event: &LifecycleEvent) -> Result<(), ListenerError> {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_path_is_allowed() {
        use LifecycleState::*;
        let path = [
            New,
            Initializing,
            Initialized,
            Starting,
            Started,
            Stopping,
            Stopped,
            Destroying,
            Destroyed,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn restart_allowed_but_not_after_destroy() {
        assert!(LifecycleState::Stopped.can_transition_to(LifecycleState::Starting));
        assert!(!LifecycleState::Destroyed.can_transition_to(LifecycleState::Starting));
        assert!(!LifecycleState::Destroyed.can_transition_to(LifecycleState::Failed));
    }

    #[test]
    fn failed_only_leads_to_cleanup() {
        let failed = LifecycleState::Failed;
        assert!(failed.can_transition_to(LifecycleState::Stopping));
        assert!(failed.can_transition_to(LifecycleState::Destroying));
        assert!(!failed.can_transition_to(LifecycleState::Starting));
        assert!(failed.is_terminal());
    }

    #[test]
    fn availability() {
        assert!(LifecycleState::Started.is_available());
        assert!(LifecycleState::Starting.is_available());
        assert!(!LifecycleState::Stopped.is_available());
        assert_eq!(LifecycleState::Started.to_string(), "STARTED");
    }
}
