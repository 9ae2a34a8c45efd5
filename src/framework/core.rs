//! # Core Lifecycle Framework
//!
//! This module defines the generic building blocks every component is made of.
//!
//! ## Key Types
//!
//! - [`Component`]: the capability trait a concrete component implements
//!   (name, hooks, optional management binding).
//! - [`LifecycleCore`]: the state machine a component embeds. It enforces the
//!   transition order, runs the hooks exactly once per transition and fires
//!   [`LifecycleEvent`]s.
//! - [`Lifecycle`]: the public `init/start/stop/destroy` operations,
//!   implemented for every [`Component`].
//!
//! ## Hook Ordering
//!
//! The core wraps each hook so the shared bookkeeping always runs around it:
//!
//! ```text
//! init:    INITIALIZING → register with registry → on_init → INITIALIZED
//! start:   STARTING → on_start → STARTED
//! stop:    STOPPING → on_stop → STOPPED
//! destroy: (stop if needed) → DESTROYING → on_destroy → unregister → DESTROYED
//! ```
//!
//! A failing `on_init`/`on_start`/`on_stop` moves the component to `FAILED`.
//! From there only `stop()` and `destroy()` are accepted. `on_destroy`
//! failures are logged and the component still ends `DESTROYED`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::framework::{
    HookError, HookTimeout, LifecycleError, LifecycleEvent, LifecycleListener, LifecycleState,
    Phase,
};
use crate::management::Managed;

// =============================================================================
// 1. THE ABSTRACTION (capability trait with hooks)
// =============================================================================

/// Trait that every unit taking part in the lifecycle protocol implements.
///
/// Only [`Component::lifecycle`] and [`Component::name`] are required. The
/// hooks default to doing nothing.
///
/// Hooks must not call lifecycle operations on their own component: the core
/// holds the component's transition lock while a hook runs.
#[async_trait]
pub trait Component: Send + Sync {
    /// The embedded state machine.
    fn lifecycle(&self) -> &LifecycleCore;

    /// Name used in logs, events and errors.
    fn name(&self) -> String;

    /// Management registration for this component, if it takes part in one.
    fn managed(&self) -> Option<&dyn Managed> {
        None
    }

    // --- Lifecycle Hooks (Async) ---

    async fn on_init(&self) -> Result<(), HookError> {
        Ok(())
    }

    async fn on_start(&self) -> Result<(), HookError> {
        Ok(())
    }

    async fn on_stop(&self) -> Result<(), HookError> {
        Ok(())
    }

    async fn on_destroy(&self) -> Result<(), HookError> {
        Ok(())
    }
}

// =============================================================================
// 2. THE STATE MACHINE
// =============================================================================

/// The state machine embedded by every component.
///
/// Transitions on one instance are serialized by an async mutex held for the
/// whole transition. State reads never wait on it.
pub struct LifecycleCore {
    state: RwLock<LifecycleState>,
    transition: tokio::sync::Mutex<()>,
    listeners: RwLock<Vec<Arc<dyn LifecycleListener>>>,
    hook_timeout: Option<Duration>,
}

impl LifecycleCore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LifecycleState::New),
            transition: tokio::sync::Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
            hook_timeout: None,
        }
    }

    /// Treat any hook running longer than `limit` as a hook failure.
    pub fn with_hook_timeout(mut self, limit: Duration) -> Self {
        self.hook_timeout = Some(limit);
        self
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    pub fn add_listener(&self, listener: Arc<dyn LifecycleListener>) {
        self.listeners.write().push(listener);
    }

    /// Returns `true` if the listener was registered.
    pub fn remove_listener(&self, listener: &Arc<dyn LifecycleListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    pub fn listeners(&self) -> Vec<Arc<dyn LifecycleListener>> {
        self.listeners.read().clone()
    }

    pub async fn init<C: Component + ?Sized>(&self, component: &C) -> Result<(), LifecycleError> {
        let _guard = self.transition.lock().await;
        let name = component.name();

        let current = self.state();
        if current != LifecycleState::New {
            return Err(LifecycleError::invalid(&name, Phase::Init, current));
        }

        self.set_state(&name, LifecycleState::Initializing);
        if let Some(managed) = component.managed() {
            managed.binding().register_component(managed);
        }

        match self.run_hook(component.on_init()).await {
            Ok(()) => {
                self.set_state(&name, LifecycleState::Initialized);
                Ok(())
            }
            Err(e) => {
                error!(component = %name, error = %e, "Init failed");
                self.set_state(&name, LifecycleState::Failed);
                Err(LifecycleError::hook(&name, Phase::Init, e))
            }
        }
    }

    pub async fn start<C: Component + ?Sized>(&self, component: &C) -> Result<(), LifecycleError> {
        let _guard = self.transition.lock().await;
        let name = component.name();

        match self.state() {
            LifecycleState::Starting | LifecycleState::Started => {
                debug!(component = %name, "Already started");
                return Ok(());
            }
            LifecycleState::Initialized | LifecycleState::Stopped => {}
            other => return Err(LifecycleError::invalid(&name, Phase::Start, other)),
        }

        self.set_state(&name, LifecycleState::Starting);
        match self.run_hook(component.on_start()).await {
            Ok(()) => {
                self.set_state(&name, LifecycleState::Started);
                info!(component = %name, "Started");
                Ok(())
            }
            Err(e) => {
                error!(component = %name, error = %e, "Start failed");
                self.set_state(&name, LifecycleState::Failed);
                Err(LifecycleError::hook(&name, Phase::Start, e))
            }
        }
    }

    pub async fn stop<C: Component + ?Sized>(&self, component: &C) -> Result<(), LifecycleError> {
        let _guard = self.transition.lock().await;
        let name = component.name();
        self.stop_locked(component, &name).await
    }

    pub async fn destroy<C: Component + ?Sized>(
        &self,
        component: &C,
    ) -> Result<(), LifecycleError> {
        let _guard = self.transition.lock().await;
        let name = component.name();

        match self.state() {
            LifecycleState::Destroyed => {
                debug!(component = %name, "Already destroyed");
                return Ok(());
            }
            LifecycleState::Starting | LifecycleState::Started | LifecycleState::Failed => {
                // Cleanup continues whatever the stop outcome.
                if let Err(e) = self.stop_locked(component, &name).await {
                    warn!(component = %name, error = %e, "Stop before destroy failed");
                }
            }
            _ => {}
        }

        self.set_state(&name, LifecycleState::Destroying);
        if let Err(e) = self.run_hook(component.on_destroy()).await {
            warn!(component = %name, error = %e, "Destroy hook failed");
        }
        if let Some(managed) = component.managed() {
            managed.binding().unregister_component();
        }
        self.set_state(&name, LifecycleState::Destroyed);
        info!(component = %name, "Destroyed");
        Ok(())
    }

    async fn stop_locked<C: Component + ?Sized>(
        &self,
        component: &C,
        name: &str,
    ) -> Result<(), LifecycleError> {
        match self.state() {
            LifecycleState::Stopped => {
                debug!(component = %name, "Already stopped");
                return Ok(());
            }
            LifecycleState::Starting | LifecycleState::Started | LifecycleState::Failed => {}
            other => return Err(LifecycleError::invalid(name, Phase::Stop, other)),
        }

        self.set_state(name, LifecycleState::Stopping);
        match self.run_hook(component.on_stop()).await {
            Ok(()) => {
                self.set_state(name, LifecycleState::Stopped);
                info!(component = %name, "Stopped");
                Ok(())
            }
            Err(e) => {
                error!(component = %name, error = %e, "Stop failed");
                self.set_state(name, LifecycleState::Failed);
                Err(LifecycleError::hook(name, Phase::Stop, e))
            }
        }
    }

    async fn run_hook<F>(&self, hook: F) -> Result<(), HookError>
    where
        F: Future<Output = Result<(), HookError>> + Send,
    {
        match self.hook_timeout {
            Some(limit) => match tokio::time::timeout(limit, hook).await {
                Ok(result) => result,
                Err(_) => Err(Box::new(HookTimeout(limit))),
            },
            None => hook.await,
        }
    }

    fn set_state(&self, component: &str, next: LifecycleState) {
        let previous = {
            let mut state = self.state.write();
            std::mem::replace(&mut *state, next)
        };
        debug_assert!(
            previous.can_transition_to(next),
            "illegal transition {previous} -> {next}"
        );
        debug!(component, from = %previous, to = %next, "State change");

        let event = LifecycleEvent {
            source: component.to_string(),
            previous,
            state: next,
        };
        for listener in self.listeners() {
            if let Err(e) = listener.lifecycle_event(&event) {
                warn!(component, state = %next, error = %e, "Lifecycle listener failed");
            }
        }
    }
}

impl Default for LifecycleCore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LifecycleCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleCore")
            .field("state", &self.state())
            .field("listeners", &self.listeners.read().len())
            .field("hook_timeout", &self.hook_timeout)
            .finish()
    }
}

// =============================================================================
// 3. THE PUBLIC OPERATIONS
// =============================================================================

/// Lifecycle operations available on every [`Component`].
#[async_trait]
pub trait Lifecycle {
    /// `NEW → INITIALIZED`. Any other starting state is an invalid transition.
    async fn init(&self) -> Result<(), LifecycleError>;

    /// `INITIALIZED | STOPPED → STARTED`. A no-op when already started.
    async fn start(&self) -> Result<(), LifecycleError>;

    /// `STARTING | STARTED | FAILED → STOPPED`. A no-op when already stopped.
    async fn stop(&self) -> Result<(), LifecycleError>;

    /// Any state → `DESTROYED`, stopping first when needed. Never fails once
    /// accepted; a no-op when already destroyed.
    async fn destroy(&self) -> Result<(), LifecycleError>;

    fn state(&self) -> LifecycleState;

    fn state_name(&self) -> &'static str {
        self.state().as_str()
    }

    fn add_lifecycle_listener(&self, listener: Arc<dyn LifecycleListener>);

    fn remove_lifecycle_listener(&self, listener: &Arc<dyn LifecycleListener>) -> bool;
}

#[async_trait]
impl<T: Component + ?Sized> Lifecycle for T {
    async fn init(&self) -> Result<(), LifecycleError> {
        self.lifecycle().init(self).await
    }

    async fn start(&self) -> Result<(), LifecycleError> {
        self.lifecycle().start(self).await
    }

    async fn stop(&self) -> Result<(), LifecycleError> {
        self.lifecycle().stop(self).await
    }

    async fn destroy(&self) -> Result<(), LifecycleError> {
        self.lifecycle().destroy(self).await
    }

    fn state(&self) -> LifecycleState {
        self.lifecycle().state()
    }

    fn add_lifecycle_listener(&self, listener: Arc<dyn LifecycleListener>) {
        self.lifecycle().add_listener(listener);
    }

    fn remove_lifecycle_listener(&self, listener: &Arc<dyn LifecycleListener>) -> bool {
        self.lifecycle().remove_listener(listener)
    }
}

// =============================================================================
// 4. EXAMPLE USAGE (Test)
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::ErrorKind;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        core: LifecycleCore,
        starts: AtomicUsize,
        stops: AtomicUsize,
        destroys: AtomicUsize,
        fail_start: AtomicBool,
        fail_destroy: AtomicBool,
    }

    #[async_trait]
    impl Component for Counter {
        fn lifecycle(&self) -> &LifecycleCore {
            &self.core
        }

        fn name(&self) -> String {
            "counter".into()
        }

        async fn on_start(&self) -> Result<(), HookError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if self.fail_start.load(Ordering::SeqCst) {
                return Err("port in use".into());
            }
            Ok(())
        }

        async fn on_stop(&self) -> Result<(), HookError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_destroy(&self) -> Result<(), HookError> {
            self.destroys.fetch_add(1, Ordering::SeqCst);
            if self.fail_destroy.load(Ordering::SeqCst) {
                return Err("leaked handle".into());
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn full_cycle_with_restart() {
        let c = Counter::default();
        c.init().await.unwrap();
        c.start().await.unwrap();
        c.stop().await.unwrap();
        c.start().await.unwrap();
        assert_eq!(c.state(), LifecycleState::Started);
        assert_eq!(c.starts.load(Ordering::SeqCst), 2);

        c.destroy().await.unwrap();
        assert_eq!(c.state(), LifecycleState::Destroyed);
        assert_eq!(c.stops.load(Ordering::SeqCst), 2);
        assert_eq!(c.destroys.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn start_from_new_is_invalid() {
        let c = Counter::default();
        let err = c.start().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(c.state(), LifecycleState::New);
        assert_eq!(c.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_component_rejects_start() {
        let c = Counter::default();
        c.fail_start.store(true, Ordering::SeqCst);
        c.init().await.unwrap();
        assert!(c.start().await.is_err());
        assert_eq!(c.state(), LifecycleState::Failed);

        let err = c.start().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[tokio::test]
    async fn destroy_hook_failure_still_destroys() {
        let c = Counter::default();
        c.fail_destroy.store(true, Ordering::SeqCst);
        c.init().await.unwrap();
        c.destroy().await.unwrap();
        assert_eq!(c.state(), LifecycleState::Destroyed);
        // Never started, so never stopped.
        assert_eq!(c.stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn destroyed_component_cannot_restart() {
        let c = Counter::default();
        c.init().await.unwrap();
        c.destroy().await.unwrap();
        let err = c.start().await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition { state: LifecycleState::Destroyed, .. }
        ));
    }

    struct Slow {
        core: LifecycleCore,
    }

    #[async_trait]
    impl Component for Slow {
        fn lifecycle(&self) -> &LifecycleCore {
            &self.core
        }

        fn name(&self) -> String {
            "slow".into()
        }

        async fn on_start(&self) -> Result<(), HookError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn hook_timeout_is_a_hook_failure() {
        let slow = Slow {
            core: LifecycleCore::new().with_hook_timeout(Duration::from_millis(20)),
        };
        slow.init().await.unwrap();
        let err = slow.start().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HookFailure);
        assert_eq!(slow.state(), LifecycleState::Failed);
    }

    #[tokio::test]
    async fn listener_errors_do_not_abort_transition() {
        let c = Counter::default();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        c.add_lifecycle_listener(Arc::new(move |_: &LifecycleEvent| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
            Err::<(), crate::framework::ListenerError>("listener broke".into())
        }));

        c.init().await.unwrap();
        assert_eq!(c.state(), LifecycleState::Initialized);
        // INITIALIZING and INITIALIZED
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
