//! Ordered, uniquely named child sets and lifecycle propagation.
//!
//! `init`/`start` reach children in insertion order; `stop`/`destroy` in
//! reverse, so dependents go down before what they depend on. One child's
//! failure never stops its siblings from being attempted; failures are
//! collected and returned together.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::container::ContainerError;
use crate::framework::{Component, Lifecycle, LifecycleError, LifecycleState, Phase};

/// Children of a container, keyed by name.
///
/// Lookups take a short read lock and never wait on a propagation pass in
/// progress: propagation works on a snapshot.
pub struct Children<C: ?Sized> {
    kind: &'static str,
    items: RwLock<IndexMap<String, Arc<C>>>,
}

impl<C: Component + ?Sized> Children<C> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            items: RwLock::new(IndexMap::new()),
        }
    }

    pub fn insert(&self, child: Arc<C>) -> Result<(), ContainerError> {
        let name = child.name();
        let mut items = self.items.write();
        if items.contains_key(&name) {
            return Err(ContainerError::DuplicateName(name));
        }
        debug!(kind = self.kind, child = %name, "Added");
        items.insert(name, child);
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<Arc<C>> {
        self.items.read().get(name).cloned()
    }

    /// Current children in insertion order.
    pub fn snapshot(&self) -> Vec<Arc<C>> {
        self.items.read().values().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.items.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Removes the entry under `name` only if it is this exact child.
    pub fn remove(&self, child: &Arc<C>) -> Option<Arc<C>> {
        let name = child.name();
        let mut items = self.items.write();
        let same = items
            .get(&name)
            .is_some_and(|existing| Arc::ptr_eq(existing, child));
        if same {
            items.shift_remove(&name)
        } else {
            None
        }
    }

    pub fn remove_named(&self, name: &str) -> Option<Arc<C>> {
        self.items.write().shift_remove(name)
    }

    /// Runs `phase` on every child in propagation order.
    pub async fn propagate(&self, phase: Phase) -> Result<(), LifecycleError> {
        let mut children = self.snapshot();
        if matches!(phase, Phase::Stop | Phase::Destroy) {
            children.reverse();
        }

        let mut failures = Vec::new();
        for child in children {
            if phase == Phase::Stop && !stoppable(child.state()) {
                debug!(kind = self.kind, child = %child.name(), state = %child.state(), "Not running; skipping stop");
                continue;
            }
            if let Err(e) = apply(child.as_ref(), phase).await {
                warn!(kind = self.kind, child = %child.name(), %phase, error = %e, "Child failed");
                failures.push(e);
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::Aggregate { phase, failures })
        }
    }
}

/// Whether `stop()` is accepted and not a no-op.
pub(crate) fn stoppable(state: LifecycleState) -> bool {
    state.is_available() || state == LifecycleState::Failed
}

async fn apply<C: Component + ?Sized>(child: &C, phase: Phase) -> Result<(), LifecycleError> {
    match phase {
        Phase::Init => child.init().await,
        Phase::Start => child.start().await,
        Phase::Stop => child.stop().await,
        Phase::Destroy => child.destroy().await,
    }
}

/// Brings a newly added child up to where its container already is.
/// A child that was initialized by its caller is not initialized again.
pub async fn catch_up<C: Component + ?Sized>(
    child: &C,
    container: LifecycleState,
) -> Result<(), LifecycleError> {
    match container {
        LifecycleState::Initializing | LifecycleState::Initialized | LifecycleState::Stopped => {
            init_if_new(child).await
        }
        LifecycleState::Starting | LifecycleState::Started => {
            init_if_new(child).await?;
            child.start().await
        }
        _ => Ok(()),
    }
}

async fn init_if_new<C: Component + ?Sized>(child: &C) -> Result<(), LifecycleError> {
    if child.state() == LifecycleState::New {
        child.init().await
    } else {
        Ok(())
    }
}

/// Stops a child being detached from its container, if it is running.
/// The child is not destroyed.
pub async fn stop_detached<C: Component + ?Sized>(child: &C) {
    if !stoppable(child.state()) {
        return;
    }
    if let Err(e) = child.stop().await {
        warn!(child = %child.name(), error = %e, "Stopping removed child failed");
    }
}

/// Collects one propagation result into `failures`, flattening aggregates.
pub(crate) fn collect(failures: &mut Vec<LifecycleError>, result: Result<(), LifecycleError>) {
    match result {
        Ok(()) => {}
        Err(LifecycleError::Aggregate { failures: inner, .. }) => failures.extend(inner),
        Err(e) => failures.push(e),
    }
}

pub(crate) fn into_hook_result(
    phase: Phase,
    failures: Vec<LifecycleError>,
) -> Result<(), crate::framework::HookError> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(Box::new(LifecycleError::Aggregate { phase, failures }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::{CallLog, MockComponent};

    fn set(log: &CallLog, names: &[&str]) -> Children<MockComponent> {
        let children = Children::new("component");
        for name in names {
            children
                .insert(MockComponent::new(*name, None, log.clone()))
                .unwrap();
        }
        children
    }

    #[tokio::test]
    async fn forward_then_reverse() {
        let log = CallLog::new();
        let children = set(&log, &["A", "B", "C"]);

        children.propagate(Phase::Init).await.unwrap();
        children.propagate(Phase::Start).await.unwrap();
        children.propagate(Phase::Stop).await.unwrap();

        assert_eq!(log.phase(Phase::Start), vec!["A:start", "B:start", "C:start"]);
        assert_eq!(log.phase(Phase::Stop), vec!["C:stop", "B:stop", "A:stop"]);
    }

    #[tokio::test]
    async fn failure_does_not_skip_siblings() {
        let log = CallLog::new();
        let children = set(&log, &["A", "B", "C"]);
        children.find("B").unwrap().fail_on(Phase::Start);

        children.propagate(Phase::Init).await.unwrap();
        let err = children.propagate(Phase::Start).await.unwrap_err();

        match err {
            LifecycleError::Aggregate { phase, failures } => {
                assert_eq!(phase, Phase::Start);
                assert_eq!(failures.len(), 1);
            }
            other => panic!("expected aggregate, got {other:?}"),
        }
        assert_eq!(log.phase(Phase::Start), vec!["A:start", "B:start", "C:start"]);
        assert_eq!(children.find("C").unwrap().state(), LifecycleState::Started);
        assert_eq!(children.find("B").unwrap().state(), LifecycleState::Failed);
    }

    #[test]
    fn duplicate_names_rejected() {
        let log = CallLog::new();
        let children = set(&log, &["A"]);
        let original = children.find("A").unwrap();

        let err = children
            .insert(MockComponent::new("A", None, log.clone()))
            .unwrap_err();
        assert!(matches!(err, ContainerError::DuplicateName(ref n) if n == "A"));
        assert!(Arc::ptr_eq(&children.find("A").unwrap(), &original));
        assert_eq!(children.len(), 1);
    }

    #[test]
    fn remove_requires_same_instance() {
        let log = CallLog::new();
        let children = set(&log, &["A", "B"]);
        let impostor = MockComponent::new("A", None, log.clone());

        assert!(children.remove(&impostor).is_none());
        let a = children.find("A").unwrap();
        assert!(children.remove(&a).is_some());
        assert_eq!(children.names(), vec!["B".to_string()]);
    }
}
