//! # Mock Framework
//!
//! Test doubles for exercising the lifecycle protocol in isolation.
//!
//! - [`RecordingRegistry`] records every `register`/`unregister` call and can
//!   be told to reject registrations.
//! - [`MockComponent`] counts hook invocations, writes them to a shared
//!   [`CallLog`] and fails any phase on request.
//! - [`RecordingListener`] keeps every [`LifecycleEvent`] it receives.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::framework::{
    Component, HookError, Lifecycle, LifecycleCore, LifecycleEvent, LifecycleListener,
    LifecycleState, ListenerError, Phase,
};
use crate::management::{
    invoke_lifecycle, AttributeInfo, AttributeValue, InMemoryRegistry, Managed, ManagedResource,
    ManagementBinding, ManagementError, ObjectName, Registry, RegistryError, ResourceDescriptor,
    DESTROY, START, STATE_NAME, STOP,
};

// =============================================================================
// RECORDING REGISTRY
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCall {
    Register(ObjectName),
    Unregister(ObjectName),
}

/// An [`InMemoryRegistry`] that remembers every call made against it.
#[derive(Default)]
pub struct RecordingRegistry {
    inner: InMemoryRegistry,
    calls: Mutex<Vec<RegistryCall>>,
    reject_registrations: AtomicBool,
}

impl RecordingRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every subsequent `register` fails with `InstanceExists`.
    pub fn reject_registrations(&self) {
        self.reject_registrations.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RegistryCall> {
        self.calls.lock().clone()
    }

    pub fn register_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, RegistryCall::Register(_)))
            .count()
    }

    pub fn unregister_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, RegistryCall::Unregister(_)))
            .count()
    }
}

impl Registry for RecordingRegistry {
    fn register(
        &self,
        name: ObjectName,
        resource: Arc<dyn ManagedResource>,
    ) -> Result<ObjectName, RegistryError> {
        self.calls
            .lock()
            .push(RegistryCall::Register(name.clone()));
        if self.reject_registrations.load(Ordering::SeqCst) {
            return Err(RegistryError::InstanceExists(name));
        }
        self.inner.register(name, resource)
    }

    fn unregister(&self, name: &ObjectName) -> Result<(), RegistryError> {
        self.calls
            .lock()
            .push(RegistryCall::Unregister(name.clone()));
        self.inner.unregister(name)
    }

    fn lookup(&self, name: &ObjectName) -> Option<Arc<dyn ManagedResource>> {
        self.inner.lookup(name)
    }

    fn names(&self) -> Vec<ObjectName> {
        self.inner.names()
    }
}

// =============================================================================
// CALL LOG
// =============================================================================

/// Ordered record of hook invocations shared between several components,
/// as `"<name>:<phase>"` entries.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Entries for one phase, e.g. `["A:start", "B:start"]`.
    pub fn phase(&self, phase: Phase) -> Vec<String> {
        let suffix = format!(":{phase}");
        self.entries()
            .into_iter()
            .filter(|e| e.ends_with(&suffix))
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

// =============================================================================
// MOCK COMPONENT
// =============================================================================

static MOCK_ATTRIBUTES: [AttributeInfo; 2] = [
    STATE_NAME,
    AttributeInfo {
        name: "name",
        description: "Component name",
        writable: false,
    },
];

static MOCK_DESCRIPTOR: ResourceDescriptor = ResourceDescriptor {
    type_name: "Mock",
    attributes: &MOCK_ATTRIBUTES,
    operations: &[START, STOP, DESTROY],
};

/// A scripted component for lifecycle tests.
///
/// # Example
/// ```ignore
/// let log = CallLog::new();
/// let a = MockComponent::new("A", None, log.clone());
/// a.fail_on(Phase::Start);
/// a.init().await?;
/// assert!(a.start().await.is_err());
/// assert_eq!(log.entries(), vec!["A:init", "A:start"]);
/// ```
pub struct MockComponent {
    name: String,
    core: LifecycleCore,
    binding: ManagementBinding,
    self_ref: Weak<MockComponent>,
    log: CallLog,
    counts: [AtomicUsize; 4],
    failures: Mutex<HashSet<Phase>>,
}

impl MockComponent {
    pub fn new(
        name: impl Into<String>,
        registry: Option<Arc<dyn Registry>>,
        log: CallLog,
    ) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|self_ref| Self {
            name,
            core: LifecycleCore::new(),
            binding: registry
                .map(ManagementBinding::new)
                .unwrap_or_else(ManagementBinding::detached),
            self_ref: self_ref.clone(),
            log,
            counts: Default::default(),
            failures: Mutex::new(HashSet::new()),
        })
    }

    /// A component with no registry and a private log.
    pub fn named(name: impl Into<String>) -> Arc<Self> {
        Self::new(name, None, CallLog::new())
    }

    /// Make the hook for `phase` fail from now on.
    pub fn fail_on(&self, phase: Phase) {
        self.failures.lock().insert(phase);
    }

    pub fn succeed_on(&self, phase: Phase) {
        self.failures.lock().remove(&phase);
    }

    /// How many times the hook for `phase` ran.
    pub fn calls(&self, phase: Phase) -> usize {
        self.counts[index(phase)].load(Ordering::SeqCst)
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    fn hook(&self, phase: Phase) -> Result<(), HookError> {
        self.counts[index(phase)].fetch_add(1, Ordering::SeqCst);
        self.log.record(format!("{}:{}", self.name, phase));
        if self.failures.lock().contains(&phase) {
            return Err(format!("{} {} failed on request", self.name, phase).into());
        }
        Ok(())
    }
}

fn index(phase: Phase) -> usize {
    match phase {
        Phase::Init => 0,
        Phase::Start => 1,
        Phase::Stop => 2,
        Phase::Destroy => 3,
    }
}

#[async_trait]
impl Component for MockComponent {
    fn lifecycle(&self) -> &LifecycleCore {
        &self.core
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn managed(&self) -> Option<&dyn Managed> {
        Some(self)
    }

    async fn on_init(&self) -> Result<(), HookError> {
        self.hook(Phase::Init)
    }

    async fn on_start(&self) -> Result<(), HookError> {
        self.hook(Phase::Start)
    }

    async fn on_stop(&self) -> Result<(), HookError> {
        self.hook(Phase::Stop)
    }

    async fn on_destroy(&self) -> Result<(), HookError> {
        self.hook(Phase::Destroy)
    }
}

impl Managed for MockComponent {
    fn binding(&self) -> &ManagementBinding {
        &self.binding
    }

    fn key_properties(&self) -> String {
        format!("type=Mock,name={}", self.name)
    }

    fn resource(&self) -> Option<Arc<dyn ManagedResource>> {
        self.self_ref
            .upgrade()
            .map(|this| this as Arc<dyn ManagedResource>)
    }
}

#[async_trait]
impl ManagedResource for MockComponent {
    fn descriptor(&self) -> &'static ResourceDescriptor {
        &MOCK_DESCRIPTOR
    }

    fn read_attribute(&self, name: &str) -> Option<AttributeValue> {
        match name {
            "stateName" => Some(self.state_name().into()),
            "name" => Some(self.name.clone().into()),
            _ => None,
        }
    }

    async fn call_operation(&self, name: &str) -> Result<AttributeValue, ManagementError> {
        invoke_lifecycle(self, MOCK_DESCRIPTOR.type_name, name).await
    }
}

// =============================================================================
// RECORDING LISTENER
// =============================================================================

#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    /// The `state` of each received event, in order.
    pub fn states(&self) -> Vec<LifecycleState> {
        self.events().iter().map(|e| e.state).collect()
    }
}

impl LifecycleListener for RecordingListener {
    fn lifecycle_event(&self, event: &LifecycleEvent) -> Result<(), ListenerError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}
