use std::sync::Arc;

use lifecycle_recipe::framework::mock::{CallLog, MockComponent, RecordingListener, RecordingRegistry, RegistryCall};
use lifecycle_recipe::framework::{ErrorKind, Lifecycle, LifecycleError, LifecycleState, Phase};
use lifecycle_recipe::management::{Managed, ManagedResource, ObjectName, Registry};

fn registered(name: &str) -> (Arc<MockComponent>, Arc<RecordingRegistry>) {
    let registry = RecordingRegistry::new();
    let component = MockComponent::new(name, Some(registry.clone()), CallLog::new());
    (component, registry)
}

/// A second init is rejected and leaves the component where it was.
#[tokio::test]
async fn test_double_init_is_invalid() {
    let a = MockComponent::named("A");
    a.init().await.expect("first init");

    let err = a.init().await.expect_err("second init must fail");
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    assert_eq!(a.state(), LifecycleState::Initialized);
    assert_eq!(a.calls(Phase::Init), 1);
}

/// Starting a started component does nothing.
#[tokio::test]
async fn test_start_is_idempotent() {
    let a = MockComponent::named("A");
    a.init().await.unwrap();
    a.start().await.unwrap();
    a.start().await.expect("second start is a no-op");

    assert_eq!(a.state(), LifecycleState::Started);
    assert_eq!(a.calls(Phase::Start), 1);
}

/// A failed start leaves the component FAILED; stop still cleans up.
#[tokio::test]
async fn test_failed_start_can_be_stopped() {
    let a = MockComponent::named("A");
    a.fail_on(Phase::Start);
    a.init().await.unwrap();

    let err = a.start().await.expect_err("start hook fails");
    assert!(matches!(
        err,
        LifecycleError::HookFailure { phase: Phase::Start, .. }
    ));
    assert_eq!(a.state(), LifecycleState::Failed);

    let err = a.start().await.expect_err("FAILED only accepts stop/destroy");
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    a.stop().await.expect("stop from FAILED");
    assert_eq!(a.state(), LifecycleState::Stopped);
    assert_eq!(a.calls(Phase::Stop), 1);
}

/// Every transition is announced to listeners, in order.
#[tokio::test]
async fn test_listeners_see_full_cycle() {
    let a = MockComponent::named("A");
    let listener = RecordingListener::new();
    a.add_lifecycle_listener(listener.clone());

    a.init().await.unwrap();
    a.start().await.unwrap();
    a.destroy().await.unwrap();

    use LifecycleState::*;
    assert_eq!(
        listener.states(),
        vec![
            Initializing, Initialized, Starting, Started, Stopping, Stopped, Destroying,
            Destroyed,
        ]
    );
    let first = &listener.events()[0];
    assert_eq!(first.previous, New);
}

/// A removed listener hears nothing more.
#[tokio::test]
async fn test_removed_listener_is_silent() {
    let a = MockComponent::named("A");
    let listener = RecordingListener::new();
    let handle: Arc<dyn lifecycle_recipe::framework::LifecycleListener> = listener.clone();
    a.add_lifecycle_listener(handle.clone());

    a.init().await.unwrap();
    assert!(a.remove_lifecycle_listener(&handle));
    a.start().await.unwrap();

    assert_eq!(listener.states().len(), 2);
}

/// Destroying a component that was never started skips its stop hook.
#[tokio::test]
async fn test_destroy_from_new() {
    let a = MockComponent::named("A");
    a.destroy().await.unwrap();

    assert_eq!(a.state(), LifecycleState::Destroyed);
    assert_eq!(a.calls(Phase::Stop), 0);
    assert_eq!(a.calls(Phase::Destroy), 1);
}

/// init + destroy registers once and unregisters the same name once.
#[tokio::test]
async fn test_registration_matches_lifecycle() {
    let (a, registry) = registered("A");
    let expected: ObjectName = "Lifecycle:type=Mock,name=A".parse().unwrap();

    a.init().await.unwrap();
    assert_eq!(a.binding().object_name(), Some(expected.clone()));
    assert!(registry.is_registered(&expected));

    a.destroy().await.unwrap();
    a.destroy().await.expect("second destroy is a no-op");

    assert_eq!(
        registry.calls(),
        vec![
            RegistryCall::Register(expected.clone()),
            RegistryCall::Unregister(expected),
        ]
    );
    assert_eq!(a.binding().object_name(), None);
}

/// The registry entry exposes the live component.
#[tokio::test]
async fn test_registry_sees_live_state() {
    let (a, registry) = registered("A");
    let registry: Arc<dyn Registry> = registry;
    a.init().await.unwrap();
    let name = a.binding().object_name().expect("registered");

    assert_eq!(
        registry.get_attribute(&name, "stateName").unwrap(),
        "INITIALIZED".into()
    );
    registry.invoke(&name, "start").await.expect("start via registry");
    assert_eq!(a.state(), LifecycleState::Started);
    assert!(registry.invoke(&name, "explode").await.is_err());
}

/// A registry that refuses the name costs the entry, not the init.
#[tokio::test]
async fn test_registration_failure_does_not_fail_init() {
    let (a, registry) = registered("A");
    registry.reject_registrations();

    a.init().await.expect("init succeeds without registration");
    assert_eq!(a.state(), LifecycleState::Initialized);
    assert_eq!(a.binding().object_name(), None);

    a.destroy().await.unwrap();
    assert_eq!(registry.register_count(), 1);
    assert_eq!(registry.unregister_count(), 0);
}

/// A name assigned from outside is used as is and removed at destroy.
#[tokio::test]
async fn test_pre_registered_component() {
    let (a, registry) = registered("A");
    let name: ObjectName = "Custom:type=Mock,name=External".parse().unwrap();
    registry
        .register(name.clone(), a.clone() as Arc<dyn ManagedResource>)
        .unwrap();
    a.binding().pre_register(registry.clone(), name.clone());

    a.init().await.unwrap();
    assert_eq!(registry.register_count(), 1);
    assert_eq!(a.domain(), "Custom");

    a.destroy().await.unwrap();
    assert_eq!(registry.calls().last(), Some(&RegistryCall::Unregister(name)));
    assert!(registry.names().is_empty());
}

/// A failed init keeps the registry entry until destroy.
#[tokio::test]
async fn test_failed_init_cleaned_up_by_destroy() {
    let (a, registry) = registered("A");
    a.fail_on(Phase::Init);

    assert!(a.init().await.is_err());
    assert_eq!(a.state(), LifecycleState::Failed);
    assert_eq!(registry.names().len(), 1);

    a.destroy().await.unwrap();
    assert_eq!(a.state(), LifecycleState::Destroyed);
    assert!(registry.names().is_empty());
}

/// Concurrent transitions on one component are serialized.
#[tokio::test]
async fn test_concurrent_starts_run_hook_once() {
    let a = MockComponent::named("A");
    a.init().await.unwrap();

    let mut handles = vec![];
    for _ in 0..8 {
        let a = a.clone();
        handles.push(tokio::spawn(async move { a.start().await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(a.calls(Phase::Start), 1);
    assert_eq!(a.state(), LifecycleState::Started);
}
