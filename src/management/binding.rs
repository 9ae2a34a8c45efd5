//! Ties a component's registry entry to its lifecycle.
//!
//! The lifecycle core calls [`ManagementBinding::register_component`] right
//! after entering `INITIALIZING` and [`ManagementBinding::unregister_component`]
//! as the last step of `DESTROYING`, so the entry lives exactly from
//! `INITIALIZED` to `DESTROYING`. Neither call ever fails the transition:
//! registry problems cost observability, not function.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::management::{ManagedResource, ObjectName, Registry};

/// Domain used when neither an explicit domain nor the component supplies one.
pub const DEFAULT_DOMAIN: &str = "Lifecycle";

/// Implemented by components that appear in the management registry.
pub trait Managed: Send + Sync {
    fn binding(&self) -> &ManagementBinding;

    /// Domain derived from the component's position in the hierarchy, if any.
    fn domain_internal(&self) -> Option<String> {
        None
    }

    /// Component-specific part of the structured name, e.g. `type=Service,name=Main`.
    fn key_properties(&self) -> String;

    /// The live object the registry entry points to.
    fn resource(&self) -> Option<Arc<dyn ManagedResource>>;

    /// Explicit domain, else [`Managed::domain_internal`], else [`DEFAULT_DOMAIN`].
    fn domain(&self) -> String {
        self.binding().resolve_domain(|| self.domain_internal())
    }
}

#[derive(Default)]
struct BindingState {
    registry: Option<Arc<dyn Registry>>,
    domain: Option<String>,
    name: Option<ObjectName>,
}

/// Registration bookkeeping embedded in a managed component.
#[derive(Default)]
pub struct ManagementBinding {
    state: Mutex<BindingState>,
}

impl ManagementBinding {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            state: Mutex::new(BindingState {
                registry: Some(registry),
                ..BindingState::default()
            }),
        }
    }

    /// A binding with no registry. Registration is skipped entirely.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn set_domain(&self, domain: impl Into<String>) {
        self.state.lock().domain = Some(domain.into());
    }

    /// Resolves and caches the domain. `resolver` runs without the binding
    /// locked, so it may consult parent components.
    pub fn resolve_domain(&self, resolver: impl FnOnce() -> Option<String>) -> String {
        if let Some(domain) = self.state.lock().domain.clone() {
            return domain;
        }
        let resolved = resolver().unwrap_or_else(|| DEFAULT_DOMAIN.to_string());
        self.state
            .lock()
            .domain
            .get_or_insert(resolved)
            .clone()
    }

    /// Name of the current registry entry, if one exists.
    pub fn object_name(&self) -> Option<ObjectName> {
        self.state.lock().name.clone()
    }

    pub fn registry(&self) -> Option<Arc<dyn Registry>> {
        self.state.lock().registry.clone()
    }

    /// Records a name and registry assigned from outside before `init`.
    /// Self-registration is then skipped; unregistration at `destroy` still
    /// happens against `registry`.
    pub fn pre_register(&self, registry: Arc<dyn Registry>, name: ObjectName) {
        let mut state = self.state.lock();
        if let Some(existing) = &state.name {
            warn!(existing = %existing, requested = %name, "Already registered; pre-registration ignored");
            return;
        }
        state.domain = Some(name.domain().to_string());
        state.registry = Some(registry);
        state.name = Some(name);
    }

    pub(crate) fn register_component(&self, managed: &dyn Managed) {
        let registry = {
            let state = self.state.lock();
            if let Some(name) = &state.name {
                debug!(name = %name, "Registration already in place");
                return;
            }
            match &state.registry {
                Some(registry) => registry.clone(),
                None => return,
            }
        };

        let domain = managed.domain();
        let keys = managed.key_properties();
        let name = match ObjectName::new(&domain, &keys) {
            Ok(name) => name,
            Err(e) => {
                warn!(domain = %domain, keys = %keys, error = %e, "Cannot build object name");
                return;
            }
        };
        let Some(resource) = managed.resource() else {
            warn!(name = %name, "Component has no managed resource; not registered");
            return;
        };

        match registry.register(name.clone(), resource) {
            Ok(registered) => self.state.lock().name = Some(registered),
            Err(e) => warn!(name = %name, error = %e, "Registration failed"),
        }
    }

    pub(crate) fn unregister_component(&self) {
        let (registry, name) = {
            let mut state = self.state.lock();
            (state.registry.clone(), state.name.take())
        };
        let Some(name) = name else {
            if registry.is_some() {
                warn!("No registry entry to unregister");
            } else {
                debug!("Detached component; nothing to unregister");
            }
            return;
        };
        let Some(registry) = registry else {
            warn!(name = %name, "No registry available; cannot unregister");
            return;
        };
        if let Err(e) = registry.unregister(&name) {
            warn!(name = %name, error = %e, "Unregistration failed");
        }
    }
}

impl std::fmt::Debug for ManagementBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManagementBinding")
            .field("registry", &state.registry.is_some())
            .field("domain", &state.domain)
            .field("name", &state.name)
            .finish()
    }
}
