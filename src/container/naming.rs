//! Global naming resources owned by the server.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::info;

use crate::container::Server;
use crate::framework::{Component, HookError, Lifecycle, LifecycleCore};
use crate::management::{
    invoke_lifecycle, AttributeInfo, AttributeValue, Managed, ManagedResource, ManagementBinding,
    ManagementError, Registry, ResourceDescriptor, DESTROY, START, STATE_NAME, STOP,
};

static ATTRIBUTES: [AttributeInfo; 2] = [
    STATE_NAME,
    AttributeInfo {
        name: "environmentNames",
        description: "Names of the global environment entries",
        writable: false,
    },
];

static DESCRIPTOR: ResourceDescriptor = ResourceDescriptor {
    type_name: "NamingResources",
    attributes: &ATTRIBUTES,
    operations: &[START, STOP, DESTROY],
};

/// Named environment entries shared by every service of a server.
pub struct NamingResources {
    core: LifecycleCore,
    binding: ManagementBinding,
    self_ref: Weak<NamingResources>,
    server: RwLock<Weak<Server>>,
    environment: RwLock<IndexMap<String, String>>,
}

impl NamingResources {
    pub fn new(registry: Option<Arc<dyn Registry>>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            core: LifecycleCore::new(),
            binding: registry
                .map(ManagementBinding::new)
                .unwrap_or_else(ManagementBinding::detached),
            self_ref: self_ref.clone(),
            server: RwLock::new(Weak::new()),
            environment: RwLock::new(IndexMap::new()),
        })
    }

    pub(crate) fn set_server(&self, server: Weak<Server>) {
        *self.server.write() = server;
    }

    /// Returns the previous value, if any.
    pub fn add_environment(&self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.environment.write().insert(name.into(), value.into())
    }

    pub fn find_environment(&self, name: &str) -> Option<String> {
        self.environment.read().get(name).cloned()
    }

    pub fn remove_environment(&self, name: &str) -> Option<String> {
        self.environment.write().shift_remove(name)
    }

    pub fn environment_names(&self) -> Vec<String> {
        self.environment.read().keys().cloned().collect()
    }
}

#[async_trait]
impl Component for NamingResources {
    fn lifecycle(&self) -> &LifecycleCore {
        &self.core
    }

    fn name(&self) -> String {
        "NamingResources".to_string()
    }

    fn managed(&self) -> Option<&dyn Managed> {
        Some(self)
    }

    async fn on_start(&self) -> Result<(), HookError> {
        info!(entries = self.environment.read().len(), "Global naming resources available");
        Ok(())
    }
}

impl Managed for NamingResources {
    fn binding(&self) -> &ManagementBinding {
        &self.binding
    }

    fn domain_internal(&self) -> Option<String> {
        self.server.read().upgrade().map(|server| server.domain())
    }

    fn key_properties(&self) -> String {
        "type=NamingResources".to_string()
    }

    fn resource(&self) -> Option<Arc<dyn ManagedResource>> {
        self.self_ref
            .upgrade()
            .map(|this| this as Arc<dyn ManagedResource>)
    }
}

#[async_trait]
impl ManagedResource for NamingResources {
    fn descriptor(&self) -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    fn read_attribute(&self, name: &str) -> Option<AttributeValue> {
        match name {
            "stateName" => Some(self.state_name().into()),
            "environmentNames" => Some(self.environment_names().into()),
            _ => None,
        }
    }

    async fn call_operation(&self, name: &str) -> Result<AttributeValue, ManagementError> {
        invoke_lifecycle(self, DESCRIPTOR.type_name, name).await
    }
}
