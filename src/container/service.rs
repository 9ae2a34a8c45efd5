//! A named group of components inside a server.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::container::children::{self, Children};
use crate::container::{ContainerError, Server};
use crate::framework::{Component, HookError, Lifecycle, LifecycleCore, Phase};
use crate::hosted::HostedUnit;
use crate::management::{
    invoke_lifecycle, AttributeInfo, AttributeValue, Managed, ManagedResource, ManagementBinding,
    ManagementError, Registry, ResourceDescriptor, DESTROY, START, STATE_NAME, STOP,
};

static ATTRIBUTES: [AttributeInfo; 3] = [
    STATE_NAME,
    AttributeInfo {
        name: "name",
        description: "Service name",
        writable: false,
    },
    AttributeInfo {
        name: "componentNames",
        description: "Names of the owned components, in start order",
        writable: false,
    },
];

static DESCRIPTOR: ResourceDescriptor = ResourceDescriptor {
    type_name: "Service",
    attributes: &ATTRIBUTES,
    operations: &[START, STOP, DESTROY],
};

/// A service owns an ordered set of components and carries every lifecycle
/// transition down to them.
pub struct Service {
    name: String,
    core: LifecycleCore,
    binding: ManagementBinding,
    self_ref: Weak<Service>,
    server: RwLock<Weak<Server>>,
    components: Children<dyn Component>,
}

impl Service {
    pub fn new(name: impl Into<String>, registry: Option<Arc<dyn Registry>>) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|self_ref| Self {
            name,
            core: LifecycleCore::new(),
            binding: registry
                .map(ManagementBinding::new)
                .unwrap_or_else(ManagementBinding::detached),
            self_ref: self_ref.clone(),
            server: RwLock::new(Weak::new()),
            components: Children::new("component"),
        })
    }

    /// The owning server, while attached.
    pub fn server(&self) -> Option<Arc<Server>> {
        self.server.read().upgrade()
    }

    pub(crate) fn set_server(&self, server: Weak<Server>) {
        *self.server.write() = server;
    }

    /// Adds a component and brings it to this service's current phase.
    ///
    /// A name already present fails with [`ContainerError::DuplicateName`]
    /// and leaves the existing component in place. If catching up fails the
    /// component stays added and the lifecycle error is returned.
    pub async fn add_component(&self, component: Arc<dyn Component>) -> Result<(), ContainerError> {
        self.components.insert(component.clone())?;
        children::catch_up(component.as_ref(), self.state()).await?;
        Ok(())
    }

    /// Adds a hosted unit, making this service its parent first.
    pub async fn add_unit(&self, unit: Arc<HostedUnit>) -> Result<(), ContainerError> {
        unit.set_service(self.self_ref.clone());
        self.add_component(unit).await
    }

    pub fn find_component(&self, name: &str) -> Option<Arc<dyn Component>> {
        self.components.find(name)
    }

    pub fn find_components(&self) -> Vec<Arc<dyn Component>> {
        self.components.snapshot()
    }

    /// Detaches the named component, stopping it if it is running. The
    /// component is not destroyed.
    pub async fn remove_component(&self, name: &str) -> Option<Arc<dyn Component>> {
        let removed = self.components.remove_named(name)?;
        children::stop_detached(removed.as_ref()).await;
        Some(removed)
    }
}

#[async_trait]
impl Component for Service {
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
        Ok(self.components.propagate(Phase::Init).await?)
    }

    async fn on_start(&self) -> Result<(), HookError> {
        Ok(self.components.propagate(Phase::Start).await?)
    }

    async fn on_stop(&self) -> Result<(), HookError> {
        Ok(self.components.propagate(Phase::Stop).await?)
    }

    async fn on_destroy(&self) -> Result<(), HookError> {
        Ok(self.components.propagate(Phase::Destroy).await?)
    }
}

impl Managed for Service {
    fn binding(&self) -> &ManagementBinding {
        &self.binding
    }

    fn domain_internal(&self) -> Option<String> {
        self.server().map(|server| server.domain())
    }

    fn key_properties(&self) -> String {
        format!("type=Service,name={}", self.name)
    }

    fn resource(&self) -> Option<Arc<dyn ManagedResource>> {
        self.self_ref
            .upgrade()
            .map(|this| this as Arc<dyn ManagedResource>)
    }
}

#[async_trait]
impl ManagedResource for Service {
    fn descriptor(&self) -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    fn read_attribute(&self, name: &str) -> Option<AttributeValue> {
        match name {
            "stateName" => Some(self.state_name().into()),
            "name" => Some(self.name.clone().into()),
            "componentNames" => Some(self.components.names().into()),
            _ => None,
        }
    }

    async fn call_operation(&self, name: &str) -> Result<AttributeValue, ManagementError> {
        invoke_lifecycle(self, DESCRIPTOR.type_name, name).await
    }
}
