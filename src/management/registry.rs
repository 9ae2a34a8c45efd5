//! The management registry: a process-wide directory from [`ObjectName`] to
//! live components.
//!
//! The registry is injected into every component that registers itself; it
//! is never reached through global state. Implementations must tolerate
//! concurrent use from many components' lifecycle tasks.

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::management::{AttributeValue, ManagedResource, ManagementError, ObjectName, ObjectNameError};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("`{0}` is already registered")]
    InstanceExists(ObjectName),
    #[error("`{0}` is not registered")]
    InstanceNotFound(ObjectName),
    #[error(transparent)]
    InvalidName(#[from] ObjectNameError),
}

pub trait Registry: Send + Sync {
    /// Adds an entry. Returns the name the entry was stored under.
    fn register(
        &self,
        name: ObjectName,
        resource: Arc<dyn ManagedResource>,
    ) -> Result<ObjectName, RegistryError>;

    fn unregister(&self, name: &ObjectName) -> Result<(), RegistryError>;

    fn lookup(&self, name: &ObjectName) -> Option<Arc<dyn ManagedResource>>;

    /// Registered names in registration order.
    fn names(&self) -> Vec<ObjectName>;

    fn is_registered(&self, name: &ObjectName) -> bool {
        self.lookup(name).is_some()
    }

    fn query(&self, domain: &str) -> Vec<ObjectName> {
        self.names()
            .into_iter()
            .filter(|n| n.domain() == domain)
            .collect()
    }
}

impl dyn Registry {
    fn resolve(&self, name: &ObjectName) -> Result<Arc<dyn ManagedResource>, ManagementError> {
        self.lookup(name)
            .ok_or_else(|| ManagementError::NotRegistered(name.to_string()))
    }

    pub fn get_attribute(
        &self,
        name: &ObjectName,
        attribute: &str,
    ) -> Result<AttributeValue, ManagementError> {
        self.resolve(name)?.get_attribute(attribute)
    }

    pub fn set_attribute(
        &self,
        name: &ObjectName,
        attribute: &str,
        value: AttributeValue,
    ) -> Result<(), ManagementError> {
        self.resolve(name)?.set_attribute(attribute, value)
    }

    pub async fn invoke(
        &self,
        name: &ObjectName,
        operation: &str,
    ) -> Result<AttributeValue, ManagementError> {
        let resource = self.resolve(name)?;
        resource.invoke(operation).await
    }
}

/// Registry kept in process memory.
///
/// Entries hold weak references, so the registry never keeps a component
/// alive on its own.
#[derive(Default)]
pub struct InMemoryRegistry {
    entries: RwLock<IndexMap<ObjectName, Weak<dyn ManagedResource>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Registry for InMemoryRegistry {
    fn register(
        &self,
        name: ObjectName,
        resource: Arc<dyn ManagedResource>,
    ) -> Result<ObjectName, RegistryError> {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(&name) {
            if existing.strong_count() > 0 {
                return Err(RegistryError::InstanceExists(name));
            }
        }
        debug!(name = %name, "Registered");
        entries.insert(name.clone(), Arc::downgrade(&resource));
        Ok(name)
    }

    fn unregister(&self, name: &ObjectName) -> Result<(), RegistryError> {
        match self.entries.write().shift_remove(name) {
            Some(_) => {
                debug!(name = %name, "Unregistered");
                Ok(())
            }
            None => Err(RegistryError::InstanceNotFound(name.clone())),
        }
    }

    fn lookup(&self, name: &ObjectName) -> Option<Arc<dyn ManagedResource>> {
        self.entries.read().get(name).and_then(Weak::upgrade)
    }

    fn names(&self) -> Vec<ObjectName> {
        self.entries.read().keys().cloned().collect()
    }
}
