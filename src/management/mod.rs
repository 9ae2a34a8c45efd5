//! Management registry integration.
//!
//! # Main Components
//!
//! - [`ObjectName`] - Structured `domain:key=value,...` names
//! - [`Registry`] - The injected directory of live components, with
//!   [`InMemoryRegistry`] as the process-wide implementation
//! - [`ManagementBinding`] - Per-component registration kept in lock-step with
//!   `init`/`destroy`
//! - [`ManagedResource`] - Attribute and operation access checked against a
//!   static [`ResourceDescriptor`]

pub mod binding;
pub mod descriptor;
pub mod name;
pub mod registry;

pub use binding::{Managed, ManagementBinding, DEFAULT_DOMAIN};
pub use descriptor::*;
pub use name::{ObjectName, ObjectNameError};
pub use registry::{InMemoryRegistry, Registry, RegistryError};
