//! # Declared Management Surface
//!
//! Each registered component describes what operators may read, write and
//! invoke through a static [`ResourceDescriptor`]. Access goes through
//! [`ManagedResource`], which checks requests against that table before the
//! component sees them.

use async_trait::async_trait;
use serde::Serialize;

use crate::framework::{Lifecycle, LifecycleError};

/// Value of an exposed attribute or the result of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Unit,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
}

impl AttributeValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Unit => "unit",
            AttributeValue::Bool(_) => "bool",
            AttributeValue::Int(_) => "int",
            AttributeValue::Str(_) => "string",
            AttributeValue::List(_) => "list",
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Str(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Str(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(value: Vec<String>) -> Self {
        AttributeValue::List(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttributeInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub writable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperationInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// The full management surface of one component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceDescriptor {
    pub type_name: &'static str,
    pub attributes: &'static [AttributeInfo],
    pub operations: &'static [OperationInfo],
}

impl ResourceDescriptor {
    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn operation(&self, name: &str) -> Option<&OperationInfo> {
        self.operations.iter().find(|o| o.name == name)
    }
}

/// Attribute shared by every lifecycle component.
pub const STATE_NAME: AttributeInfo = AttributeInfo {
    name: "stateName",
    description: "Current lifecycle state",
    writable: false,
};

pub const START: OperationInfo = OperationInfo {
    name: "start",
    description: "Start the component",
};

pub const STOP: OperationInfo = OperationInfo {
    name: "stop",
    description: "Stop the component",
};

pub const DESTROY: OperationInfo = OperationInfo {
    name: "destroy",
    description: "Destroy the component",
};

#[derive(Debug, thiserror::Error)]
pub enum ManagementError {
    #[error("no registered component named `{0}`")]
    NotRegistered(String),
    #[error("`{resource}` has no attribute `{attribute}`")]
    UnknownAttribute { resource: String, attribute: String },
    #[error("attribute `{0}` is read-only")]
    ReadOnly(String),
    #[error("attribute `{attribute}` expects {expected}, got {actual}")]
    TypeMismatch {
        attribute: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("invalid value for `{attribute}`: {reason}")]
    InvalidValue { attribute: String, reason: String },
    #[error("`{resource}` has no operation `{operation}`")]
    UnknownOperation { resource: String, operation: String },
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// A live component as seen through the registry.
///
/// Implementors supply the `read_*`/`write_*`/`call_*` parts; the provided
/// methods reject anything the descriptor does not declare.
#[async_trait]
pub trait ManagedResource: Send + Sync {
    fn descriptor(&self) -> &'static ResourceDescriptor;

    fn read_attribute(&self, name: &str) -> Option<AttributeValue>;

    fn write_attribute(&self, name: &str, _value: AttributeValue) -> Result<(), ManagementError> {
        Err(ManagementError::ReadOnly(name.to_string()))
    }

    async fn call_operation(&self, name: &str) -> Result<AttributeValue, ManagementError>;

    fn get_attribute(&self, name: &str) -> Result<AttributeValue, ManagementError> {
        let descriptor = self.descriptor();
        if descriptor.attribute(name).is_none() {
            return Err(unknown_attribute(descriptor, name));
        }
        self.read_attribute(name)
            .ok_or_else(|| unknown_attribute(descriptor, name))
    }

    fn set_attribute(&self, name: &str, value: AttributeValue) -> Result<(), ManagementError> {
        match self.descriptor().attribute(name) {
            None => Err(unknown_attribute(self.descriptor(), name)),
            Some(info) if !info.writable => Err(ManagementError::ReadOnly(name.to_string())),
            Some(_) => self.write_attribute(name, value),
        }
    }

    async fn invoke(&self, operation: &str) -> Result<AttributeValue, ManagementError> {
        let descriptor = self.descriptor();
        if descriptor.operation(operation).is_none() {
            return Err(ManagementError::UnknownOperation {
                resource: descriptor.type_name.to_string(),
                operation: operation.to_string(),
            });
        }
        self.call_operation(operation).await
    }
}

fn unknown_attribute(descriptor: &ResourceDescriptor, name: &str) -> ManagementError {
    ManagementError::UnknownAttribute {
        resource: descriptor.type_name.to_string(),
        attribute: name.to_string(),
    }
}

/// Runs the shared `start`/`stop`/`destroy` operations against a component.
pub async fn invoke_lifecycle<L: Lifecycle + Sync + ?Sized>(
    component: &L,
    type_name: &str,
    operation: &str,
) -> Result<AttributeValue, ManagementError> {
    match operation {
        "start" => component.start().await?,
        "stop" => component.stop().await?,
        "destroy" => component.destroy().await?,
        other => {
            return Err(ManagementError::UnknownOperation {
                resource: type_name.to_string(),
                operation: other.to_string(),
            })
        }
    }
    Ok(AttributeValue::Unit)
}

/// Extracts an integer for a writable attribute, or reports the mismatch.
pub fn expect_int(attribute: &str, value: AttributeValue) -> Result<i64, ManagementError> {
    match value {
        AttributeValue::Int(v) => Ok(v),
        other => Err(ManagementError::TypeMismatch {
            attribute: attribute.to_string(),
            expected: "int",
            actual: other.type_name(),
        }),
    }
}

pub fn expect_str(attribute: &str, value: AttributeValue) -> Result<String, ManagementError> {
    match value {
        AttributeValue::Str(v) => Ok(v),
        other => Err(ManagementError::TypeMismatch {
            attribute: attribute.to_string(),
            expected: "string",
            actual: other.type_name(),
        }),
    }
}
