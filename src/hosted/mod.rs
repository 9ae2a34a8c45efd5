//! # Hosted Units
//!
//! The request-handling code a service hosts. The container does not know what
//! a unit does; it only drives the [`Servlet`] capability at the right
//! lifecycle points through a [`HostedUnit`] envelope:
//!
//! ```text
//! start → Servlet::initialize
//!         handle() accepted while STARTED
//! stop  → wait for in-flight requests (bounded by unload_delay)
//!       → Servlet::teardown
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod unit;

pub use unit::{HostedUnit, UnitOptions};

/// Static description of one hosted unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UnitConfig {
    pub name: String,
    #[serde(default)]
    pub init_params: BTreeMap<String, String>,
}

impl UnitConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            init_params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.init_params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.init_params.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub path: String,
    pub body: String,
}

impl Request {
    pub fn new(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    #[error("unit `{0}` is not available")]
    Unavailable(String),
    #[error("request failed: {0}")]
    Failed(String),
    #[error("initialization failed: {0}")]
    Initialization(String),
}

/// What a hosted unit must provide.
#[async_trait]
pub trait Servlet: Send + Sync {
    async fn initialize(&self, _config: &UnitConfig) -> Result<(), HandlerError> {
        Ok(())
    }

    async fn handle(&self, request: Request) -> Result<Response, HandlerError>;

    /// Free-form description shown to operators.
    fn describe(&self) -> String {
        String::new()
    }

    async fn teardown(&self) {}
}
