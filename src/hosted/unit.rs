use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::container::Service;
use crate::framework::{Component, HookError, Lifecycle, LifecycleCore, LifecycleState};
use crate::hosted::{HandlerError, Request, Response, Servlet, UnitConfig};
use crate::management::{
    expect_int, invoke_lifecycle, AttributeInfo, AttributeValue, Managed, ManagedResource,
    ManagementBinding, ManagementError, Registry, ResourceDescriptor, DESTROY, START, STATE_NAME,
    STOP,
};

static ATTRIBUTES: [AttributeInfo; 5] = [
    STATE_NAME,
    AttributeInfo {
        name: "requestCount",
        description: "Requests handled since creation",
        writable: false,
    },
    AttributeInfo {
        name: "errorCount",
        description: "Requests that failed",
        writable: false,
    },
    AttributeInfo {
        name: "info",
        description: "Description supplied by the unit",
        writable: false,
    },
    AttributeInfo {
        name: "unloadDelayMs",
        description: "How long stop waits for in-flight requests",
        writable: true,
    },
];

static DESCRIPTOR: ResourceDescriptor = ResourceDescriptor {
    type_name: "Unit",
    attributes: &ATTRIBUTES,
    operations: &[START, STOP, DESTROY],
};

#[derive(Debug, Clone)]
pub struct UnitOptions {
    /// Upper bound for each lifecycle hook. `None` lets hooks run unbounded.
    pub hook_timeout: Option<Duration>,
    /// Upper bound on waiting for in-flight requests during `stop`.
    pub unload_delay: Duration,
}

impl Default for UnitOptions {
    fn default() -> Self {
        Self {
            hook_timeout: None,
            unload_delay: Duration::from_secs(2),
        }
    }
}

/// Lifecycle envelope around one [`Servlet`].
pub struct HostedUnit {
    config: UnitConfig,
    servlet: Arc<dyn Servlet>,
    core: LifecycleCore,
    binding: ManagementBinding,
    self_ref: Weak<HostedUnit>,
    service: RwLock<Weak<Service>>,
    unload_delay: RwLock<Duration>,
    in_flight: AtomicUsize,
    drained: Notify,
    requests: AtomicU64,
    errors: AtomicU64,
}

impl HostedUnit {
    pub fn new(
        config: UnitConfig,
        servlet: Arc<dyn Servlet>,
        registry: Option<Arc<dyn Registry>>,
    ) -> Arc<Self> {
        Self::with_options(config, servlet, registry, UnitOptions::default())
    }

    pub fn with_options(
        config: UnitConfig,
        servlet: Arc<dyn Servlet>,
        registry: Option<Arc<dyn Registry>>,
        options: UnitOptions,
    ) -> Arc<Self> {
        let core = match options.hook_timeout {
            Some(limit) => LifecycleCore::new().with_hook_timeout(limit),
            None => LifecycleCore::new(),
        };
        Arc::new_cyclic(|self_ref| Self {
            config,
            servlet,
            core,
            binding: registry
                .map(ManagementBinding::new)
                .unwrap_or_else(ManagementBinding::detached),
            self_ref: self_ref.clone(),
            service: RwLock::new(Weak::new()),
            unload_delay: RwLock::new(options.unload_delay),
            in_flight: AtomicUsize::new(0),
            drained: Notify::new(),
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &UnitConfig {
        &self.config
    }

    pub(crate) fn set_service(&self, service: Weak<Service>) {
        *self.service.write() = service;
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn unload_delay(&self) -> Duration {
        *self.unload_delay.read()
    }

    pub fn set_unload_delay(&self, delay: Duration) {
        *self.unload_delay.write() = delay;
    }

    /// Passes one request to the unit. Only accepted while `STARTED`.
    pub async fn handle(&self, request: Request) -> Result<Response, HandlerError> {
        // Counted before the state check so a concurrent stop either sees
        // this request or this request sees the stop.
        let _in_flight = InFlight::enter(self);
        if self.state() != LifecycleState::Started {
            return Err(HandlerError::Unavailable(self.config.name.clone()));
        }

        self.requests.fetch_add(1, Ordering::Relaxed);
        let result = self.servlet.handle(request).await;
        if let Err(e) = &result {
            self.errors.fetch_add(1, Ordering::Relaxed);
            debug!(unit = %self.config.name, error = %e, "Request failed");
        }
        result
    }

    async fn drain(&self) {
        let deadline = Instant::now() + self.unload_delay();
        loop {
            let notified = self.drained.notified();
            let remaining = self.in_flight.load(Ordering::SeqCst);
            if remaining == 0 {
                return;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                warn!(unit = %self.config.name, remaining, "Unload delay elapsed with requests in flight");
                return;
            }
        }
    }
}

struct InFlight<'a>(&'a HostedUnit);

impl<'a> InFlight<'a> {
    fn enter(unit: &'a HostedUnit) -> Self {
        unit.in_flight.fetch_add(1, Ordering::SeqCst);
        Self(unit)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.drained.notify_waiters();
        }
    }
}

#[async_trait]
impl Component for HostedUnit {
    fn lifecycle(&self) -> &LifecycleCore {
        &self.core
    }

    fn name(&self) -> String {
        self.config.name.clone()
    }

    fn managed(&self) -> Option<&dyn Managed> {
        Some(self)
    }

    async fn on_start(&self) -> Result<(), HookError> {
        Ok(self.servlet.initialize(&self.config).await?)
    }

    async fn on_stop(&self) -> Result<(), HookError> {
        self.drain().await;
        self.servlet.teardown().await;
        Ok(())
    }
}

impl Managed for HostedUnit {
    fn binding(&self) -> &ManagementBinding {
        &self.binding
    }

    fn domain_internal(&self) -> Option<String> {
        self.service.read().upgrade().map(|service| service.domain())
    }

    fn key_properties(&self) -> String {
        match self.service.read().upgrade() {
            Some(service) => format!("type=Unit,service={},name={}", service.name(), self.config.name),
            None => format!("type=Unit,name={}", self.config.name),
        }
    }

    fn resource(&self) -> Option<Arc<dyn ManagedResource>> {
        self.self_ref
            .upgrade()
            .map(|this| this as Arc<dyn ManagedResource>)
    }
}

#[async_trait]
impl ManagedResource for HostedUnit {
    fn descriptor(&self) -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    fn read_attribute(&self, name: &str) -> Option<AttributeValue> {
        let value = match name {
            "stateName" => self.state_name().into(),
            "requestCount" => AttributeValue::Int(saturating(self.request_count())),
            "errorCount" => AttributeValue::Int(saturating(self.error_count())),
            "info" => self.servlet.describe().into(),
            "unloadDelayMs" => AttributeValue::Int(saturating(self.unload_delay().as_millis())),
            _ => return None,
        };
        Some(value)
    }

    fn write_attribute(&self, name: &str, value: AttributeValue) -> Result<(), ManagementError> {
        if name != "unloadDelayMs" {
            return Err(ManagementError::ReadOnly(name.to_string()));
        }
        let millis = expect_int(name, value)?;
        let millis = u64::try_from(millis).map_err(|_| ManagementError::InvalidValue {
            attribute: name.to_string(),
            reason: "must not be negative".to_string(),
        })?;
        self.set_unload_delay(Duration::from_millis(millis));
        Ok(())
    }

    async fn call_operation(&self, name: &str) -> Result<AttributeValue, ManagementError> {
        invoke_lifecycle(self, DESCRIPTOR.type_name, name).await
    }
}

fn saturating<T: TryInto<i64>>(value: T) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}
