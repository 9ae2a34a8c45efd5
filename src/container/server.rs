//! The root container.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::info;

use crate::config::ServerConfig;
use crate::container::children::{self, collect, into_hook_result, Children};
use crate::container::{
    AwaitOutcome, AwaitSettings, ContainerError, NamingResources, Service, ShutdownListener,
};
use crate::framework::{Component, HookError, Lifecycle, LifecycleCore, Phase};
use crate::management::{
    expect_int, expect_str, invoke_lifecycle, AttributeInfo, AttributeValue, Managed,
    ManagedResource, ManagementBinding, ManagementError, OperationInfo, Registry,
    ResourceDescriptor, DESTROY, START, STATE_NAME, STOP,
};

static ATTRIBUTES: [AttributeInfo; 7] = [
    STATE_NAME,
    AttributeInfo {
        name: "address",
        description: "Address the shutdown listener binds to",
        writable: false,
    },
    AttributeInfo {
        name: "port",
        description: "Shutdown listener port, -1 when disabled",
        writable: true,
    },
    AttributeInfo {
        name: "shutdown",
        description: "Shutdown token",
        writable: true,
    },
    AttributeInfo {
        name: "serviceNames",
        description: "Names of the owned services, in start order",
        writable: false,
    },
    AttributeInfo {
        name: "baseDir",
        description: "Instance directory",
        writable: false,
    },
    AttributeInfo {
        name: "homeDir",
        description: "Installation directory",
        writable: false,
    },
];

static DESCRIPTOR: ResourceDescriptor = ResourceDescriptor {
    type_name: "Server",
    attributes: &ATTRIBUTES,
    operations: &[
        START,
        STOP,
        DESTROY,
        OperationInfo {
            name: "stopAwait",
            description: "Release a blocked await without a shutdown token",
        },
    ],
};

/// The top of the component tree: owns the services, the global naming
/// resources and the shutdown listener.
///
/// `init`/`start` reach the naming resources first and then each service in
/// insertion order. `stop`/`destroy` run the other way round, and `stop`
/// also releases a blocked [`Server::await_shutdown`].
pub struct Server {
    core: LifecycleCore,
    binding: ManagementBinding,
    self_ref: Weak<Server>,
    config: RwLock<ServerConfig>,
    naming: Arc<NamingResources>,
    services: Children<Service>,
    shutdown: ShutdownListener,
}

impl Server {
    pub fn new(config: ServerConfig, registry: Option<Arc<dyn Registry>>) -> Arc<Self> {
        let naming = NamingResources::new(registry.clone());
        let binding = registry
            .map(ManagementBinding::new)
            .unwrap_or_else(ManagementBinding::detached);
        if let Some(domain) = &config.domain {
            binding.set_domain(domain.clone());
        }

        let server = Arc::new_cyclic(|self_ref| Self {
            core: LifecycleCore::new(),
            binding,
            self_ref: self_ref.clone(),
            config: RwLock::new(config),
            naming,
            services: Children::new("service"),
            shutdown: ShutdownListener::new(),
        });
        server.naming.set_server(Arc::downgrade(&server));
        server
    }

    // --- Properties ---

    pub fn config(&self) -> ServerConfig {
        self.config.read().clone()
    }

    pub fn port(&self) -> Option<u16> {
        self.config.read().port
    }

    /// Takes effect on the next [`await_shutdown`](Self::await_shutdown).
    pub fn set_port(&self, port: Option<u16>) {
        self.config.write().port = port;
    }

    pub fn address(&self) -> String {
        self.config.read().address.clone()
    }

    pub fn set_address(&self, address: impl Into<String>) {
        self.config.write().address = address.into();
    }

    pub fn shutdown(&self) -> String {
        self.config.read().shutdown.clone()
    }

    pub fn set_shutdown(&self, token: impl Into<String>) {
        self.config.write().shutdown = token.into();
    }

    pub fn base_dir(&self) -> PathBuf {
        self.config.read().base_dir.clone()
    }

    pub fn set_base_dir(&self, dir: impl Into<PathBuf>) {
        self.config.write().base_dir = dir.into();
    }

    pub fn home_dir(&self) -> PathBuf {
        self.config.read().home_dir.clone()
    }

    pub fn set_home_dir(&self, dir: impl Into<PathBuf>) {
        self.config.write().home_dir = dir.into();
    }

    pub fn global_naming_resources(&self) -> Arc<NamingResources> {
        self.naming.clone()
    }

    pub fn registry(&self) -> Option<Arc<dyn Registry>> {
        self.binding.registry()
    }

    // --- Services ---

    /// Adds a service and brings it to the server's current phase.
    ///
    /// A duplicate name fails with [`ContainerError::DuplicateName`] and the
    /// existing service stays. If catching up fails the service stays added
    /// and the lifecycle error is returned.
    pub async fn add_service(&self, service: Arc<Service>) -> Result<(), ContainerError> {
        self.services.insert(service.clone())?;
        service.set_server(self.self_ref.clone());
        children::catch_up(service.as_ref(), self.state()).await?;
        Ok(())
    }

    pub fn find_service(&self, name: &str) -> Option<Arc<Service>> {
        self.services.find(name)
    }

    pub fn find_services(&self) -> Vec<Arc<Service>> {
        self.services.snapshot()
    }

    /// Detaches `service` if it is the one registered under its name,
    /// stopping it when it is running. The service is not destroyed.
    pub async fn remove_service(&self, service: &Arc<Service>) -> Option<Arc<Service>> {
        let removed = self.services.remove(service)?;
        children::stop_detached(removed.as_ref()).await;
        removed.set_server(Weak::new());
        Some(removed)
    }

    pub async fn remove_service_named(&self, name: &str) -> Option<Arc<Service>> {
        let service = self.services.find(name)?;
        self.remove_service(&service).await
    }

    // --- Shutdown ---

    /// Binds the shutdown socket now instead of on the first
    /// [`await_shutdown`](Self::await_shutdown). Returns `None` when no port
    /// is configured.
    pub async fn bind_shutdown_listener(&self) -> Result<Option<SocketAddr>, ContainerError> {
        let (address, port) = {
            let config = self.config.read();
            (config.address.clone(), config.port)
        };
        match port {
            Some(port) => Ok(Some(self.shutdown.bind(&address, port).await?)),
            None => Ok(None),
        }
    }

    /// Blocks until the shutdown token arrives or [`stop_await`](Self::stop_await)
    /// is called. Stopping and destroying the server is left to the caller.
    pub async fn await_shutdown(&self) -> Result<AwaitOutcome, ContainerError> {
        let settings = {
            let config = self.config.read();
            AwaitSettings {
                address: config.address.clone(),
                port: config.port,
                token: config.shutdown.clone(),
                read_timeout: config.shutdown_read_timeout(),
                line_limit: config.shutdown_line_limit(),
            }
        };
        info!(address = %settings.address, port = ?settings.port, "Awaiting shutdown command");
        Ok(self.shutdown.wait(&settings).await?)
    }

    /// Releases a blocked [`await_shutdown`](Self::await_shutdown).
    pub fn stop_await(&self) {
        self.shutdown.stop();
    }
}

#[async_trait]
impl Component for Server {
    fn lifecycle(&self) -> &LifecycleCore {
        &self.core
    }

    fn name(&self) -> String {
        "Server".to_string()
    }

    fn managed(&self) -> Option<&dyn Managed> {
        Some(self)
    }

    async fn on_init(&self) -> Result<(), HookError> {
        let mut failures = Vec::new();
        collect(&mut failures, self.naming.init().await);
        collect(&mut failures, self.services.propagate(Phase::Init).await);
        into_hook_result(Phase::Init, failures)
    }

    async fn on_start(&self) -> Result<(), HookError> {
        self.shutdown.rearm();
        let mut failures = Vec::new();
        collect(&mut failures, self.naming.start().await);
        collect(&mut failures, self.services.propagate(Phase::Start).await);
        info!(services = self.services.len(), "Server started");
        into_hook_result(Phase::Start, failures)
    }

    async fn on_stop(&self) -> Result<(), HookError> {
        let mut failures = Vec::new();
        collect(&mut failures, self.services.propagate(Phase::Stop).await);
        if children::stoppable(self.naming.state()) {
            collect(&mut failures, self.naming.stop().await);
        }
        self.stop_await();
        into_hook_result(Phase::Stop, failures)
    }

    async fn on_destroy(&self) -> Result<(), HookError> {
        let mut failures = Vec::new();
        collect(&mut failures, self.services.propagate(Phase::Destroy).await);
        collect(&mut failures, self.naming.destroy().await);
        into_hook_result(Phase::Destroy, failures)
    }
}

impl Managed for Server {
    fn binding(&self) -> &ManagementBinding {
        &self.binding
    }

    fn key_properties(&self) -> String {
        "type=Server".to_string()
    }

    fn resource(&self) -> Option<Arc<dyn ManagedResource>> {
        self.self_ref
            .upgrade()
            .map(|this| this as Arc<dyn ManagedResource>)
    }
}

#[async_trait]
impl ManagedResource for Server {
    fn descriptor(&self) -> &'static ResourceDescriptor {
        &DESCRIPTOR
    }

    fn read_attribute(&self, name: &str) -> Option<AttributeValue> {
        let value = match name {
            "stateName" => self.state_name().into(),
            "address" => self.address().into(),
            "port" => AttributeValue::Int(self.port().map_or(-1, i64::from)),
            "shutdown" => self.shutdown().into(),
            "serviceNames" => self.services.names().into(),
            "baseDir" => self.base_dir().display().to_string().into(),
            "homeDir" => self.home_dir().display().to_string().into(),
            _ => return None,
        };
        Some(value)
    }

    fn write_attribute(&self, name: &str, value: AttributeValue) -> Result<(), ManagementError> {
        match name {
            "port" => {
                let port = match expect_int(name, value)? {
                    -1 => None,
                    raw => Some(u16::try_from(raw).map_err(|_| ManagementError::InvalidValue {
                        attribute: name.to_string(),
                        reason: format!("{raw} is not a port number or -1"),
                    })?),
                };
                self.set_port(port);
            }
            "shutdown" => self.set_shutdown(expect_str(name, value)?),
            _ => return Err(ManagementError::ReadOnly(name.to_string())),
        }
        Ok(())
    }

    async fn call_operation(&self, name: &str) -> Result<AttributeValue, ManagementError> {
        match name {
            "stopAwait" => {
                self.stop_await();
                Ok(AttributeValue::Unit)
            }
            other => invoke_lifecycle(self, DESCRIPTOR.type_name, other).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::{CallLog, MockComponent, RecordingRegistry};
    use crate::framework::LifecycleState;
    use crate::management::ObjectName;

    fn config() -> ServerConfig {
        ServerConfig {
            address: "127.0.0.1".into(),
            port: None,
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn naming_resources_bracket_services() {
        let server = Server::new(config(), None);
        let service = Service::new("Main", None);
        let log = CallLog::new();
        service
            .add_component(MockComponent::new("A", None, log.clone()))
            .await
            .unwrap();
        server.add_service(service.clone()).await.unwrap();

        let naming = server.global_naming_resources();
        server.init().await.unwrap();
        server.start().await.unwrap();
        assert_eq!(naming.state(), LifecycleState::Started);
        assert_eq!(service.state(), LifecycleState::Started);

        server.stop().await.unwrap();
        assert_eq!(naming.state(), LifecycleState::Stopped);
        assert_eq!(service.state(), LifecycleState::Stopped);

        server.destroy().await.unwrap();
        assert_eq!(naming.state(), LifecycleState::Destroyed);
        assert_eq!(log.phase(Phase::Destroy), vec!["A:destroy"]);
    }

    #[tokio::test]
    async fn stop_releases_await() {
        let server = Server::new(config(), None);
        server.init().await.unwrap();
        server.start().await.unwrap();

        let waiter = {
            let server = server.clone();
            tokio::spawn(async move { server.await_shutdown().await })
        };
        server.stop().await.unwrap();
        assert_eq!(waiter.await.unwrap().unwrap(), AwaitOutcome::Stopped);
    }

    #[tokio::test]
    async fn children_register_under_server_domain() {
        let registry = RecordingRegistry::new();
        let shared: Arc<dyn Registry> = registry.clone();
        let server = Server::new(
            ServerConfig {
                domain: Some("Catalina".into()),
                ..config()
            },
            Some(shared.clone()),
        );
        server
            .add_service(Service::new("Main", Some(shared.clone())))
            .await
            .unwrap();

        server.init().await.unwrap();

        let names: Vec<String> = shared.names().iter().map(ToString::to_string).collect();
        assert_eq!(
            names,
            vec![
                "Catalina:type=Server",
                "Catalina:type=NamingResources",
                "Catalina:type=Service,name=Main",
            ]
        );

        server.destroy().await.unwrap();
        assert!(shared.names().is_empty());
        assert_eq!(registry.unregister_count(), 3);
    }

    #[tokio::test]
    async fn port_attribute() {
        let registry: Arc<dyn Registry> = RecordingRegistry::new();
        let server = Server::new(config(), Some(registry.clone()));
        server.init().await.unwrap();
        let name: ObjectName = "Lifecycle:type=Server".parse().unwrap();

        assert_eq!(
            registry.get_attribute(&name, "port").unwrap(),
            AttributeValue::Int(-1)
        );
        registry
            .set_attribute(&name, "port", AttributeValue::Int(8015))
            .unwrap();
        assert_eq!(server.port(), Some(8015));

        let err = registry
            .set_attribute(&name, "port", AttributeValue::Int(70_000))
            .unwrap_err();
        assert!(matches!(err, ManagementError::InvalidValue { .. }));
        let err = registry
            .set_attribute(&name, "address", "0.0.0.0".into())
            .unwrap_err();
        assert!(matches!(err, ManagementError::ReadOnly(_)));
    }
}
