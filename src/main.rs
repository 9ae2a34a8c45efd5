use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use lifecycle_recipe::config::ServerConfig;
use lifecycle_recipe::container::Service;
use lifecycle_recipe::hosted::{HandlerError, HostedUnit, Request, Response, Servlet, UnitConfig};
use lifecycle_recipe::lifecycle::{send_shutdown, setup_tracing, Bootstrap};
use lifecycle_recipe::management::{InMemoryRegistry, Registry};

#[derive(Parser)]
#[command(name = "lifecycle-recipe")]
#[command(about = "Run a managed server, or stop a running one", long_about = None)]
struct Cli {
    #[arg(short, long, global = true, default_value = "localhost")]
    address: String,

    /// Shutdown port; a negative value disables the socket
    #[arg(short, long, global = true, default_value_t = 8005, allow_negative_numbers = true)]
    port: i32,

    #[arg(short, long, global = true, default_value = "SHUTDOWN")]
    shutdown: String,

    #[arg(long, global = true)]
    domain: Option<String>,

    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    home_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server and wait for the shutdown command (default)
    Start,
    /// Send the shutdown command to a running server
    Stop,
}

impl Cli {
    fn config(&self) -> Result<ServerConfig, String> {
        let port = match self.port {
            p if p < 0 => None,
            p => Some(u16::try_from(p).map_err(|_| format!("invalid port {p}"))?),
        };
        let mut config = ServerConfig {
            domain: self.domain.clone(),
            address: self.address.clone(),
            port,
            shutdown: self.shutdown.clone(),
            ..ServerConfig::default()
        };
        if let Some(dir) = &self.home_dir {
            config.home_dir = dir.clone();
            config.base_dir = dir.clone();
        }
        if let Some(dir) = &self.base_dir {
            config.base_dir = dir.clone();
        }
        Ok(config)
    }
}

/// Greets whoever is in the request body.
struct Hello;

#[async_trait]
impl Servlet for Hello {
    async fn initialize(&self, config: &UnitConfig) -> Result<(), HandlerError> {
        info!(unit = %config.name, "Hello unit ready");
        Ok(())
    }

    async fn handle(&self, request: Request) -> Result<Response, HandlerError> {
        Ok(Response::ok(format!("Hello, {}", request.body)))
    }

    fn describe(&self) -> String {
        "greeting unit".to_string()
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let cli = Cli::parse();
    let config = cli.config()?;

    match cli.command.unwrap_or(Commands::Start) {
        Commands::Stop => {
            let port = config
                .port
                .ok_or_else(|| "no shutdown port configured".to_string())?;
            send_shutdown((config.address.as_str(), port), &config.shutdown)
                .await
                .map_err(|e| format!("could not reach {}:{port}: {e}", config.address))?;
            info!("Shutdown command sent");
            Ok(())
        }
        Commands::Start => run(config).await,
    }
}

async fn run(config: ServerConfig) -> Result<(), String> {
    let registry: Arc<dyn Registry> = Arc::new(InMemoryRegistry::new());
    let bootstrap = Bootstrap::new(config, Some(registry.clone()));
    let server = bootstrap.server().clone();

    let service = Service::new("Main", Some(registry.clone()));
    service
        .add_unit(HostedUnit::new(
            UnitConfig::new("hello"),
            Arc::new(Hello),
            Some(registry.clone()),
        ))
        .await
        .map_err(|e| e.to_string())?;
    server.add_service(service).await.map_err(|e| e.to_string())?;

    // Ctrl-C releases the await the same way the shutdown command does.
    let stopper = server.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            stopper.stop_await();
        }
    });

    match bootstrap.run().await {
        Ok(outcome) => {
            info!(?outcome, registered = registry.names().len(), "Application completed successfully");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Server failed");
            Err(e.to_string())
        }
    }
}
