use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::container::{AwaitOutcome, ContainerError, Server};
use crate::framework::{Lifecycle, LifecycleState};
use crate::management::Registry;

/// Drives one [`Server`] through its whole life.
///
/// `Bootstrap` is responsible for:
/// - **Construction**: building the server from an already parsed [`ServerConfig`]
/// - **Startup**: `init` then `start`, cleaning up with `destroy` if either fails
/// - **Shutdown**: waiting on the shutdown listener, then `stop` and `destroy`
///   so services go down in reverse start order
///
/// # Example
///
/// ```ignore
/// let bootstrap = Bootstrap::new(config, Some(registry));
/// bootstrap.server().add_service(Service::new("Main", None)).await?;
///
/// // Returns once "SHUTDOWN" arrives on the shutdown port
/// bootstrap.run().await?;
/// ```
pub struct Bootstrap {
    server: Arc<Server>,
}

impl Bootstrap {
    pub fn new(config: ServerConfig, registry: Option<Arc<dyn Registry>>) -> Self {
        Self {
            server: Server::new(config, registry),
        }
    }

    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }

    /// Runs `init → start → await → stop → destroy`.
    ///
    /// Returns how the wait ended. A startup failure is returned after the
    /// server has been destroyed.
    pub async fn run(&self) -> Result<AwaitOutcome, ContainerError> {
        info!("Starting server...");

        // =====================================================================
        // Step 1: Bring the tree up
        // =====================================================================

        let started = match self.server.init().await {
            Ok(()) => self.server.start().await,
            Err(e) => Err(e),
        };
        if let Err(e) = started {
            error!(error = %e, "Server startup failed");
            self.server.destroy().await?;
            return Err(e.into());
        }

        // =====================================================================
        // Step 2: Wait for the shutdown command
        // =====================================================================

        let outcome = self.server.await_shutdown().await;
        if let Err(e) = &outcome {
            warn!(error = %e, "Shutdown listener failed; shutting down");
        }

        // =====================================================================
        // Step 3: Take the tree down
        // =====================================================================

        info!("Shutting down server...");
        let state = self.server.state();
        let stopped = if state.is_available() || state == LifecycleState::Failed {
            self.server.stop().await
        } else {
            Ok(())
        };
        self.server.destroy().await?;
        stopped?;

        info!("Server shutdown complete.");
        outcome
    }
}

/// Sends `token` to a running server's shutdown listener.
pub async fn send_shutdown(addr: impl ToSocketAddrs, token: &str) -> std::io::Result<()> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(token.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.shutdown().await
}
