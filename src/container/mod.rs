//! Container composition: the root [`Server`], its [`Service`]s and the
//! components each service owns.
//!
//! # Data Flow
//! ```text
//! Bootstrap
//!     → Server.init/start
//!         → NamingResources (first up, last down)
//!         → Service A, B, C          (insertion order)
//!             → components           (insertion order)
//!     → Server.await_shutdown        (blocks on the shutdown listener)
//!     → Server.stop/destroy
//!         → Service C, B, A          (reverse order)
//! ```
//!
//! # Design Decisions
//! - Children may be added and removed at any time; lookups work on a
//!   snapshot and never wait on a propagation pass
//! - A child added to a running container is brought to the container's phase
//! - Removal stops a running child but does not destroy it; the removed child
//!   is handed back to the caller

pub mod children;
pub mod naming;
pub mod server;
pub mod service;
pub mod shutdown;

pub use children::Children;
pub use naming::NamingResources;
pub use server::Server;
pub use service::Service;
pub use shutdown::{AwaitOutcome, AwaitSettings, ShutdownListener};

use crate::framework::LifecycleError;

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("a child named `{0}` already exists")]
    DuplicateName(String),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("shutdown listener: {0}")]
    Io(#[from] std::io::Error),
}
