//! Process orchestration.
//!
//! - [`Bootstrap`] - builds the server and runs it from `init` to `destroy`
//! - [`send_shutdown`] - asks a running server to shut down
//! - [`setup_tracing`] - initializes logging

pub mod bootstrap;
pub mod tracing;

pub use self::bootstrap::*;
pub use self::tracing::setup_tracing;
