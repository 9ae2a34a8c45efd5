//! Generic lifecycle framework.
//!
//! This module provides the state machine every component embeds and the
//! traits that connect concrete components to it.
//!
//! # Main Components
//!
//! - [`Component`] - Trait a concrete component implements (name, hooks)
//! - [`LifecycleCore`] - The embedded state machine
//! - [`Lifecycle`] - `init/start/stop/destroy`, available on every component
//! - [`LifecycleError`] - Transition failures and their [`ErrorKind`]
//!
//! # Testing
//!
//! See [`mock`] module for a recording registry and scripted components.

pub mod core;
pub mod error;
pub mod mock;
pub mod state;

// Re-export core types for convenience
pub use self::core::*;
pub use error::*;
pub use state::*;
