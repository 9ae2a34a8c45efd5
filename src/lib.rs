//! # Lifecycle Recipe
//!
//! > **A Recipe for managed component lifecycles in Rust.**
//!
//! This crate gives every subsystem of a long-running server the same enforced
//! sequence of `init → start → stop → destroy`, lets subsystems nest inside
//! each other, and keeps each live component visible in a management registry
//! for exactly as long as it is alive.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Hooks, not overrides
//!
//! A component only says *what* it does at each step ([`Component`](framework::Component)
//! hooks). *When* the steps run, what states are legal, who gets told, and
//! when the registry entry appears is decided once, in
//! [`LifecycleCore`](framework::LifecycleCore). A concrete component cannot get
//! the order wrong because it never drives it.
//!
//! ### Registration follows the lifecycle
//!
//! Registration happens inside `init` and unregistration is the last step of
//! `destroy`. A registry that is missing or refuses a name costs
//! observability, never startup.
//!
//! ## 👩‍💻 Architecture Notes
//!
//! ### 1. Type-Safe Error Handling
//! [`LifecycleError`](framework::LifecycleError) separates illegal calls
//! (`InvalidTransition`) from failing hooks (`HookFailure`). Containers
//! attempt every child and report all failures together as `Aggregate`.
//!
//! ### 2. Concurrency Model
//! Transitions on one component are serialized by an async mutex held for the
//! whole transition. Different components transition independently. Child
//! lookups never wait on a propagation pass in progress.
//!
//! ### 3. Observability
//! We use `tracing` everywhere with structured fields. Every state change is
//! logged at `debug`. See [`lifecycle::setup_tracing`].
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Engine ([`framework`])
//! - **Role**: the state machine, the hook trait and the listener events.
//! - **Key items**: [`Component`](framework::Component),
//!   [`Lifecycle`](framework::Lifecycle), [`LifecycleState`](framework::LifecycleState).
//!
//! ### 2. The Registry Adapter ([`management`])
//! - **Role**: structured names, the injected [`Registry`](management::Registry)
//!   and the per-component [`ManagementBinding`](management::ManagementBinding).
//!
//! ### 3. The Containers ([`container`])
//! - **Role**: [`Server`](container::Server) owns services and the shutdown
//!   listener; [`Service`](container::Service) owns components.
//!
//! ### 4. The Hosted Units ([`hosted`])
//! - **Role**: the lifecycle envelope around request-handling code.
//!
//! ### 5. The Orchestrator ([`lifecycle`])
//! - **Role**: [`Bootstrap`](lifecycle::Bootstrap) runs a server from start
//!   to shutdown.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Run with info logs, shutdown port 8005
//! RUST_LOG=info cargo run
//!
//! # From another terminal
//! cargo run -- stop
//! ```

pub mod config;
pub mod container;
pub mod framework;
pub mod hosted;
pub mod lifecycle;
pub mod management;
