/// Initializes the tracing/logging infrastructure for the process.
///
/// Filtering comes from `RUST_LOG`:
/// - `RUST_LOG=info` - startup, shutdown and hook failures
/// - `RUST_LOG=debug` - every state change and registry call
/// - `RUST_LOG=lifecycle_recipe=debug` - debug only for this crate
///
/// Call once, before the server is built.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
