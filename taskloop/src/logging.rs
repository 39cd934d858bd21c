//! Development-time tracing for debugging the agent.
//!
//! Tracing is dev diagnostics via `RUST_LOG`, output to stderr. The
//! human-facing run narration (objective banner, generated tasks, verdict)
//! is plain stdout from the binary and is unaffected by this module.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG`. Defaults to `warn` if unset. Output: stderr, compact
/// format.
///
/// # Example
/// ```bash
/// RUST_LOG=taskloop=debug cargo run -- run -o "create a.txt with text hello"
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
