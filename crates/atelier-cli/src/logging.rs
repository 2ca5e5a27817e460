//! Development-time tracing.
//!
//! Reads `RUST_LOG`. Defaults to `warn` if unset. Output goes to stderr so that the
//! summary on stdout stays clean.
//!
//! ```bash
//! RUST_LOG=atelier_core=debug cargo run -p atelier-cli -- --iterations 20
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
