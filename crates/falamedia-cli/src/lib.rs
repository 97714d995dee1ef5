//! Shared helpers for the FalaMedia CLI binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for the CLI.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "falamedia=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
