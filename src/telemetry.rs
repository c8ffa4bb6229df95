use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// install a fmt subscriber; `RUST_LOG` wins over `default_filter`
///
/// Returns false when a global subscriber is already installed, so hosts
/// that configure their own logging are left alone.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .is_ok()
}
