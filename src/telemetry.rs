//! Tracing subscriber installation.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a formatted tracing subscriber.
///
/// `RUST_LOG` takes precedence; `default_filter` applies when it is unset or
/// unparsable. Returns `false` when a global subscriber was already
/// installed, which is not treated as an error.
#[must_use]
pub fn init_tracing(default_filter: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()
        .is_ok()
}
