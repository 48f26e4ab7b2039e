//! Logging setup utilities for the Salotto chat server.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// Every crate listed in `targets` gets `default_log_level`; everything else
/// stays at the subscriber default. The filter can be overridden with the
/// `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `targets` - Crate (or binary) names to enable, e.g. `["salotto_server", "salotto_server_bin"]`
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use salotto_shared::logger::setup_logger;
///
/// setup_logger(&["salotto_server"], "info");
/// ```
pub fn setup_logger(targets: &[&str], default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directives(targets, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the `EnvFilter` directive string used when `RUST_LOG` is unset.
fn default_directives(targets: &[&str], default_log_level: &str) -> String {
    targets
        .iter()
        .map(|target| format!("{}={}", target.replace('-', "_"), default_log_level))
        .collect::<Vec<_>>()
        .join(",")
}
