//! Structured logging setup.
//!
//! Host processes may already own a global subscriber, so initialisation
//! never fails hard: a second call (or a host-installed subscriber) is
//! reported and ignored.

use tracing::level_filters::LevelFilter;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install a `tracing-subscriber` fmt subscriber. `RUST_LOG` directives take
/// precedence over `config.log_level`. Returns `false` when a global
/// subscriber was already set.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.log_level).into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json_format {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        info!(
            app = %config.app_name,
            level = %config.log_level,
            "Logging initialised ({} v{})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        );
    }
    installed
}
