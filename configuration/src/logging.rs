use tracing_subscriber::{fmt, EnvFilter};

use crate::TranscriptionConfig;

/// Installs the global fmt subscriber. `RUST_LOG` wins over `logging.level`.
pub fn setup_logging(config: &TranscriptionConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = if config.logging.json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    } else {
        fmt().with_env_filter(filter).with_target(true).try_init()
    };

    if let Err(err) = installed {
        tracing::debug!(error = %err, "logging already initialized");
    }
}
