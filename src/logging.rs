// src/logging.rs
use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogConfig, LogFormat};

static INIT: Once = Once::new();

/// Installs the global subscriber. Later calls are no-ops.
///
/// `RUST_LOG` wins over the configured filter when set.
pub fn init_tracing(config: &LogConfig) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&config.filter))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let registry = tracing_subscriber::registry().with(filter);
        let result = match config.format {
            LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
            LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
        };

        if let Err(err) = result {
            eprintln!("tracing subscriber already installed: {err}");
        }
    });
}
