//! Tracing subscriber setup

use std::sync::atomic::{AtomicBool, Ordering};

use config_rs::LogSettings;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{GatewayError, Result};

static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
/// Calling this more than once is a no-op.
pub fn init_logging(settings: &LogSettings) -> Result<()> {
    if LOGGING_INITIALIZED.load(Ordering::SeqCst) {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{},hyper=warn,reqwest=warn", settings.level)))
        .map_err(|e| GatewayError::configuration(format!("Invalid log level '{}': {}", settings.level, e)))?;

    let json_layer = settings.json.then(|| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_target(true)
    });
    let text_layer = (!settings.json).then(|| fmt::layer().with_target(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| GatewayError::configuration(format!("Failed to set global subscriber: {}", e)))?;

    LOGGING_INITIALIZED.store(true, Ordering::SeqCst);

    tracing::info!(level = %settings.level, json = settings.json, "Logging initialized");
    Ok(())
}
