//! Telemetry initialization for relay binaries.
//!
//! Installs a `tracing` subscriber with an environment-driven filter and a
//! formatted output layer. Binaries call [`init_tracing`] once before doing
//! any real work so that startup failures are already captured.

use thiserror::Error;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Default directive applied when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

/// Errors that can occur while initializing telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed.
    #[error("failed to install the global tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Initializes the global tracing subscriber for a service.
///
/// The filter is taken from `RUST_LOG` when present and falls back to
/// `info` otherwise.
pub fn init_tracing(service_name: &str) -> Result<(), TelemetryError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .try_init()?;

    info!(service = service_name, "telemetry initialized");

    Ok(())
}
