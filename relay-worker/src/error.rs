use relay::error::RelayError;
use relay_config::LoadConfigError;
use relay_config::shared::ValidationError;
use relay_telemetry::TelemetryError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Top-level error of the worker binary.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ValidationError),

    #[error("failed to initialize telemetry: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("relay failed: {0}")]
    Relay(#[from] RelayError),

    #[error("an i/o operation failed: {0}")]
    Io(#[from] std::io::Error),
}
