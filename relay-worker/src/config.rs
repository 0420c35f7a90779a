use relay_config::load_config;
use relay_config::shared::{ListenerConfig, PgConnectionConfig};
use serde::Deserialize;

use crate::error::WorkerResult;

/// Configuration of the worker binary.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Connection settings for the database publishing change notifications.
    pub pg_connection: PgConnectionConfig,
    /// Subscription and recovery settings.
    #[serde(default)]
    pub listener: ListenerConfig,
}

/// Loads and validates the worker configuration from the `configuration`
/// directory and environment overrides.
pub fn load_worker_config() -> WorkerResult<WorkerConfig> {
    let config: WorkerConfig = load_config()?;
    config.listener.validate()?;

    Ok(config)
}
