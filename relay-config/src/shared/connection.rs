use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio_postgres::Config as PgConfig;

/// Application name reported by the listener session for diagnostics.
const APP_NAME_LISTENER: &str = "relay_listener";

/// Connection settings for the Postgres database that publishes change
/// notifications.
#[derive(Debug, Clone, Deserialize)]
pub struct PgConnectionConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub password: Option<SecretString>,
    /// TCP keepalive configuration for connection health monitoring.
    /// When `None`, TCP keepalives are disabled.
    #[serde(default)]
    pub keepalive: Option<TcpKeepaliveConfig>,
}

impl PgConnectionConfig {
    /// Builds the tokio-postgres connection options for the configured database.
    pub fn with_db(&self) -> PgConfig {
        let mut config = PgConfig::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.username)
            .dbname(&self.name)
            .application_name(APP_NAME_LISTENER);

        if let Some(password) = &self.password {
            config.password(password.expose_secret());
        }

        if let Some(keepalive) = &self.keepalive {
            config
                .keepalives(true)
                .keepalives_idle(Duration::from_secs(keepalive.idle_secs))
                .keepalives_interval(Duration::from_secs(keepalive.interval_secs))
                .keepalives_retries(keepalive.retries);
        }

        config
    }
}

/// TCP keepalive parameters for the database session.
#[derive(Debug, Clone, Deserialize)]
pub struct TcpKeepaliveConfig {
    pub idle_secs: u64,
    pub interval_secs: u64,
    pub retries: u32,
}

impl Default for TcpKeepaliveConfig {
    fn default() -> Self {
        Self {
            idle_secs: 30,
            interval_secs: 30,
            retries: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PgConnectionConfig {
        PgConnectionConfig {
            host: "localhost".to_string(),
            port: 5432,
            name: "platform".to_string(),
            username: "postgres".to_string(),
            password: None,
            keepalive: None,
        }
    }

    #[test]
    fn with_db_carries_database_and_user() {
        let pg_config = config().with_db();
        assert_eq!(pg_config.get_dbname(), Some("platform"));
        assert_eq!(pg_config.get_user(), Some("postgres"));
        assert_eq!(pg_config.get_application_name(), Some(APP_NAME_LISTENER));
    }
}
