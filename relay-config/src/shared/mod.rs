//! Shared configuration types for the relay services.

mod connection;
mod listener;

pub use connection::{PgConnectionConfig, TcpKeepaliveConfig};
pub use listener::ListenerConfig;

use thiserror::Error;

/// Validation failure for a configuration value.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field value violates one of its constraints.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
}
