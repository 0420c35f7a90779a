use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use tokio_postgres::error::SqlState;

/// Result type used across the relay crate.
pub type RelayResult<T> = Result<T, RelayError>;

/// The kinds of errors that can occur in the relay.
///
/// The kind is the stable classification surface: callers branch on it to
/// decide whether an error is fatal for the subscription or merely a
/// per-notification failure to log and skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Establishing a connection to the database failed.
    ConnectionFailed,
    /// An established subscription stream ended and was not recovered.
    ConnectionClosed,
    /// A liveness probe against the database session failed.
    PingFailed,
    /// A query against the database failed.
    QueryFailed,
    /// A payload could not be deserialized.
    DeserializationError,
    /// A decoded value failed validation.
    ValidationError,
    /// A notification referenced a table outside the watched set.
    UnknownTable,
    /// A notification carried an action the relay does not dispatch.
    UnknownAction,
    /// A registered handler returned an error.
    HandlerFailed,
    /// Configuration was missing or invalid.
    ConfigError,
    /// An I/O operation failed.
    IoError,
    /// An error which cannot be classified.
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let str = match self {
            ErrorKind::ConnectionFailed => "ConnectionFailed",
            ErrorKind::ConnectionClosed => "ConnectionClosed",
            ErrorKind::PingFailed => "PingFailed",
            ErrorKind::QueryFailed => "QueryFailed",
            ErrorKind::DeserializationError => "DeserializationError",
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::UnknownTable => "UnknownTable",
            ErrorKind::UnknownAction => "UnknownAction",
            ErrorKind::HandlerFailed => "HandlerFailed",
            ErrorKind::ConfigError => "ConfigError",
            ErrorKind::IoError => "IoError",
            ErrorKind::Unknown => "Unknown",
        };

        write!(f, "{str}")
    }
}

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn Error + Send + Sync>>,
    location: &'static Location<'static>,
}

/// The error type used across the relay crate.
///
/// Errors carry a [`ErrorKind`], a static description, an optional dynamic
/// detail and the source location at which they were raised. Equality
/// compares kinds only.
#[derive(Debug, Clone)]
pub struct RelayError(Box<ErrorPayload>);

impl RelayError {
    #[track_caller]
    pub fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn Error + Send + Sync>>,
    ) -> Self {
        Self(Box::new(ErrorPayload {
            kind,
            description,
            detail,
            source,
            location: Location::caller(),
        }))
    }

    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.0.kind
    }

    /// Returns the dynamic detail of this error, if any.
    pub fn detail(&self) -> Option<&str> {
        self.0.detail.as_deref()
    }

    /// Returns the source location at which this error was raised.
    pub fn location(&self) -> &'static Location<'static> {
        self.0.location
    }
}

impl PartialEq for RelayError {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
    }
}

impl Eq for RelayError {}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} @ {}:{}:{}",
            self.0.kind,
            self.0.description,
            self.0.location.file(),
            self.0.location.line(),
            self.0.location.column()
        )?;

        if let Some(detail) = &self.0.detail {
            write!(f, ": {detail}")?;
        }

        Ok(())
    }
}

impl Error for RelayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0
            .source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn Error + 'static))
    }
}

impl From<(ErrorKind, &'static str)> for RelayError {
    #[track_caller]
    fn from((kind, description): (ErrorKind, &'static str)) -> Self {
        RelayError::from_components(kind, Cow::Borrowed(description), None, None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for RelayError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, description, detail): (ErrorKind, &'static str, D)) -> Self {
        RelayError::from_components(kind, Cow::Borrowed(description), Some(detail.into()), None)
    }
}

impl From<std::io::Error> for RelayError {
    #[track_caller]
    fn from(err: std::io::Error) -> Self {
        RelayError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("an i/o operation failed"),
            Some(Cow::Owned(err.to_string())),
            Some(Arc::new(err)),
        )
    }
}

impl From<serde_json::Error> for RelayError {
    #[track_caller]
    fn from(err: serde_json::Error) -> Self {
        let kind = if err.is_io() {
            ErrorKind::IoError
        } else {
            ErrorKind::DeserializationError
        };

        RelayError::from_components(
            kind,
            Cow::Borrowed("failed to process a json payload"),
            Some(Cow::Owned(err.to_string())),
            Some(Arc::new(err)),
        )
    }
}

impl From<tokio_postgres::Error> for RelayError {
    #[track_caller]
    fn from(err: tokio_postgres::Error) -> Self {
        let kind = match err.code() {
            Some(sqlstate) => match *sqlstate {
                // Connection errors (08xxx)
                SqlState::CONNECTION_EXCEPTION
                | SqlState::CONNECTION_DOES_NOT_EXIST
                | SqlState::CONNECTION_FAILURE
                | SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
                | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION => {
                    ErrorKind::ConnectionFailed
                }

                // Authentication errors (28xxx)
                SqlState::INVALID_AUTHORIZATION_SPECIFICATION | SqlState::INVALID_PASSWORD => {
                    ErrorKind::ConnectionFailed
                }

                // Server shutdown and unavailability (57xxx)
                SqlState::ADMIN_SHUTDOWN
                | SqlState::CRASH_SHUTDOWN
                | SqlState::CANNOT_CONNECT_NOW => ErrorKind::ConnectionFailed,

                _ => ErrorKind::QueryFailed,
            },
            // Errors without a SQLSTATE come from the transport layer.
            None => ErrorKind::ConnectionFailed,
        };

        RelayError::from_components(
            kind,
            Cow::Borrowed("a database operation failed"),
            Some(Cow::Owned(err.to_string())),
            Some(Arc::new(err)),
        )
    }
}
