use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;

use crate::bail;
use crate::error::{ErrorKind, RelayResult};

/// The change operation carried by a notification.
///
/// The database trigger emits `INSERT`, `UPDATE` and `DELETE`. Anything else
/// decodes into [`Action::Other`] so that a misconfigured trigger surfaces as
/// an explicit dispatch error instead of a decode failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Insert,
    Update,
    Delete,
    Other(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Insert => "INSERT",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
            Action::Other(other) => other,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;

        Ok(match raw.as_str() {
            "INSERT" => Action::Insert,
            "UPDATE" => Action::Update,
            "DELETE" => Action::Delete,
            _ => Action::Other(raw),
        })
    }
}

/// A decoded change notification.
///
/// The `Data` document is kept as raw JSON and forwarded to handlers byte for
/// byte, since its shape differs per table and is owned by the handlers.
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    #[serde(rename = "Table")]
    pub table: String,
    #[serde(rename = "Action")]
    pub action: Action,
    #[serde(rename = "Data", default)]
    pub data: Option<Box<RawValue>>,
}

impl Notification {
    /// Decodes a notification from the raw `NOTIFY` payload.
    pub fn decode(payload: &str) -> RelayResult<Notification> {
        let notification = serde_json::from_str(payload)?;

        Ok(notification)
    }

    /// Validates the structural invariants of a decoded notification.
    ///
    /// A notification must name a table and an action and must carry a
    /// non-null data document.
    pub fn validate(&self) -> RelayResult<()> {
        if self.table.is_empty() {
            bail!(
                ErrorKind::ValidationError,
                "notification is missing a table name"
            );
        }

        if self.action.as_str().is_empty() {
            bail!(
                ErrorKind::ValidationError,
                "notification is missing an action"
            );
        }

        match &self.data {
            Some(raw) if !is_empty_payload(raw) => Ok(()),
            _ => bail!(
                ErrorKind::ValidationError,
                "notification carries an empty data payload"
            ),
        }
    }

    /// Returns the raw bytes of the data document.
    pub fn data_bytes(&self) -> &[u8] {
        self.data
            .as_ref()
            .map(|raw| raw.get().as_bytes())
            .unwrap_or_default()
    }
}

fn is_empty_payload(raw: &RawValue) -> bool {
    let trimmed = raw.get().trim();
    trimmed.is_empty() || trimmed == "null"
}

/// Re-renders a raw payload as pretty-printed JSON for debug logging.
pub fn pretty_format(payload: &str) -> RelayResult<String> {
    let value: serde_json::Value = serde_json::from_str(payload)?;
    let pretty = serde_json::to_string_pretty(&value)?;

    Ok(pretty)
}
