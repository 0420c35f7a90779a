use std::fmt;

use crate::bail;
use crate::error::{ErrorKind, RelayResult};

/// The management-plane tables whose change events the relay processes.
pub const WATCHED_TABLES: &[&str] = &[
    "applications",
    "runtimes",
    "labels",
    "formations",
    "formation_assignments",
];

/// A logical resource of the management plane.
///
/// Handler registration keys on the resource type rather than the raw table
/// name so that table renames stay local to [`resolve_resource_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Application,
    Runtime,
    Label,
    Formation,
    FormationAssignment,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Application => "application",
            ResourceType::Runtime => "runtime",
            ResourceType::Label => "label",
            ResourceType::Formation => "formation",
            ResourceType::FormationAssignment => "formation_assignment",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Maps a table name from a notification to its [`ResourceType`].
///
/// Returns an [`ErrorKind::UnknownTable`] error for any table outside the
/// watched set, including the empty string.
pub fn resolve_resource_type(table: &str) -> RelayResult<ResourceType> {
    match table {
        "applications" => Ok(ResourceType::Application),
        "runtimes" => Ok(ResourceType::Runtime),
        "labels" => Ok(ResourceType::Label),
        "formations" => Ok(ResourceType::Formation),
        "formation_assignments" => Ok(ResourceType::FormationAssignment),
        other => bail!(
            ErrorKind::UnknownTable,
            "notification references an unknown table",
            format!("table '{other}' is not part of the watched table set")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_all_watched_tables() {
        let expected = [
            ResourceType::Application,
            ResourceType::Runtime,
            ResourceType::Label,
            ResourceType::Formation,
            ResourceType::FormationAssignment,
        ];

        for (table, resource) in WATCHED_TABLES.iter().zip(expected) {
            assert_eq!(resolve_resource_type(table).unwrap(), resource);
        }
    }

    #[test]
    fn rejects_unknown_table() {
        let err = resolve_resource_type("webhooks").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnknownTable);
        assert!(err.detail().unwrap().contains("webhooks"));
    }

    #[test]
    fn rejects_empty_table_name() {
        let err = resolve_resource_type("").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::UnknownTable);
    }
}
