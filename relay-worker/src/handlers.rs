//! Default handlers wired into the worker.
//!
//! The audit log handler writes every change event to the log, which is the
//! worker's out-of-the-box behavior. Deployments replace individual
//! registrations with their own [`NotificationHandler`] implementations.

use std::sync::Arc;

use async_trait::async_trait;
use relay::error::RelayResult;
use relay::handlers::{HandlerRegistry, NotificationHandler};
use relay::types::ResourceType;
use tracing::info;

/// Logs every change event for one resource type.
pub struct AuditLogHandler {
    resource: ResourceType,
}

impl AuditLogHandler {
    pub fn new(resource: ResourceType) -> Arc<Self> {
        Arc::new(Self { resource })
    }

    fn log(&self, operation: &str, data: &[u8]) {
        let entity_id = peek_entity_id(data);

        info!(
            resource = %self.resource,
            operation,
            entity_id = entity_id.as_deref().unwrap_or("unknown"),
            "change event received"
        );
    }
}

#[async_trait]
impl NotificationHandler for AuditLogHandler {
    async fn handle_create(&self, data: &[u8]) -> RelayResult<()> {
        self.log("create", data);
        Ok(())
    }

    async fn handle_update(&self, data: &[u8]) -> RelayResult<()> {
        self.log("update", data);
        Ok(())
    }

    async fn handle_delete(&self, data: &[u8]) -> RelayResult<()> {
        self.log("delete", data);
        Ok(())
    }
}

/// Extracts the `id` field from a data document, when present.
fn peek_entity_id(data: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(data).ok()?;

    value.get("id")?.as_str().map(str::to_owned)
}

/// Builds the default registry with an audit log handler per watched
/// resource type.
pub fn default_registry(channel: &str) -> HandlerRegistry {
    let resources = [
        ResourceType::Application,
        ResourceType::Runtime,
        ResourceType::Label,
        ResourceType::Formation,
        ResourceType::FormationAssignment,
    ];

    let mut builder = HandlerRegistry::builder();
    for resource in resources {
        builder = builder.register(channel, resource, AuditLogHandler::new(resource));
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_covers_all_resource_types() {
        let registry = default_registry("events");

        assert_eq!(registry.len(), 5);
        assert!(registry.lookup("events", ResourceType::Application).is_some());
        assert!(
            registry
                .lookup("events", ResourceType::FormationAssignment)
                .is_some()
        );
        assert!(registry.lookup("other", ResourceType::Application).is_none());
    }

    #[tokio::test]
    async fn audit_handler_accepts_all_operations() {
        let handler = AuditLogHandler::new(ResourceType::Runtime);

        handler.handle_create(br#"{"id":"r-1"}"#).await.unwrap();
        handler.handle_update(br#"{"id":"r-1"}"#).await.unwrap();
        handler.handle_delete(b"not json").await.unwrap();
    }

    #[test]
    fn peek_entity_id_handles_malformed_data() {
        assert_eq!(peek_entity_id(br#"{"id":"app-1"}"#).as_deref(), Some("app-1"));
        assert_eq!(peek_entity_id(br#"{"name":"crm"}"#), None);
        assert_eq!(peek_entity_id(b"garbage"), None);
    }
}
