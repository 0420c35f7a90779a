//! Handler traits and the handler registry.
//!
//! Business logic plugs into the relay by implementing [`NotificationHandler`]
//! and registering it for a `(channel, resource type)` pair. The registry is
//! built once at startup and stays immutable for the lifetime of the
//! processor.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::RelayResult;
use crate::types::ResourceType;

/// A consumer of change events for a single resource type.
///
/// One method per change operation; the payload is the raw `Data` document of
/// the notification, byte for byte as the database produced it.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle_create(&self, data: &[u8]) -> RelayResult<()>;

    async fn handle_update(&self, data: &[u8]) -> RelayResult<()>;

    async fn handle_delete(&self, data: &[u8]) -> RelayResult<()>;
}

/// The lookup key of the handler registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    channel: String,
    resource: ResourceType,
}

impl HandlerKey {
    pub fn new(channel: impl Into<String>, resource: ResourceType) -> Self {
        Self {
            channel: channel.into(),
            resource,
        }
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel, self.resource)
    }
}

/// An immutable mapping from `(channel, resource type)` to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<HandlerKey, Arc<dyn NotificationHandler>>,
}

impl HandlerRegistry {
    pub fn builder() -> HandlerRegistryBuilder {
        HandlerRegistryBuilder::default()
    }

    /// Returns the handler registered for the given channel and resource, if
    /// any.
    pub fn lookup(
        &self,
        channel: &str,
        resource: ResourceType,
    ) -> Option<Arc<dyn NotificationHandler>> {
        self.handlers
            .get(&HandlerKey::new(channel, resource))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("keys", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder for [`HandlerRegistry`].
///
/// Registering a second handler for the same key replaces the first.
#[derive(Default)]
pub struct HandlerRegistryBuilder {
    handlers: HashMap<HandlerKey, Arc<dyn NotificationHandler>>,
}

impl HandlerRegistryBuilder {
    pub fn register(
        mut self,
        channel: impl Into<String>,
        resource: ResourceType,
        handler: Arc<dyn NotificationHandler>,
    ) -> Self {
        self.handlers.insert(HandlerKey::new(channel, resource), handler);
        self
    }

    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}
