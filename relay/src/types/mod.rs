//! Wire-level types for change notifications.

pub mod notification;
pub mod resource;

pub use notification::{Action, Notification};
pub use resource::{ResourceType, resolve_resource_type};
