//! Change-notification processing for the integration platform management plane.
//!
//! The crate subscribes to a Postgres `LISTEN`/`NOTIFY` channel, decodes the
//! delivered change events, resolves the originating table to a logical
//! resource type, and dispatches each event to the business handler registered
//! for `(channel, resource type)`. Per-event failures are logged and never
//! stop the event loop; the only fatal error is a failed initial subscription.

pub mod concurrency;
pub mod error;
pub mod handlers;
pub mod listener;
mod macros;
pub mod processor;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
