//! Notification sources.
//!
//! A [`NotificationSource`] hands raw notifications to the processor and
//! exposes the small amount of lifecycle control the processor needs. The
//! production source is [`pg::PgChannelListener`]; tests use an in-memory
//! source.

use std::future::Future;

use crate::error::RelayResult;

pub mod lifecycle;
pub mod pg;

/// A notification as delivered by the transport, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    /// The channel the notification was delivered on.
    pub channel: String,
    /// The raw payload string.
    pub payload: String,
}

/// The transport seam between the subscription and the processor.
pub trait NotificationSource {
    /// Returns the name of the source, for logging.
    fn name() -> &'static str
    where
        Self: Sized;

    /// Receives the next notification.
    ///
    /// Returns [`None`] once the source is permanently closed and no further
    /// notifications will be delivered.
    fn recv(&mut self) -> impl Future<Output = Option<RawNotification>> + Send;

    /// Probes the liveness of the underlying session.
    ///
    /// The returned future is detached from `self` so the caller can spawn it
    /// without blocking notification consumption.
    fn ping(&self) -> impl Future<Output = RelayResult<()>> + Send + 'static;

    /// Closes the source, releasing its resources.
    fn close(&mut self) -> impl Future<Output = RelayResult<()>> + Send;
}
