//! Connection lifecycle events.
//!
//! The listener reports transitions of its database session on an unbounded
//! channel. The default consumer is a logging task, keeping observability out
//! of the connection management code itself.

use std::fmt;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A transition of the subscription's database session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The initial session was established and `LISTEN` is active.
    Connected,
    /// A lost session was re-established and `LISTEN` is active again.
    Reconnected,
    /// An established session was lost.
    Disconnected,
    /// A reconnection attempt failed.
    ConnectionAttemptFailed,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Connected => "connected",
            LifecycleEvent::Reconnected => "reconnected",
            LifecycleEvent::Disconnected => "disconnected",
            LifecycleEvent::ConnectionAttemptFailed => "connection attempt failed",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub type LifecycleTx = mpsc::UnboundedSender<LifecycleEvent>;
pub type LifecycleRx = mpsc::UnboundedReceiver<LifecycleEvent>;

/// Creates a connected lifecycle channel pair.
pub fn create_lifecycle_channel() -> (LifecycleTx, LifecycleRx) {
    mpsc::unbounded_channel()
}

/// Spawns a task that logs lifecycle events for a channel subscription.
///
/// The task exits once all senders are dropped.
pub fn spawn_lifecycle_logger(channel: String, mut rx: LifecycleRx) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                LifecycleEvent::Connected | LifecycleEvent::Reconnected => {
                    info!(channel = %channel, event = %event, "subscription lifecycle event");
                }
                LifecycleEvent::Disconnected | LifecycleEvent::ConnectionAttemptFailed => {
                    warn!(channel = %channel, event = %event, "subscription lifecycle event");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_render_as_lowercase_labels() {
        assert_eq!(LifecycleEvent::Connected.as_str(), "connected");
        assert_eq!(LifecycleEvent::Reconnected.as_str(), "reconnected");
        assert_eq!(LifecycleEvent::Disconnected.as_str(), "disconnected");
        assert_eq!(
            LifecycleEvent::ConnectionAttemptFailed.as_str(),
            "connection attempt failed"
        );
    }

    #[tokio::test]
    async fn logger_drains_events_and_exits() {
        let (tx, rx) = create_lifecycle_channel();
        let logger = spawn_lifecycle_logger("events".to_owned(), rx);

        tx.send(LifecycleEvent::Connected).unwrap();
        tx.send(LifecycleEvent::Disconnected).unwrap();
        tx.send(LifecycleEvent::Reconnected).unwrap();
        drop(tx);

        logger.await.unwrap();
    }
}
