//! In-memory [`NotificationSource`] for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::mpsc;

use crate::bail;
use crate::error::{ErrorKind, RelayResult};
use crate::listener::{NotificationSource, RawNotification};

#[derive(Debug, Default)]
struct SourceState {
    pings: AtomicUsize,
    closes: AtomicUsize,
    fail_pings: AtomicBool,
}

/// An in-memory notification source fed through a [`MemorySourceHandle`].
pub struct MemorySource {
    notifications_rx: mpsc::UnboundedReceiver<RawNotification>,
    state: Arc<SourceState>,
}

/// Handle for injecting notifications and inspecting a [`MemorySource`].
#[derive(Clone)]
pub struct MemorySourceHandle {
    notifications_tx: mpsc::UnboundedSender<RawNotification>,
    state: Arc<SourceState>,
}

impl MemorySource {
    pub fn new() -> (MemorySource, MemorySourceHandle) {
        let (notifications_tx, notifications_rx) = mpsc::unbounded_channel();
        let state = Arc::new(SourceState::default());

        let source = MemorySource {
            notifications_rx,
            state: state.clone(),
        };
        let handle = MemorySourceHandle {
            notifications_tx,
            state,
        };

        (source, handle)
    }
}

impl MemorySourceHandle {
    /// Injects a raw notification into the source.
    pub fn send(&self, channel: &str, payload: &str) {
        self.notifications_tx
            .send(RawNotification {
                channel: channel.to_owned(),
                payload: payload.to_owned(),
            })
            .expect("memory source was closed");
    }

    /// Returns how many liveness probes completed against this source.
    pub fn ping_count(&self) -> usize {
        self.state.pings.load(Ordering::SeqCst)
    }

    /// Returns how many times the source was closed.
    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Makes subsequent liveness probes fail.
    pub fn fail_pings(&self, fail: bool) {
        self.state.fail_pings.store(fail, Ordering::SeqCst);
    }
}

impl NotificationSource for MemorySource {
    fn name() -> &'static str {
        "memory-source"
    }

    async fn recv(&mut self) -> Option<RawNotification> {
        self.notifications_rx.recv().await
    }

    fn ping(&self) -> impl Future<Output = RelayResult<()>> + Send + 'static {
        let state = self.state.clone();

        async move {
            state.pings.fetch_add(1, Ordering::SeqCst);

            if state.fail_pings.load(Ordering::SeqCst) {
                bail!(ErrorKind::PingFailed, "injected ping failure");
            }

            Ok(())
        }
    }

    async fn close(&mut self) -> RelayResult<()> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        self.notifications_rx.close();

        Ok(())
    }
}
