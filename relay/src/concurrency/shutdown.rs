//! Shutdown signaling built on a watch channel.
//!
//! A single [`ShutdownTx`] fans out to any number of [`ShutdownRx`] clones;
//! every receiver observes the signal even when it subscribes late.

use tokio::sync::watch;

/// Sending half of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<bool>);

impl ShutdownTx {
    /// Signals shutdown to all receivers.
    pub fn shutdown(&self) {
        // Send errors only when every receiver is gone, in which case there
        // is nobody left to notify.
        let _ = self.0.send(true);
    }

    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

/// Receiving half of the shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<bool>);

impl ShutdownRx {
    /// Completes once shutdown has been signaled.
    pub async fn wait_for_shutdown(&mut self) {
        // A closed channel means the sender was dropped, which we treat the
        // same as an explicit shutdown.
        let _ = self.0.wait_for(|stop| *stop).await;
    }

    /// Returns whether shutdown has already been signaled.
    pub fn is_shutdown(&self) -> bool {
        *self.0.borrow()
    }
}

/// Creates a connected shutdown channel pair.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(false);

    (ShutdownTx(tx), ShutdownRx(rx))
}
