//! Recording [`NotificationHandler`] for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::bail;
use crate::error::{ErrorKind, RelayResult};
use crate::handlers::NotificationHandler;

/// The change operation a handler call corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandledOp {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Default)]
struct Inner {
    calls: Vec<(HandledOp, Vec<u8>)>,
    fail: bool,
}

/// A handler that records every call it receives.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    inner: Mutex<Inner>,
}

impl RecordingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a handler that records calls but fails every one of them.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                calls: Vec::new(),
                fail: true,
            }),
        })
    }

    /// Returns the recorded calls in arrival order.
    pub fn calls(&self) -> Vec<(HandledOp, Vec<u8>)> {
        self.inner.lock().unwrap().calls.clone()
    }

    fn record(&self, op: HandledOp, data: &[u8]) -> RelayResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push((op, data.to_vec()));

        if inner.fail {
            bail!(ErrorKind::HandlerFailed, "injected handler failure");
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationHandler for RecordingHandler {
    async fn handle_create(&self, data: &[u8]) -> RelayResult<()> {
        self.record(HandledOp::Create, data)
    }

    async fn handle_update(&self, data: &[u8]) -> RelayResult<()> {
        self.record(HandledOp::Update, data)
    }

    async fn handle_delete(&self, data: &[u8]) -> RelayResult<()> {
        self.record(HandledOp::Delete, data)
    }
}
