//! The notification processing loop.
//!
//! [`NotificationProcessor`] consumes raw notifications from a
//! [`NotificationSource`], runs each through the decode, validate, resolve
//! and dispatch pipeline, and keeps going on any per-notification failure.
//! A quiet subscription is probed with a detached liveness ping after the
//! configured idle timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::bail;
use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, RelayResult};
use crate::handlers::HandlerRegistry;
use crate::listener::{NotificationSource, RawNotification};
use crate::types::notification::pretty_format;
use crate::types::{Action, Notification, resolve_resource_type};

/// Processes change notifications from a source until shutdown.
pub struct NotificationProcessor<S> {
    registry: Arc<HandlerRegistry>,
    source: S,
    idle_timeout: Duration,
    shutdown_rx: ShutdownRx,
}

impl<S> NotificationProcessor<S>
where
    S: NotificationSource,
{
    pub fn new(
        registry: Arc<HandlerRegistry>,
        source: S,
        idle_timeout: Duration,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            registry,
            source,
            idle_timeout,
            shutdown_rx,
        }
    }

    /// Runs the processing loop.
    ///
    /// Returns [`Ok`] on orderly shutdown. Returns an error only when the
    /// source closes without shutdown having been requested, since per
    /// notification failures are logged and skipped.
    pub async fn run(mut self) -> RelayResult<()> {
        info!(
            source = S::name(),
            handlers = self.registry.len(),
            "notification processor started"
        );

        loop {
            tokio::select! {
                biased;

                // PRIORITY 1: shutdown requests.
                _ = self.shutdown_rx.wait_for_shutdown() => {
                    info!("shutting down notification processor");

                    if let Err(err) = self.source.close().await {
                        error!(error = %err, "failed to close notification subscription");
                    }

                    return Ok(());
                }

                // PRIORITY 2: incoming notifications.
                raw = self.source.recv() => {
                    match raw {
                        Some(raw) => {
                            if let Err(err) = self.process(&raw).await {
                                error!(
                                    channel = %raw.channel,
                                    error = %err,
                                    "error during notification handling"
                                );
                            }
                        }
                        None => {
                            warn!("notification source closed without shutdown");
                            bail!(
                                ErrorKind::ConnectionClosed,
                                "notification stream ended unexpectedly"
                            );
                        }
                    }
                }

                // PRIORITY 3: idle timeout, probe the subscription.
                _ = sleep(self.idle_timeout) => {
                    self.spawn_ping();
                }
            }
        }
    }

    /// Runs one notification through the processing pipeline.
    async fn process(&self, raw: &RawNotification) -> RelayResult<()> {
        if tracing::enabled!(tracing::Level::DEBUG) {
            match pretty_format(&raw.payload) {
                Ok(pretty) => debug!(channel = %raw.channel, payload = %pretty, "received notification"),
                Err(_) => debug!(channel = %raw.channel, "received notification with non-json payload"),
            }
        }

        let notification = Notification::decode(&raw.payload)?;
        notification.validate()?;

        let resource = resolve_resource_type(&notification.table)?;

        let Some(handler) = self.registry.lookup(&raw.channel, resource) else {
            debug!(
                channel = %raw.channel,
                resource = %resource,
                "no handler registered for notification, discarding"
            );
            return Ok(());
        };

        let data = notification.data_bytes();
        match &notification.action {
            Action::Insert => handler.handle_create(data).await?,
            Action::Update => handler.handle_update(data).await?,
            Action::Delete => handler.handle_delete(data).await?,
            Action::Other(other) => bail!(
                ErrorKind::UnknownAction,
                "unrecognized notification action",
                format!(
                    "action '{other}' for table '{}' was not dispatched",
                    notification.table
                )
            ),
        }

        debug!(
            channel = %raw.channel,
            resource = %resource,
            action = %notification.action,
            "notification dispatched"
        );

        Ok(())
    }

    /// Spawns a detached liveness probe so a slow ping never delays
    /// notification consumption.
    fn spawn_ping(&self) {
        debug!(source = S::name(), "idle timeout elapsed, probing subscription");

        let ping = self.source.ping();
        tokio::spawn(async move {
            match ping.await {
                Ok(()) => debug!("subscription liveness probe succeeded"),
                Err(err) => warn!(error = %err, "subscription liveness probe failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::concurrency::shutdown::create_shutdown_channel;
    use crate::error::ErrorKind;
    use crate::handlers::HandlerRegistry;
    use crate::test_utils::handler::{HandledOp, RecordingHandler};
    use crate::test_utils::source::{MemorySource, MemorySourceHandle};
    use crate::types::ResourceType;

    const TEST_CHANNEL: &str = "events";

    fn registry_with(
        entries: Vec<(ResourceType, Arc<RecordingHandler>)>,
    ) -> Arc<HandlerRegistry> {
        let mut builder = HandlerRegistry::builder();
        for (resource, handler) in entries {
            builder = builder.register(TEST_CHANNEL, resource, handler);
        }

        Arc::new(builder.build())
    }

    struct Running {
        handle: MemorySourceHandle,
        shutdown_tx: crate::concurrency::shutdown::ShutdownTx,
        task: tokio::task::JoinHandle<RelayResult<()>>,
    }

    fn start_processor(registry: Arc<HandlerRegistry>, idle_timeout: Duration) -> Running {
        let (source, handle) = MemorySource::new();
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let processor = NotificationProcessor::new(registry, source, idle_timeout, shutdown_rx);
        let task = tokio::spawn(processor.run());

        Running {
            handle,
            shutdown_tx,
            task,
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn dispatches_insert_to_matching_handler() {
        let apps = RecordingHandler::new();
        let runtimes = RecordingHandler::new();
        let running = start_processor(
            registry_with(vec![
                (ResourceType::Application, apps.clone()),
                (ResourceType::Runtime, runtimes.clone()),
            ]),
            Duration::from_secs(90),
        );

        running.handle.send(
            TEST_CHANNEL,
            r#"{"Table":"applications","Action":"INSERT","Data":{"id":"app-1"}}"#,
        );

        wait_until(|| !apps.calls().is_empty()).await;

        let calls = apps.calls();
        assert_eq!(calls, vec![(HandledOp::Create, br#"{"id":"app-1"}"#.to_vec())]);
        assert!(runtimes.calls().is_empty());

        running.shutdown_tx.shutdown();
        running.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn dispatches_update_and_delete_in_order() {
        let labels = RecordingHandler::new();
        let running = start_processor(
            registry_with(vec![(ResourceType::Label, labels.clone())]),
            Duration::from_secs(90),
        );

        running.handle.send(
            TEST_CHANNEL,
            r#"{"Table":"labels","Action":"UPDATE","Data":{"id":"l-1"}}"#,
        );
        running.handle.send(
            TEST_CHANNEL,
            r#"{"Table":"labels","Action":"DELETE","Data":{"id":"l-1"}}"#,
        );

        wait_until(|| labels.calls().len() == 2).await;

        let ops: Vec<_> = labels.calls().into_iter().map(|(op, _)| op).collect();
        assert_eq!(ops, vec![HandledOp::Update, HandledOp::Delete]);

        running.shutdown_tx.shutdown();
        running.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn missing_handler_discards_without_stopping() {
        let runtimes = RecordingHandler::new();
        let running = start_processor(
            registry_with(vec![(ResourceType::Runtime, runtimes.clone())]),
            Duration::from_secs(90),
        );

        // No handler for applications on this channel.
        running.handle.send(
            TEST_CHANNEL,
            r#"{"Table":"applications","Action":"INSERT","Data":{"id":"app-1"}}"#,
        );
        running.handle.send(
            TEST_CHANNEL,
            r#"{"Table":"runtimes","Action":"INSERT","Data":{"id":"r-1"}}"#,
        );

        wait_until(|| !runtimes.calls().is_empty()).await;
        assert_eq!(runtimes.calls().len(), 1);

        running.shutdown_tx.shutdown();
        running.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn handler_failure_does_not_stop_the_loop() {
        let formations = RecordingHandler::failing();
        let running = start_processor(
            registry_with(vec![(ResourceType::Formation, formations.clone())]),
            Duration::from_secs(90),
        );

        running.handle.send(
            TEST_CHANNEL,
            r#"{"Table":"formations","Action":"INSERT","Data":{"id":"f-1"}}"#,
        );
        running.handle.send(
            TEST_CHANNEL,
            r#"{"Table":"formations","Action":"UPDATE","Data":{"id":"f-1"}}"#,
        );

        wait_until(|| formations.calls().len() == 2).await;

        running.shutdown_tx.shutdown();
        running.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn unknown_table_is_skipped() {
        let assignments = RecordingHandler::new();
        let running = start_processor(
            registry_with(vec![(
                ResourceType::FormationAssignment,
                assignments.clone(),
            )]),
            Duration::from_secs(90),
        );

        running.handle.send(
            TEST_CHANNEL,
            r#"{"Table":"webhooks","Action":"INSERT","Data":{"id":"w-1"}}"#,
        );
        running.handle.send(
            TEST_CHANNEL,
            r#"{"Table":"formation_assignments","Action":"INSERT","Data":{"id":"fa-1"}}"#,
        );

        wait_until(|| !assignments.calls().is_empty()).await;
        assert_eq!(assignments.calls().len(), 1);

        running.shutdown_tx.shutdown();
        running.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn mixed_stream_dispatches_only_valid_events() {
        let formations = RecordingHandler::new();
        let assignments = RecordingHandler::new();
        let running = start_processor(
            registry_with(vec![
                (ResourceType::Formation, formations.clone()),
                (ResourceType::FormationAssignment, assignments.clone()),
            ]),
            Duration::from_secs(90),
        );

        running.handle.send(
            TEST_CHANNEL,
            r#"{"Table":"formations","Action":"INSERT","Data":{"id":"f-1","name":"default"}}"#,
        );
        running.handle.send(
            TEST_CHANNEL,
            r#"{"Table":"webhooks","Action":"INSERT","Data":{"id":"w-1"}}"#,
        );
        running.handle.send(
            TEST_CHANNEL,
            r#"{"Table":"formation_assignments","Action":"INSERT","Data":{"id":"fa-1"}}"#,
        );

        wait_until(|| !assignments.calls().is_empty()).await;

        assert_eq!(
            formations.calls(),
            vec![(
                HandledOp::Create,
                br#"{"id":"f-1","name":"default"}"#.to_vec()
            )]
        );
        assert_eq!(
            assignments.calls(),
            vec![(HandledOp::Create, br#"{"id":"fa-1"}"#.to_vec())]
        );

        running.shutdown_tx.shutdown();
        running.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn invalid_payloads_are_skipped() {
        let apps = RecordingHandler::new();
        let running = start_processor(
            registry_with(vec![(ResourceType::Application, apps.clone())]),
            Duration::from_secs(90),
        );

        running.handle.send(TEST_CHANNEL, "this is not json");
        running
            .handle
            .send(TEST_CHANNEL, r#"{"Table":"applications","Action":"INSERT"}"#);
        running
            .handle
            .send(TEST_CHANNEL, r#"{"Table":"applications","Action":"","Data":{}}"#);
        running.handle.send(
            TEST_CHANNEL,
            r#"{"Table":"applications","Action":"DELETE","Data":{"id":"app-9"}}"#,
        );

        wait_until(|| !apps.calls().is_empty()).await;

        let calls = apps.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, HandledOp::Delete);

        running.shutdown_tx.shutdown();
        running.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn unrecognized_action_is_not_dispatched() {
        let labels = RecordingHandler::new();
        let running = start_processor(
            registry_with(vec![(ResourceType::Label, labels.clone())]),
            Duration::from_secs(90),
        );

        running.handle.send(
            TEST_CHANNEL,
            r#"{"Table":"labels","Action":"TRUNCATE","Data":{"id":"l-1"}}"#,
        );
        running.handle.send(
            TEST_CHANNEL,
            r#"{"Table":"labels","Action":"INSERT","Data":{"id":"l-2"}}"#,
        );

        wait_until(|| !labels.calls().is_empty()).await;

        let calls = labels.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (HandledOp::Create, br#"{"id":"l-2"}"#.to_vec()));

        running.shutdown_tx.shutdown();
        running.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn shutdown_closes_the_source() {
        let running = start_processor(registry_with(vec![]), Duration::from_secs(90));

        running.shutdown_tx.shutdown();
        running.task.await.unwrap().unwrap();

        assert_eq!(running.handle.close_count(), 1);
    }

    #[tokio::test]
    async fn idle_timeout_triggers_ping() {
        let running = start_processor(registry_with(vec![]), Duration::from_millis(25));

        let handle = running.handle.clone();
        wait_until(move || handle.ping_count() >= 1).await;

        running.shutdown_tx.shutdown();
        running.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failed_ping_does_not_stop_the_loop() {
        let apps = RecordingHandler::new();
        let running = start_processor(
            registry_with(vec![(ResourceType::Application, apps.clone())]),
            Duration::from_millis(25),
        );

        running.handle.fail_pings(true);
        let handle = running.handle.clone();
        wait_until(move || handle.ping_count() >= 1).await;

        running.handle.send(
            TEST_CHANNEL,
            r#"{"Table":"applications","Action":"UPDATE","Data":{"id":"app-1"}}"#,
        );

        wait_until(|| !apps.calls().is_empty()).await;

        running.shutdown_tx.shutdown();
        running.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn closed_source_without_shutdown_is_an_error() {
        let (source, handle) = MemorySource::new();
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let processor = NotificationProcessor::new(
            registry_with(vec![]),
            source,
            Duration::from_secs(90),
            shutdown_rx,
        );
        let task = tokio::spawn(processor.run());

        drop(handle);

        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConnectionClosed);
    }
}
