//! Postgres `LISTEN`/`NOTIFY` source.
//!
//! [`PgChannelListener`] owns a dedicated database session subscribed to one
//! channel. A background supervisor task drives the connection, forwards
//! delivered notifications and re-establishes the session with capped
//! exponential backoff when it is lost. Only the initial subscription is
//! fatal; everything after that is recovery.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use rand::Rng;
use relay_config::shared::{ListenerConfig, PgConnectionConfig};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_postgres::tls::NoTlsStream;
use tokio_postgres::{AsyncMessage, Client, NoTls, Socket};
use tracing::{debug, info, warn};

use crate::bail;
use crate::concurrency::shutdown::{ShutdownRx, ShutdownTx, create_shutdown_channel};
use crate::error::{ErrorKind, RelayResult};
use crate::listener::lifecycle::{LifecycleEvent, LifecycleTx};
use crate::listener::{NotificationSource, RawNotification};

/// Maximum percentage of the backoff delay added as random jitter.
const BACKOFF_JITTER_PERCENT: u64 = 25;

type PgConnection = tokio_postgres::Connection<Socket, NoTlsStream>;

/// Shared slot holding the client of the current session, if one is live.
type ClientSlot = Arc<Mutex<Option<Client>>>;

/// A [`NotificationSource`] backed by a Postgres `LISTEN` subscription.
pub struct PgChannelListener {
    channel: String,
    notifications_rx: mpsc::UnboundedReceiver<RawNotification>,
    client: ClientSlot,
    shutdown_tx: ShutdownTx,
    supervisor: Option<JoinHandle<()>>,
}

impl PgChannelListener {
    /// Connects to the database and subscribes to the configured channel.
    ///
    /// Fails when the initial session cannot be established; once this
    /// returns, later session losses are handled internally with reconnects.
    pub async fn connect(
        pg_config: &PgConnectionConfig,
        listener_config: &ListenerConfig,
        lifecycle_tx: LifecycleTx,
    ) -> RelayResult<Self> {
        let channel = listener_config.channel.clone();

        let (client, connection) = open_session(pg_config, &channel).await?;
        info!(channel = %channel, "subscribed to notification channel");
        let _ = lifecycle_tx.send(LifecycleEvent::Connected);

        let client: ClientSlot = Arc::new(Mutex::new(Some(client)));
        let (notifications_tx, notifications_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

        let supervisor = Supervisor {
            pg_config: pg_config.clone(),
            channel: channel.clone(),
            min_backoff: listener_config.min_backoff(),
            max_backoff: listener_config.max_backoff(),
            client: client.clone(),
            notifications_tx,
            lifecycle_tx,
            shutdown_rx,
        };
        let supervisor = Some(tokio::spawn(supervisor.run(connection)));

        Ok(Self {
            channel,
            notifications_rx,
            client,
            shutdown_tx,
            supervisor,
        })
    }
}

impl NotificationSource for PgChannelListener {
    fn name() -> &'static str {
        "pg-channel-listener"
    }

    async fn recv(&mut self) -> Option<RawNotification> {
        self.notifications_rx.recv().await
    }

    fn ping(&self) -> impl Future<Output = RelayResult<()>> + Send + 'static {
        let client = self.client.clone();
        let channel = self.channel.clone();

        async move {
            let guard = client.lock().await;
            let Some(client) = guard.as_ref() else {
                bail!(
                    ErrorKind::PingFailed,
                    "no live session to probe",
                    format!("the subscription on channel '{channel}' is reconnecting")
                );
            };

            client.batch_execute("SELECT 1").await?;

            Ok(())
        }
    }

    async fn close(&mut self) -> RelayResult<()> {
        self.shutdown_tx.shutdown();

        if let Some(supervisor) = self.supervisor.take() {
            if let Err(err) = supervisor.await {
                warn!(error = %err, "listener supervisor task panicked");
            }
        }

        // Dropping the client terminates the session.
        self.client.lock().await.take();
        self.notifications_rx.close();

        info!(channel = %self.channel, "notification subscription closed");

        Ok(())
    }
}

/// Outcome of pumping messages from one session.
enum PumpOutcome {
    /// Shutdown was requested.
    Shutdown,
    /// The session was lost and should be re-established.
    SessionLost,
}

struct Supervisor {
    pg_config: PgConnectionConfig,
    channel: String,
    min_backoff: Duration,
    max_backoff: Duration,
    client: ClientSlot,
    notifications_tx: mpsc::UnboundedSender<RawNotification>,
    lifecycle_tx: LifecycleTx,
    shutdown_rx: ShutdownRx,
}

impl Supervisor {
    async fn run(mut self, connection: PgConnection) {
        let mut connection = Some(connection);

        loop {
            let active = match connection.take() {
                Some(active) => active,
                None => match self.reconnect().await {
                    Some(active) => active,
                    None => return,
                },
            };

            match self.pump(active).await {
                PumpOutcome::Shutdown => return,
                PumpOutcome::SessionLost => {
                    self.client.lock().await.take();
                    let _ = self.lifecycle_tx.send(LifecycleEvent::Disconnected);
                    warn!(channel = %self.channel, "notification session lost, reconnecting");
                }
            }
        }
    }

    /// Drives one session's connection until shutdown or session loss.
    async fn pump(&mut self, connection: PgConnection) -> PumpOutcome {
        let mut connection = connection;
        let mut messages = futures::stream::poll_fn(move |cx| connection.poll_message(cx));

        loop {
            tokio::select! {
                biased;

                // PRIORITY 1: shutdown requests.
                _ = self.shutdown_rx.wait_for_shutdown() => {
                    return PumpOutcome::Shutdown;
                }

                // PRIORITY 2: messages from the session.
                message = messages.next() => {
                    match message {
                        Some(Ok(AsyncMessage::Notification(notification))) => {
                            let raw = RawNotification {
                                channel: notification.channel().to_owned(),
                                payload: notification.payload().to_owned(),
                            };

                            if self.notifications_tx.send(raw).is_err() {
                                // The receiving side is gone, nothing left to do.
                                return PumpOutcome::Shutdown;
                            }
                        }
                        Some(Ok(_)) => {
                            // Notices and other async messages are ignored.
                        }
                        Some(Err(err)) => {
                            warn!(channel = %self.channel, error = %err, "notification session errored");
                            return PumpOutcome::SessionLost;
                        }
                        None => {
                            return PumpOutcome::SessionLost;
                        }
                    }
                }
            }
        }
    }

    /// Re-establishes the session with capped exponential backoff and jitter.
    ///
    /// Returns [`None`] when shutdown was requested while reconnecting.
    async fn reconnect(&mut self) -> Option<PgConnection> {
        let mut backoff = self.min_backoff;

        loop {
            if self.shutdown_rx.is_shutdown() {
                return None;
            }

            match open_session(&self.pg_config, &self.channel).await {
                Ok((client, connection)) => {
                    *self.client.lock().await = Some(client);
                    let _ = self.lifecycle_tx.send(LifecycleEvent::Reconnected);
                    info!(channel = %self.channel, "notification subscription re-established");

                    return Some(connection);
                }
                Err(err) => {
                    let _ = self.lifecycle_tx.send(LifecycleEvent::ConnectionAttemptFailed);
                    let delay = jittered(backoff);
                    warn!(
                        channel = %self.channel,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "reconnection attempt failed, backing off"
                    );

                    tokio::select! {
                        _ = sleep(delay) => {}
                        _ = self.shutdown_rx.wait_for_shutdown() => {
                            return None;
                        }
                    }

                    backoff = (backoff * 2).min(self.max_backoff);
                }
            }
        }
    }
}

/// Opens a database session and issues `LISTEN` for the channel.
async fn open_session(
    pg_config: &PgConnectionConfig,
    channel: &str,
) -> RelayResult<(Client, PgConnection)> {
    let (client, connection) = pg_config.with_db().connect(NoTls).await?;

    let listen = format!("LISTEN {}", pg_escape::quote_identifier(channel));
    debug!(channel = %channel, "issuing listen statement");
    client.batch_execute(&listen).await?;

    Ok((client, connection))
}

/// Adds up to [`BACKOFF_JITTER_PERCENT`] percent of random jitter to a delay.
fn jittered(delay: Duration) -> Duration {
    let cap = delay.as_millis() as u64 * BACKOFF_JITTER_PERCENT / 100;
    if cap == 0 {
        return delay;
    }

    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=cap))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jittered_delay_stays_within_bounds() {
        let base = Duration::from_secs(8);
        let upper = base + Duration::from_secs(2);

        for _ in 0..100 {
            let delay = jittered(base);
            assert!(delay >= base);
            assert!(delay <= upper);
        }
    }

    #[test]
    fn jittered_passes_through_tiny_delays() {
        let base = Duration::from_millis(1);
        assert_eq!(jittered(base), base);
    }
}
