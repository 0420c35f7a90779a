//! Worker binary subscribing to management-plane change notifications.

mod config;
mod error;
mod handlers;

use std::sync::Arc;

use relay::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use relay::listener::lifecycle::{create_lifecycle_channel, spawn_lifecycle_logger};
use relay::listener::pg::PgChannelListener;
use relay::processor::NotificationProcessor;
use relay_telemetry::init_tracing;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};

use crate::config::{WorkerConfig, load_worker_config};
use crate::error::{WorkerError, WorkerResult};
use crate::handlers::default_registry;

fn main() -> WorkerResult<()> {
    // Configuration is loaded before telemetry so that a bad config fails
    // fast with a plain error on stderr.
    let config = load_worker_config()?;

    init_tracing(env!("CARGO_BIN_NAME"))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config)).inspect_err(|err| {
        error!(error = %err, "the worker experienced an unrecoverable error");
    })
}

async fn async_main(config: WorkerConfig) -> WorkerResult<()> {
    info!(channel = %config.listener.channel, "starting notification worker");

    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    spawn_signal_listener(shutdown_tx.clone())?;

    let (lifecycle_tx, lifecycle_rx) = create_lifecycle_channel();
    let lifecycle_logger = spawn_lifecycle_logger(config.listener.channel.clone(), lifecycle_rx);

    let listener =
        PgChannelListener::connect(&config.pg_connection, &config.listener, lifecycle_tx).await?;

    let registry = Arc::new(default_registry(&config.listener.channel));
    let processor = NotificationProcessor::new(
        registry,
        listener,
        config.listener.idle_timeout(),
        shutdown_rx,
    );

    let result = processor.run().await;

    if let Err(err) = lifecycle_logger.await {
        warn!(error = %err, "lifecycle logger task panicked");
    }

    result.map_err(WorkerError::from)
}

/// Spawns a task that signals shutdown on SIGINT or SIGTERM.
///
/// SIGTERM is what orchestrators send before SIGKILL during pod termination,
/// so it must reach the processor's close path like a ctrl+c does. The
/// SIGTERM stream is registered before the task is spawned so that a signal
/// arriving right after this returns is not lost.
fn spawn_signal_listener(shutdown_tx: ShutdownTx) -> std::io::Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("sigint (ctrl+c) received, shutting down"),
                    Err(err) => warn!(error = %err, "failed to listen for sigint"),
                }
            }
            _ = sigterm.recv() => {
                info!("sigterm received, shutting down");
            }
        }

        shutdown_tx.shutdown();
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn sigterm_triggers_shutdown() {
        let (shutdown_tx, mut shutdown_rx) = create_shutdown_channel();
        spawn_signal_listener(shutdown_tx).unwrap();

        std::process::Command::new("kill")
            .args(["-TERM", &std::process::id().to_string()])
            .status()
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), shutdown_rx.wait_for_shutdown())
            .await
            .unwrap();
        assert!(shutdown_rx.is_shutdown());
    }
}
