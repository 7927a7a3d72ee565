//! The Supervisor module manages the lifecycle of the ukame engine.
//!
//! The `Supervisor` owns every long-running service: the dispatch fan-out,
//! its retry loop, the optional signal ingestor and the HTTP server. It
//! listens for `SIGINT`/`SIGTERM`, cancels all tasks through one
//! `CancellationToken` and flushes the state repository before exiting. If a
//! supervised task panics, the remaining ones are shut down as well.

mod builder;

use std::sync::Arc;

pub use builder::SupervisorBuilder;
use chrono::{TimeDelta, Utc};
use thiserror::Error;
use tokio::{signal, sync::mpsc};
use tokio_util::sync::CancellationToken;

use crate::{
    channels::ChannelError,
    config::AppConfig,
    context::AppMetrics,
    engine::{
        dispatcher::DispatchFanOut, feed::FeedQueryService, read_tracker::ReadTracker,
        signal_ingestor::SignalIngestor, signal_processor::SignalProcessor,
    },
    http_server::{self, ApiState},
    persistence::StateRepository,
    providers::SignalSourceError,
};

/// Represents the set of errors that can occur during the supervisor's
/// operation.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required configuration was not provided to the `SupervisorBuilder`.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// A state repository was not provided to the `SupervisorBuilder`.
    #[error("Missing state repository for Supervisor")]
    MissingStateRepository,

    /// The region table was not provided to the `SupervisorBuilder`.
    #[error("Missing regions for Supervisor")]
    MissingRegions,

    /// A channel adapter could not be created from configuration.
    #[error("Channel adapter error: {0}")]
    Channel(#[from] ChannelError),

    /// The configured signal source could not be created.
    #[error("Signal source error: {0}")]
    SignalSource(#[from] SignalSourceError),
}

/// The primary runtime manager for the application.
pub struct Supervisor<T: StateRepository + 'static> {
    /// Shared application configuration.
    config: Arc<AppConfig>,

    /// The persistent state repository.
    state: Arc<T>,

    /// The shared application metrics.
    app_metrics: AppMetrics,

    processor: Arc<SignalProcessor>,
    dispatcher: Arc<DispatchFanOut>,
    feed: Arc<FeedQueryService>,
    read_tracker: Arc<ReadTracker>,

    /// Sending side of the dispatch queue, used to re-queue active alerts.
    dispatch_tx: mpsc::Sender<i64>,

    /// Receiving side of the queue fed by the signal processor.
    dispatch_rx: Option<mpsc::Receiver<i64>>,

    /// Polls the upstream feed when one is configured.
    ingestor: Option<SignalIngestor>,

    /// A token used to signal a graceful shutdown to all supervised tasks.
    cancellation_token: CancellationToken,

    /// A set of all spawned tasks that the supervisor is actively managing.
    join_set: tokio::task::JoinSet<()>,
}

impl<T: StateRepository + 'static> Supervisor<T> {
    /// Returns a new `SupervisorBuilder` instance.
    pub fn builder() -> SupervisorBuilder<T> {
        SupervisorBuilder::new()
    }

    /// The state shared with HTTP handlers.
    pub fn api_state(&self) -> ApiState {
        ApiState {
            config: Arc::clone(&self.config),
            repo: Arc::clone(&self.state) as Arc<dyn StateRepository>,
            app_metrics: self.app_metrics.clone(),
            feed: Arc::clone(&self.feed),
            read_tracker: Arc::clone(&self.read_tracker),
            processor: Arc::clone(&self.processor),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }

    /// A handle that stops the supervisor when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Starts all services and blocks until shutdown completes.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        let cancellation_token = self.cancellation_token.clone();

        // Spawn a task to listen for shutdown signals.
        self.join_set.spawn(async move {
            let ctrl_c = signal::ctrl_c();
            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to register SIGTERM handler.");
                        std::future::pending::<()>().await;
                    }
                }
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("SIGINT (Ctrl+C) received, initiating graceful shutdown."),
                _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown."),
                _ = cancellation_token.cancelled() => {}
            }

            cancellation_token.cancel();
        });

        if self.config.server.enabled {
            let api_state = self.api_state();
            let http_cancellation_token = self.cancellation_token.clone();
            self.join_set.spawn(async move {
                if let Err(e) =
                    http_server::run_server_from_config(api_state, http_cancellation_token.clone())
                        .await
                {
                    tracing::error!(error = %e, "HTTP server failed. Initiating shutdown.");
                    http_cancellation_token.cancel();
                }
            });
        }

        // --- Task Spawning ---

        if let Some(dispatch_rx) = self.dispatch_rx.take() {
            let dispatcher = Arc::clone(&self.dispatcher);
            let token = self.cancellation_token.clone();
            self.join_set.spawn(async move {
                dispatcher.run(dispatch_rx, token).await;
            });
        }

        let lookback =
            TimeDelta::from_std(self.config.feed_lookback_secs).unwrap_or(TimeDelta::days(7));
        self.join_set.spawn(requeue_active_alerts(
            Arc::clone(&self.state),
            Utc::now() - lookback,
            self.dispatch_tx.clone(),
            self.cancellation_token.clone(),
        ));

        let dispatcher = Arc::clone(&self.dispatcher);
        let token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            dispatcher.run_retry_loop(token).await;
        });

        if let Some(ingestor) = self.ingestor.take() {
            let token = self.cancellation_token.clone();
            self.join_set.spawn(async move {
                ingestor.run(token).await;
            });
        } else {
            tracing::info!("No signal source configured. Signals arrive through the HTTP API only.");
        }

        // --- Main Supervisor Loop ---

        loop {
            tokio::select! {
                maybe_result = self.join_set.join_next() => {
                    match maybe_result {
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::error!("A critical task failed: {:?}. Initiating shutdown.", e);
                            self.cancellation_token.cancel();
                        }
                        None => break,
                    }
                }
                _ = self.cancellation_token.cancelled() => break,
            }
        }

        // --- Graceful Shutdown ---

        let shutdown_timeout = self.config.shutdown_timeout;
        let drain = async {
            while let Some(result) = self.join_set.join_next().await {
                if let Err(e) = result {
                    tracing::error!(error = ?e, "Task failed during shutdown.");
                }
            }
        };
        if tokio::time::timeout(shutdown_timeout, drain).await.is_err() {
            tracing::warn!(?shutdown_timeout, "Tasks did not stop in time, aborting them.");
            self.join_set.shutdown().await;
        }
        tracing::info!("All supervised tasks have completed.");

        tracing::info!("Starting graceful resource cleanup...");
        let cleanup_logic = async {
            if let Err(e) = self.state.flush().await {
                tracing::error!(error = %e, "Failed to flush pending writes, but continuing cleanup.");
            }
            if let Err(e) = self.state.cleanup().await {
                tracing::error!(error = %e, "Failed to perform state repository cleanup, but continuing.");
            }
            let metrics = self.app_metrics.snapshot().await;
            tracing::info!(
                alerts_created = metrics.alerts_created,
                suppressed = metrics.suppressed_signals,
                failed_deliveries = metrics.failed_deliveries,
                "Final counters."
            );
        };

        if tokio::time::timeout(shutdown_timeout, cleanup_logic).await.is_err() {
            tracing::warn!(
                "Cleanup did not complete within the timeout of {:?}. Continuing shutdown.",
                shutdown_timeout
            );
        } else {
            tracing::info!("Cleanup completed successfully.");
        }

        tracing::info!("Supervisor shutdown complete.");
        Ok(())
    }
}

/// Puts alerts that are still active back on the dispatch queue, so alerts
/// created just before a crash reach their recipients. Fan-out is idempotent
/// per delivery key, and the dispatcher applies its own concurrency limit.
async fn requeue_active_alerts<T: StateRepository + 'static>(
    state: Arc<T>,
    since: chrono::DateTime<Utc>,
    dispatch_tx: mpsc::Sender<i64>,
    cancellation_token: CancellationToken,
) {
    let alerts = match state.list_feed_candidates(since).await {
        Ok(alerts) => alerts,
        Err(e) => {
            tracing::warn!(error = %e, "Could not list active alerts for re-dispatch.");
            return;
        }
    };

    let mut requeued = 0;
    for alert in alerts.iter().filter(|alert| alert.is_active()) {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                tracing::info!(requeued, "Startup re-dispatch interrupted by shutdown.");
                return;
            }
            sent = dispatch_tx.send(alert.id) => {
                if sent.is_err() {
                    tracing::warn!(alert_id = alert.id, "Dispatch queue closed during startup re-dispatch.");
                    return;
                }
                requeued += 1;
            }
        }
    }
    if requeued > 0 {
        tracing::info!(count = requeued, "Active alerts queued for re-dispatch at startup.");
    }
}
