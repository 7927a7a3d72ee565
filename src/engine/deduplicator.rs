//! Cooldown-window deduplication of alerts.

use std::sync::Arc;

use chrono::TimeDelta;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    context::AppMetrics,
    models::{Alert, AlertStatus, NewAlert},
    persistence::{AlertStore, PersistenceError, Retirement},
};

/// What happened to a proposed alert.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupOutcome {
    /// Stored as the new active alert. `expired` names a stale alert that was
    /// retired because its window had passed.
    Created { alert: Alert, expired: Option<i64> },
    /// Stored, replacing a lower-severity alert inside the window.
    Superseded { alert: Alert, previous_id: i64 },
    /// Dropped because an alert of equal or higher severity is active.
    Suppressed { active_alert_id: i64 },
}

impl DedupOutcome {
    /// The stored alert, if one was created.
    pub fn alert(&self) -> Option<&Alert> {
        match self {
            DedupOutcome::Created { alert, .. } | DedupOutcome::Superseded { alert, .. } => {
                Some(alert)
            }
            DedupOutcome::Suppressed { .. } => None,
        }
    }
}

/// Errors that can occur while deduplicating.
#[derive(Debug, Error)]
pub enum DedupError {
    /// The alert store failed.
    #[error("Alert store error: {0}")]
    Store(#[from] PersistenceError),

    /// A concurrent writer kept winning the race for the cooldown key.
    #[error("Contention on cooldown key '{cooldown_key}' persisted after retry")]
    Contention { cooldown_key: String },
}

/// Collapses alerts for the same condition within a cooldown window.
///
/// Decisions for one cooldown key are serialized by an in-process lock; the
/// store's one-active-alert-per-key constraint covers other writers.
pub struct Deduplicator {
    store: Arc<dyn AlertStore>,
    cooldown: TimeDelta,
    key_locks: DashMap<String, Arc<Mutex<()>>>,
    metrics: AppMetrics,
}

impl Deduplicator {
    /// Creates a new deduplicator with the given cooldown window.
    pub fn new(store: Arc<dyn AlertStore>, cooldown: std::time::Duration, metrics: AppMetrics) -> Self {
        let cooldown = TimeDelta::from_std(cooldown).unwrap_or(TimeDelta::MAX);
        Self { store, cooldown, key_locks: DashMap::new(), metrics }
    }

    fn get_key_lock(&self, cooldown_key: &str) -> Arc<Mutex<()>> {
        self.key_locks.entry(cooldown_key.to_string()).or_default().clone()
    }

    /// Creates, supersedes or suppresses `proposed`.
    #[tracing::instrument(skip(self, proposed), level = "debug", fields(cooldown_key = %proposed.cooldown_key, severity = %proposed.severity))]
    pub async fn submit(&self, proposed: NewAlert) -> Result<DedupOutcome, DedupError> {
        let lock = self.get_key_lock(&proposed.cooldown_key);
        let _guard = lock.lock().await;

        let outcome = match self.decide(&proposed).await {
            Err(e) if e.is_contention() => {
                tracing::warn!(error = %e, "Lost a race for the cooldown key, re-checking once.");
                match self.decide(&proposed).await {
                    Err(e) if e.is_contention() => {
                        self.metrics.record_contention_anomaly().await;
                        tracing::error!(
                            error = %e,
                            cooldown_key = %proposed.cooldown_key,
                            "Contention anomaly: dedup decision failed twice."
                        );
                        return Err(DedupError::Contention {
                            cooldown_key: proposed.cooldown_key.clone(),
                        });
                    }
                    other => other?,
                }
            }
            other => other?,
        };

        match &outcome {
            DedupOutcome::Created { alert, expired } => {
                self.metrics.record_alert_created().await;
                tracing::info!(alert_id = alert.id, expired = ?expired, "Alert created.");
            }
            DedupOutcome::Superseded { alert, previous_id } => {
                self.metrics.record_superseded().await;
                tracing::info!(alert_id = alert.id, previous_id, "Alert superseded by higher severity.");
            }
            DedupOutcome::Suppressed { active_alert_id } => {
                self.metrics.record_suppressed().await;
                tracing::info!(active_alert_id, "Signal suppressed inside cooldown window.");
            }
        }
        Ok(outcome)
    }

    async fn decide(&self, proposed: &NewAlert) -> Result<DedupOutcome, PersistenceError> {
        let Some(active) = self.store.find_active_alert(&proposed.cooldown_key).await? else {
            let alert = self.store.insert_alert(proposed.clone(), None).await?;
            return Ok(DedupOutcome::Created { alert, expired: None });
        };

        let elapsed = proposed.created_at - active.created_at;
        if elapsed >= self.cooldown {
            let retire = Retirement { alert_id: active.id, status: AlertStatus::Expired };
            let alert = self.store.insert_alert(proposed.clone(), Some(retire)).await?;
            return Ok(DedupOutcome::Created { alert, expired: Some(active.id) });
        }

        // A reading from before the active alert's window belongs to a window
        // that has already closed.
        if elapsed <= -self.cooldown {
            tracing::debug!(
                active_alert_id = active.id,
                observed_at = %proposed.created_at,
                "Stale reading older than the active window."
            );
            return Ok(DedupOutcome::Suppressed { active_alert_id: active.id });
        }

        if proposed.severity <= active.severity {
            return Ok(DedupOutcome::Suppressed { active_alert_id: active.id });
        }

        // The window never moves backwards: a late higher-severity reading
        // keeps the anchor of the alert it replaces.
        let mut replacement = proposed.clone();
        replacement.created_at = replacement.created_at.max(active.created_at);
        let retire = Retirement { alert_id: active.id, status: AlertStatus::Superseded };
        let alert = self.store.insert_alert(replacement, Some(retire)).await?;
        Ok(DedupOutcome::Superseded { alert, previous_id: active.id })
    }
}
