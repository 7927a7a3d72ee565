//! `dry-run`: classify a file of signals and report what would happen,
//! against a throwaway in-memory database.

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{
    context::{AppContext, AppContextBuilder, AppContextError, AppMetrics},
    engine::{
        classifier::SeverityClassifier,
        deduplicator::Deduplicator,
        geo_filter::GeoRelevanceFilter,
        signal_processor::{SignalOutcome, SignalProcessor},
    },
    models::HazardSignal,
    persistence::{AlertStore, PersistenceError, SubscriberStore},
};

/// Errors that can occur during a dry run.
#[derive(Error, Debug)]
pub enum DryRunError {
    /// The signal file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Configuration or companion files failed to load.
    #[error("Initialization error: {0}")]
    Context(#[from] AppContextError),
    /// The in-memory store failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    /// The signal file or the report is not valid JSON.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Arguments of the `dry-run` subcommand.
#[derive(Parser, Debug)]
pub struct DryRunArgs {
    /// Path to a JSON file holding an array of hazard signals.
    #[arg(short, long)]
    signals: PathBuf,
}

/// What became of one signal.
#[derive(Debug, Serialize)]
pub struct DryRunEntry {
    /// The input signal.
    pub signal: HazardSignal,
    /// The dedup decision, when the signal was valid.
    pub outcome: Option<SignalOutcome>,
    /// Why the signal was rejected.
    pub error: Option<String>,
    /// Subscribers the created alert would reach.
    pub recipients: Vec<String>,
}

/// Entry point of the `dry-run` subcommand. Prints the report as JSON.
pub async fn execute(args: DryRunArgs, config_dir: Option<String>) -> Result<(), DryRunError> {
    let content = tokio::fs::read(&args.signals).await?;
    let signals: Vec<HazardSignal> = serde_json::from_slice(&content)?;

    let context = AppContextBuilder::new(config_dir)
        .database_url("sqlite::memory:".to_string())
        .build()
        .await?;

    tracing::info!(count = signals.len(), "Starting dry run...");
    let report = run(&context, &signals).await?;
    tracing::info!("Dry run finished.");

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Processes `signals` in order against `context` without dispatching.
pub async fn run(
    context: &AppContext,
    signals: &[HazardSignal],
) -> Result<Vec<DryRunEntry>, PersistenceError> {
    let config = &context.config;
    let metrics = AppMetrics::default();
    // Held so that alert ids queued for dispatch are simply dropped.
    let (dispatch_tx, _dispatch_rx) = mpsc::channel(signals.len().max(1));
    let processor = SignalProcessor::new(
        Arc::clone(&context.regions),
        SeverityClassifier::new(config.severity_thresholds.clone()),
        config.alert_templates.clone(),
        Arc::clone(&context.template_service),
        Arc::new(Deduplicator::new(context.repo.clone(), config.cooldown_secs, metrics.clone())),
        dispatch_tx,
        metrics,
    );
    let geo_filter = GeoRelevanceFilter::new(config.geo.include_unlocated_subscribers);
    let subscribers = context.repo.list_subscribers().await?;

    let mut entries = Vec::with_capacity(signals.len());
    for signal in signals {
        let entry = match processor.process(signal).await {
            Ok(outcome) => {
                let mut recipients = Vec::new();
                if let Some(alert_id) = outcome.alert_id()
                    && let Some(alert) = context.repo.get_alert(alert_id).await?
                {
                    recipients = geo_filter
                        .relevant_subscribers(&alert, &subscribers)
                        .into_iter()
                        .map(|subscriber| subscriber.id.clone())
                        .collect();
                }
                DryRunEntry { signal: signal.clone(), outcome: Some(outcome), error: None, recipients }
            }
            Err(e) => DryRunEntry {
                signal: signal.clone(),
                outcome: None,
                error: Some(e.to_string()),
                recipients: Vec::new(),
            },
        };
        entries.push(entry);
    }
    Ok(entries)
}
