//! This module provides the `SupervisorBuilder` for constructing a `Supervisor`.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{Supervisor, SupervisorError};
use crate::{
    channels::ChannelRegistry,
    config::AppConfig,
    context::{AppContext, AppMetrics},
    engine::{
        classifier::SeverityClassifier,
        deduplicator::Deduplicator,
        dispatcher::{DispatchFanOut, DispatchStores},
        feed::FeedQueryService,
        geo_filter::GeoRelevanceFilter,
        read_tracker::ReadTracker,
        signal_ingestor::SignalIngestor,
        signal_processor::SignalProcessor,
        template::TemplateService,
    },
    models::Region,
    persistence::{SqliteStateRepository, StateRepository},
    providers::{HttpSignalSource, SignalSource},
};

/// A builder for creating a `Supervisor` instance.
pub struct SupervisorBuilder<T: StateRepository + 'static> {
    config: Option<AppConfig>,
    state: Option<Arc<T>>,
    regions: Option<Arc<HashMap<String, Region>>>,
    template_service: Option<Arc<TemplateService>>,
    app_metrics: Option<AppMetrics>,
    channels: Option<ChannelRegistry>,
    signal_source: Option<Arc<dyn SignalSource>>,
}

impl<T: StateRepository + 'static> Default for SupervisorBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl SupervisorBuilder<SqliteStateRepository> {
    /// Takes configuration, repository, regions and templates from an
    /// initialized context.
    pub fn context(self, context: AppContext) -> Self {
        self.config(context.config)
            .state(context.repo)
            .regions(context.regions)
            .template_service(context.template_service)
    }
}

impl<T: StateRepository + 'static> SupervisorBuilder<T> {
    /// Creates a new, empty `SupervisorBuilder`.
    pub fn new() -> Self {
        Self {
            config: None,
            state: None,
            regions: None,
            template_service: None,
            app_metrics: None,
            channels: None,
            signal_source: None,
        }
    }

    /// Sets the application configuration for the `Supervisor`.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the state repository for the `Supervisor`.
    pub fn state(mut self, state: Arc<T>) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets the region table.
    pub fn regions(mut self, regions: Arc<HashMap<String, Region>>) -> Self {
        self.regions = Some(regions);
        self
    }

    /// Sets the template service. Defaults to a fresh one.
    pub fn template_service(mut self, template_service: Arc<TemplateService>) -> Self {
        self.template_service = Some(template_service);
        self
    }

    /// Sets the metrics handle. Defaults to a fresh one.
    pub fn app_metrics(mut self, app_metrics: AppMetrics) -> Self {
        self.app_metrics = Some(app_metrics);
        self
    }

    /// Overrides the channel adapters built from `config.channels`.
    pub fn channels(mut self, channels: ChannelRegistry) -> Self {
        self.channels = Some(channels);
        self
    }

    /// Overrides the signal source built from `config.signal_source`.
    pub fn signal_source(mut self, signal_source: Arc<dyn SignalSource>) -> Self {
        self.signal_source = Some(signal_source);
        self
    }

    /// Assembles and validates the components to build a `Supervisor`.
    pub fn build(self) -> Result<Supervisor<T>, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        let state = self.state.ok_or(SupervisorError::MissingStateRepository)?;
        let regions = self.regions.ok_or(SupervisorError::MissingRegions)?;
        let template_service =
            self.template_service.unwrap_or_else(|| Arc::new(TemplateService::new()));
        let app_metrics = self.app_metrics.unwrap_or_default();
        let channels = match self.channels {
            Some(channels) => channels,
            None => ChannelRegistry::from_config(&config.channels)?,
        };
        tracing::info!(channels = ?channels.channels(), "Channel adapters ready.");

        let signal_source = match (self.signal_source, &config.signal_source) {
            (Some(source), _) => Some(source),
            (None, Some(source_config)) => {
                tracing::info!(url = %source_config.url, "Using HTTP signal source.");
                Some(Arc::new(HttpSignalSource::new(source_config.url.clone())?)
                    as Arc<dyn SignalSource>)
            }
            (None, None) => None,
        };

        let geo_filter = GeoRelevanceFilter::new(config.geo.include_unlocated_subscribers);
        let (dispatch_tx, dispatch_rx) =
            mpsc::channel::<i64>(config.signal_channel_capacity.max(1) as usize);

        let deduplicator =
            Arc::new(Deduplicator::new(state.clone(), config.cooldown_secs, app_metrics.clone()));
        let processor = Arc::new(SignalProcessor::new(
            regions,
            SeverityClassifier::new(config.severity_thresholds.clone()),
            config.alert_templates.clone(),
            template_service,
            deduplicator,
            dispatch_tx.clone(),
            app_metrics.clone(),
        ));
        let dispatcher = Arc::new(DispatchFanOut::new(
            DispatchStores::from_repo(state.clone()),
            channels,
            geo_filter,
            config.dispatch.clone(),
            app_metrics.clone(),
        ));
        let feed = Arc::new(FeedQueryService::new(
            state.clone(),
            state.clone(),
            state.clone(),
            geo_filter,
            config.feed_lookback_secs,
        ));
        let read_tracker = Arc::new(ReadTracker::new(
            state.clone(),
            state.clone(),
            state.clone(),
            geo_filter,
            config.feed_lookback_secs,
        ));

        let ingestor = signal_source.map(|source| {
            let (polling_interval, backlog_capacity) = config
                .signal_source
                .as_ref()
                .map(|c| (c.polling_interval_secs, c.backlog_capacity))
                .unwrap_or((std::time::Duration::from_secs(300), 1000));
            SignalIngestor::new(source, Arc::clone(&processor), polling_interval, backlog_capacity)
        });

        Ok(Supervisor {
            config: Arc::new(config),
            state,
            app_metrics,
            processor,
            dispatcher,
            feed,
            read_tracker,
            dispatch_tx,
            dispatch_rx: Some(dispatch_rx),
            ingestor,
            cancellation_token: CancellationToken::new(),
            join_set: tokio::task::JoinSet::new(),
        })
    }
}
