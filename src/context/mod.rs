//! Application context and initialization logic.
//! This module handles loading configuration, setting up the database,
//! loading regions and seeding subscribers. The `AppContext` struct
//! encapsulates these components for use throughout the application.

mod error;
mod metrics;

use std::{collections::HashMap, sync::Arc};

pub use error::{AppContextError, InitializationError};
pub use metrics::{AppMetrics, Metrics};

use crate::{
    config::AppConfig,
    engine::template::TemplateService,
    loader::load_config,
    models::{MetricKind, Region, Subscriber},
    persistence::{SqliteStateRepository, SubscriberStore},
};

/// The application context, holding configuration, database repository,
/// the region table and the template service.
pub struct AppContext {
    /// Shared application configuration.
    pub config: AppConfig,

    /// The state repository for database interactions.
    pub repo: Arc<SqliteStateRepository>,

    /// Regions by id.
    pub regions: Arc<HashMap<String, Region>>,

    /// Template service for rendering alert text.
    pub template_service: Arc<TemplateService>,
}

/// A builder for the `AppContext`, allowing configuration overrides
/// and step-by-step initialization.
pub struct AppContextBuilder {
    /// Optional configuration directory to load settings from.
    config_dir: Option<String>,

    /// Already loaded configuration, used instead of `config_dir`.
    config_override: Option<AppConfig>,

    /// Optional override for the database URL.
    database_url_override: Option<String>,
}

impl AppContextBuilder {
    /// Creates a new `AppContextBuilder` with an optional configuration
    /// directory.
    pub fn new(config_dir: Option<String>) -> Self {
        Self { config_dir, config_override: None, database_url_override: None }
    }

    /// Uses `config` instead of reading `app.yaml`.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config_override = Some(config);
        self
    }

    /// Sets a database URL override.
    pub fn database_url(mut self, url: String) -> Self {
        self.database_url_override = Some(url);
        self
    }

    /// Builds the `AppContext`, performing all initialization steps.
    pub async fn build(self) -> Result<AppContext, AppContextError> {
        let mut config = match self.config_override {
            Some(config) => config,
            None => {
                tracing::debug!("Loading application configuration...");
                AppConfig::new(self.config_dir.as_deref())?
            }
        };
        tracing::debug!(database_url = %config.database_url, "Configuration loaded.");

        if let Some(db_url) = self.database_url_override {
            tracing::info!(database_url = %db_url, "Overriding database URL.");
            config.database_url = db_url;
        }

        let template_service = Arc::new(TemplateService::new());
        Self::validate_templates(&config, &template_service)?;

        let regions = Arc::new(Self::load_regions(&config)?);

        tracing::debug!("Initializing state repository...");
        let repo = Arc::new(SqliteStateRepository::new(&config.database_url).await?);
        repo.run_migrations().await?;
        tracing::info!("Database migrations completed.");

        Self::load_subscribers_from_file(&config, repo.as_ref()).await?;

        Ok(AppContext { config, repo, regions, template_service })
    }

    /// Fails fast on templates that do not parse.
    fn validate_templates(
        config: &AppConfig,
        template_service: &TemplateService,
    ) -> Result<(), InitializationError> {
        for metric in [MetricKind::DroughtRisk, MetricKind::Rainfall, MetricKind::Temperature] {
            let template = config.alert_templates.for_metric(metric);
            for source in [&template.title, &template.body, &template.sms] {
                template_service.validate(source).map_err(|e| InitializationError::Template {
                    metric: metric.as_str(),
                    reason: e.to_string(),
                })?;
            }
        }
        Ok(())
    }

    /// Loads the region table.
    fn load_regions(config: &AppConfig) -> Result<HashMap<String, Region>, InitializationError> {
        let config_path = &config.region_config_path;
        tracing::debug!(config_path = %config_path.display(), "Loading regions...");
        let regions =
            load_config::<Region>(config_path.clone()).map_err(InitializationError::RegionLoad)?;
        tracing::info!(count = regions.len(), "Loaded regions from configuration file.");
        Ok(regions.into_iter().map(|region| (region.id.clone(), region)).collect())
    }

    /// Loads subscribers from the configuration file into the database if no
    /// subscribers exist yet.
    async fn load_subscribers_from_file(
        config: &AppConfig,
        repo: &dyn SubscriberStore,
    ) -> Result<(), InitializationError> {
        let config_path = &config.subscriber_config_path;

        let existing = repo.list_subscribers().await.map_err(|e| {
            InitializationError::SubscriberLoad(format!(
                "Failed to fetch existing subscribers from DB: {e}"
            ))
        })?;
        if !existing.is_empty() {
            tracing::info!(
                count = existing.len(),
                "Subscribers already exist in the database. Skipping loading from file."
            );
            return Ok(());
        }

        tracing::info!(config_path = %config_path.display(), "No subscribers found in database. Loading from configuration file...");
        let subscribers = load_config::<Subscriber>(config_path.clone()).map_err(|e| {
            InitializationError::SubscriberLoad(format!("Failed to load subscribers from file: {e}"))
        })?;
        let count = subscribers.len();
        repo.upsert_subscribers(subscribers).await.map_err(|e| {
            InitializationError::SubscriberLoad(format!("Failed to add subscribers to DB: {e}"))
        })?;
        tracing::info!(count, "Subscribers from file stored in database.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::{config::MessageTemplate, test_helpers::SubscriberBuilder};

    fn write_companion_files(dir: &TempDir) -> AppConfig {
        let regions = dir.path().join("regions.yaml");
        fs::write(
            &regions,
            r#"
regions:
  - id: "nairobi"
    name: "Nairobi"
    center: { lat: -1.29, lon: 36.82 }
    radius_km: 10.0
  - id: "turkana"
    name: "Turkana"
"#,
        )
        .unwrap();
        let subscribers = dir.path().join("subscribers.yaml");
        fs::write(
            &subscribers,
            r#"
subscribers:
  - id: "s1"
    region_id: "nairobi"
    channels: [web, sms, sms]
"#,
        )
        .unwrap();
        AppConfig::builder()
            .database_url("sqlite::memory:")
            .region_config_path(regions.to_str().unwrap())
            .subscriber_config_path(subscribers.to_str().unwrap())
            .build()
    }

    #[test]
    fn test_app_context_builder_new() {
        let builder = AppContextBuilder::new(Some("test_config".to_string()));
        assert_eq!(builder.config_dir, Some("test_config".to_string()));
        assert!(builder.config_override.is_none());
        assert!(builder.database_url_override.is_none());
    }

    #[test]
    fn test_app_context_builder_with_database_override() {
        let builder = AppContextBuilder::new(None).database_url("sqlite::memory:".to_string());
        assert_eq!(builder.database_url_override, Some("sqlite::memory:".to_string()));
    }

    #[test]
    fn test_app_context_error_display() {
        let config_error =
            AppContextError::Config(config::ConfigError::Message("test error".to_string()));
        assert!(config_error.to_string().contains("Config error: test error"));
    }

    #[tokio::test]
    async fn test_build_loads_regions_and_seeds_subscribers() {
        let dir = tempdir().unwrap();
        let config = write_companion_files(&dir);

        let context = AppContextBuilder::new(None).config(config).build().await.unwrap();

        assert_eq!(context.regions.len(), 2);
        assert!(context.regions["turkana"].radius_constraint().is_none());
        let subscribers = context.repo.list_subscribers().await.unwrap();
        assert_eq!(subscribers.len(), 1);
        assert_eq!(subscribers[0].channels.len(), 2);
    }

    #[tokio::test]
    async fn test_existing_subscribers_are_not_overwritten() {
        let dir = tempdir().unwrap();
        let config = write_companion_files(&dir);
        let repo = SqliteStateRepository::new("sqlite::memory:").await.unwrap();
        repo.run_migrations().await.unwrap();
        repo.upsert_subscribers(vec![SubscriberBuilder::new("existing").build()]).await.unwrap();

        AppContextBuilder::load_subscribers_from_file(&config, &repo).await.unwrap();

        let subscribers = repo.list_subscribers().await.unwrap();
        assert_eq!(subscribers.len(), 1);
        assert_eq!(subscribers[0].id, "existing");
    }

    #[tokio::test]
    async fn test_missing_region_file_fails() {
        let config = AppConfig::builder()
            .database_url("sqlite::memory:")
            .region_config_path("does/not/exist.yaml")
            .build();
        let result = AppContextBuilder::new(None).config(config).build().await;
        assert!(matches!(
            result,
            Err(AppContextError::Initialization(InitializationError::RegionLoad(_)))
        ));
    }

    #[test]
    fn test_broken_template_is_rejected() {
        let mut config = AppConfig::builder().build();
        config.alert_templates.rainfall = MessageTemplate {
            title: "{{ region_name".into(),
            body: "ok".into(),
            sms: "ok".into(),
            recommended_actions: Default::default(),
        };
        let result = AppContextBuilder::validate_templates(&config, &TemplateService::new());
        assert!(matches!(result, Err(InitializationError::Template { metric: "rainfall", .. })));
    }
}
