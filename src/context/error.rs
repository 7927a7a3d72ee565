use thiserror::Error;

use crate::{loader::LoaderError, persistence::PersistenceError};

/// Errors that can occur during application context initialization.
#[derive(Debug, Error)]
pub enum AppContextError {
    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Persistence error.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Initialization error.
    #[error("Initialization error: {0}")]
    Initialization(#[from] InitializationError),
}

/// Errors that can occur during specific initialization steps.
#[derive(Debug, Error)]
pub enum InitializationError {
    /// Failed to load regions from file.
    #[error("Failed to load regions from file: {0}")]
    RegionLoad(#[source] LoaderError),

    /// Failed to load subscribers from file.
    #[error("Failed to load subscribers from file: {0}")]
    SubscriberLoad(String),

    /// A configured alert template does not parse.
    #[error("Invalid alert template for {metric}: {reason}")]
    Template { metric: &'static str, reason: String },
}
