//! This module defines the interface for fetching hazard signals from the
//! upstream risk collaborator.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::models::HazardSignal;

/// Custom error type for signal source operations.
#[derive(Error, Debug)]
pub enum SignalSourceError {
    /// The source could not be reached or answered with an error status.
    #[error("Signal source request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The source answered with something that is not a list of signals.
    #[error("Failed to decode signals: {0}")]
    Decode(String),
}

/// A polling source of hazard signals.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Fetches the signals published since the previous call.
    async fn fetch_signals(&self) -> Result<Vec<HazardSignal>, SignalSourceError>;
}
