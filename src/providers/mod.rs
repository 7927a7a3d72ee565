//! Upstream hazard signal sources.

pub mod http;
pub mod traits;

pub use http::HttpSignalSource;
pub use traits::{SignalSource, SignalSourceError};
