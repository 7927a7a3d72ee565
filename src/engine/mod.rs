//! The ukame engine turns hazard signals into alerts and delivers them to
//! subscribers.

pub mod classifier;
pub mod deduplicator;
pub mod delivery_report;
pub mod dispatcher;
pub mod feed;
pub mod feed_poller;
pub mod geo_filter;
pub mod read_tracker;
pub mod signal_ingestor;
pub mod signal_processor;
pub mod template;
