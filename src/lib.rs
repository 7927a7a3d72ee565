#![warn(missing_docs)]
//! ukame turns hazard signals into deduplicated, geo-targeted alerts and
//! delivers them to subscribers over web, SMS, WhatsApp and USSD.

pub mod channels;
pub mod cmd;
pub mod config;
pub mod context;
pub mod engine;
pub mod http_server;
pub mod loader;
pub mod models;
pub mod persistence;
pub mod providers;
pub mod supervisor;
pub mod test_helpers;
