//! A set of helpers for testing

mod alert;
mod channel;
mod repo;
mod subscriber;

pub use alert::{AlertBuilder, NewAlertBuilder};
pub use channel::ScriptedAdapter;
pub use repo::create_test_repo;
pub use subscriber::SubscriberBuilder;
