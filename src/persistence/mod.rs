//! Durable state for alerts, subscribers, deliveries and read tracking.

pub mod error;
pub mod sqlite;
pub mod traits;

pub use error::PersistenceError;
pub use sqlite::SqliteStateRepository;
pub use traits::{
    AlertStore, DeliveryStore, ReadStateStore, Retirement, StateRepository, SubscriberStore,
};
