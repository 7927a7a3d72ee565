//! This module contains the data models for the ukame engine.

pub mod alert;
pub mod channel;
pub mod delivery;
pub mod geo;
pub mod read_state;
pub mod region;
pub mod severity;
pub mod signal;
pub mod subscriber;

pub use alert::{Alert, AlertSource, AlertStatus, NewAlert};
pub use channel::Channel;
pub use delivery::{DeliveryAttempt, DeliveryKey, DeliveryState};
pub use geo::GeoPoint;
pub use read_state::{ReadState, ReadStatus};
pub use region::Region;
pub use severity::Severity;
pub use signal::{HazardSignal, MetricKind};
pub use subscriber::Subscriber;
