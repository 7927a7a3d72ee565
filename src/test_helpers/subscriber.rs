//! A builder for creating `Subscriber` instances in tests.

use crate::models::{Channel, GeoPoint, Severity, Subscriber};

/// A builder for creating `Subscriber` instances in tests.
pub struct SubscriberBuilder {
    subscriber: Subscriber,
}

impl SubscriberBuilder {
    /// Creates a web-only subscriber without location or region.
    pub fn new(id: &str) -> Self {
        Self {
            subscriber: Subscriber {
                id: id.to_string(),
                name: None,
                location: None,
                region_id: None,
                phone_number: None,
                channels: vec![Channel::Web],
                min_severity: Severity::Low,
            },
        }
    }

    /// Sets the farm location.
    pub fn location(mut self, lat: f64, lon: f64) -> Self {
        self.subscriber.location = Some(GeoPoint::new(lat, lon));
        self
    }

    /// Sets the declared region.
    pub fn region(mut self, region_id: &str) -> Self {
        self.subscriber.region_id = Some(region_id.to_string());
        self
    }

    /// Sets the phone number.
    pub fn phone(mut self, phone_number: &str) -> Self {
        self.subscriber.phone_number = Some(phone_number.to_string());
        self
    }

    /// Replaces the enabled channels.
    pub fn channels(mut self, channels: Vec<Channel>) -> Self {
        self.subscriber.channels = channels;
        self
    }

    /// Sets the minimum severity.
    pub fn min_severity(mut self, min_severity: Severity) -> Self {
        self.subscriber.min_severity = min_severity;
        self
    }

    /// Builds the `Subscriber` instance.
    pub fn build(self) -> Subscriber {
        self.subscriber
    }
}
