//! Alert recipients.

use serde::{Deserialize, Serialize};

use super::{channel::Channel, geo::GeoPoint, severity::Severity};
use crate::loader::{Loadable, LoaderError};

/// A user who receives alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Identifier owned by the profile service.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Farm location. `None` disables radius checks for this subscriber.
    #[serde(default)]
    pub location: Option<GeoPoint>,
    /// Declared home region.
    #[serde(default)]
    pub region_id: Option<String>,
    /// Destination for SMS, WhatsApp and USSD.
    #[serde(default)]
    pub phone_number: Option<String>,
    /// Enabled transports.
    #[serde(default = "default_channels")]
    pub channels: Vec<Channel>,
    /// Alerts below this severity are not relevant to the subscriber.
    #[serde(default)]
    pub min_severity: Severity,
}

fn default_channels() -> Vec<Channel> {
    vec![Channel::Web]
}

impl Subscriber {
    /// Where to send a notification on `channel`, if the subscriber can be
    /// reached there.
    pub fn destination(&self, channel: Channel) -> Option<String> {
        if channel.uses_phone() {
            self.phone_number.as_ref().filter(|p| !p.trim().is_empty()).cloned()
        } else {
            Some(self.id.clone())
        }
    }

    /// Enabled channels without duplicates, in a stable order.
    pub fn enabled_channels(&self) -> Vec<Channel> {
        let mut channels = self.channels.clone();
        channels.sort();
        channels.dedup();
        channels
    }
}

impl Loadable for Subscriber {
    type Error = LoaderError;

    const KEY: &'static str = "subscribers";

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&mut self) -> Result<(), Self::Error> {
        if self.id.trim().is_empty() {
            return Err(LoaderError::ValidationError("Subscriber id cannot be empty".into()));
        }
        if let Some(location) = &self.location
            && !location.is_valid()
        {
            return Err(LoaderError::ValidationError(format!(
                "Subscriber {} has an out-of-range location ({}, {})",
                self.id, location.lat, location.lon
            )));
        }
        self.channels = self.enabled_channels();
        Ok(())
    }
}
