//! Notification transports.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A notification transport with its own delivery semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// The in-app feed polled by the web client.
    Web,
    /// Short message service.
    Sms,
    /// WhatsApp message.
    #[serde(rename = "whatsapp")]
    WhatsApp,
    /// USSD push session.
    Ussd,
}

impl Channel {
    /// Every channel, in a fixed order.
    pub const ALL: [Channel; 4] = [Channel::Web, Channel::Sms, Channel::WhatsApp, Channel::Ussd];

    /// Storage and configuration name.
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Web => "web",
            Channel::Sms => "sms",
            Channel::WhatsApp => "whatsapp",
            Channel::Ussd => "ussd",
        }
    }

    /// Parses the storage name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "web" => Some(Channel::Web),
            "sms" => Some(Channel::Sms),
            "whatsapp" => Some(Channel::WhatsApp),
            "ussd" => Some(Channel::Ussd),
            _ => None,
        }
    }

    /// Whether messages go to the subscriber's phone number.
    pub fn uses_phone(self) -> bool {
        !matches!(self, Channel::Web)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
