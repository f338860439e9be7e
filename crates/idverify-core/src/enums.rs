//! Closed enumerations shared across the crate.
use std::fmt;

use serde::{Deserialize, Serialize};

/// The channel a patient has chosen for receiving verification codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPreference {
    /// No automated contact; codes must be delivered out of band.
    None,
    /// Deliver to the record's email address.
    Email,
    /// Deliver to the record's phone number via SMS.
    Sms,
}

impl NotificationPreference {
    /// Label for structured logging and audit payloads.
    pub fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Email => "email",
            Self::Sms => "sms",
        }
    }
}

impl fmt::Display for NotificationPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
