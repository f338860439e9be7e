//! Redaction of resolved patient records.
//!
//! A successful lookup must not hand the full stored record back to the
//! caller: downstream consumers of the verification workflow only need the
//! identifier, a display name, and the contact channel that matches the
//! patient's notification preference. Everything else — full demographics,
//! verification-code state, audit bookkeeping — is stripped here.
use serde::{Deserialize, Serialize};

use crate::enums::NotificationPreference;
use crate::newtypes::PatientId;
use crate::patient::Patient;

/// The minimum view of a resolved patient returned to verification callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactedPatient {
    /// Stable internal identifier, when the record has been persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<PatientId>,
    /// The national identifier, kept so the caller can confirm which record
    /// was resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    /// `"Given Family"` presentation name.
    pub display_name: String,
    /// The channel a code would be delivered on.
    pub notification_preference: NotificationPreference,
    /// The address for that channel, when one is on record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

/// Strips a resolved record down to the fields the verification workflow
/// needs.
///
/// The contact value follows the notification preference: the email address
/// for [`NotificationPreference::Email`], the phone number for
/// [`NotificationPreference::Sms`], nothing for
/// [`NotificationPreference::None`]. The unused channel is dropped with the
/// rest of the demographics.
pub fn redact(patient: &Patient) -> RedactedPatient {
    let contact = match patient.notification_preference {
        NotificationPreference::Email => patient.demographics.email.clone(),
        NotificationPreference::Sms => patient.demographics.phone.clone(),
        NotificationPreference::None => None,
    };

    RedactedPatient {
        id: patient.id.clone(),
        national_id: patient.national_id.clone(),
        display_name: patient.display_name(),
        notification_preference: patient.notification_preference,
        contact,
    }
}
