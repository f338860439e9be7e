use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::NotificationPreference;
use crate::newtypes::{PatientId, PrincipalId, VerificationCode};

/// Creation/modification bookkeeping carried by every auditable entity.
///
/// The audit-invariant rules in [`crate::validation::rules_audit`] compare
/// these fields against the acting principal, the injected clock, and the
/// previously stored version of the record. `created_by` and `created_date`
/// are immutable after creation; `updated_by`/`updated_date` must track
/// every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamp {
    /// Principal that created the record. Never changes after creation.
    pub created_by: PrincipalId,
    /// Timestamp of creation. Never changes after creation.
    pub created_date: DateTime<Utc>,
    /// Principal responsible for the most recent write.
    pub updated_by: PrincipalId,
    /// Timestamp of the most recent write.
    pub updated_date: DateTime<Utc>,
}

impl AuditStamp {
    /// Builds the stamp for a brand-new record: both principal fields set to
    /// `principal`, both timestamps set to `now`.
    pub fn new(principal: PrincipalId, now: DateTime<Utc>) -> Self {
        Self {
            created_by: principal.clone(),
            created_date: now,
            updated_by: principal,
            updated_date: now,
        }
    }

    /// Returns a copy with `updated_by`/`updated_date` advanced for a
    /// subsequent write. Creation fields are carried over untouched.
    pub fn touched(&self, principal: PrincipalId, now: DateTime<Utc>) -> Self {
        Self {
            created_by: self.created_by.clone(),
            created_date: self.created_date,
            updated_by: principal,
            updated_date: now,
        }
    }
}

/// Access to audit bookkeeping, implemented by every tracked entity.
///
/// The audit-invariant rule set is generic over this trait, so the same
/// rules validate any entity the system persists, not just [`Patient`].
pub trait Audited {
    /// The record's stable identifier, if one has been assigned.
    fn record_id(&self) -> Option<&str>;

    /// The record's audit bookkeeping fields.
    fn audit(&self) -> &AuditStamp;
}

/// Demographic details held on a patient record.
///
/// Beyond the two name fields these are opaque to the verification core;
/// they matter only as search keys for detail-based lookup and as the
/// source of the contact channel for code delivery.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Demographics {
    pub given_name: String,
    pub family_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// One-time verification code state.
///
/// The matcher's states are implicit in these fields: a code is
/// usable only while `code_expires_at` is in the future and
/// `code_matched_at` is unset; `retry_count` counts failed attempts up to
/// the configured maximum, at which point the record is locked.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VerificationState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<VerificationCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_matched_at: Option<DateTime<Utc>>,
    pub retry_count: u32,
}

/// A patient record tracked by the verification core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Patient {
    /// Stable internal identifier. Absent until assigned by the store on
    /// first insert; immutable afterwards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<PatientId>,

    /// 10-digit national health identifier. Kept as a raw string on the
    /// stored record so the `FLD-04` rule can report a checksum violation
    /// instead of rejecting the payload at parse time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,

    pub demographics: Demographics,

    /// Flagged records are refused by lookup before any further processing.
    #[serde(default)]
    pub is_sensitive: bool,

    pub notification_preference: NotificationPreference,

    #[serde(default)]
    pub verification: VerificationState,

    pub audit: AuditStamp,

    /// Optimistic-concurrency stamp, incremented by the store on every
    /// successful update.
    #[serde(default)]
    pub row_version: u64,
}

impl Patient {
    /// `"Given Family"` presentation form used by redaction and notification.
    pub fn display_name(&self) -> String {
        let given = self.demographics.given_name.trim();
        let family = self.demographics.family_name.trim();
        match (given.is_empty(), family.is_empty()) {
            (false, false) => format!("{given} {family}"),
            (false, true) => given.to_owned(),
            (true, _) => family.to_owned(),
        }
    }
}

impl Audited for Patient {
    fn record_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn audit(&self) -> &AuditStamp {
        &self.audit
    }
}
