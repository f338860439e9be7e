//! Shared test helper functions for constructing test fixtures.
//!
//! This module is compiled only in test builds and provides common
//! constructors for [`Patient`] records, audit stamps, and rule contexts
//! used across unit test modules throughout `idverify-core`.
//!
//! Integration tests in `crates/idverify-core/tests/` define their own local
//! helpers because they link against the non-test library build where this
//! module is not available.
#![allow(clippy::expect_used)]

use chrono::{DateTime, TimeZone, Utc};

use crate::enums::NotificationPreference;
use crate::newtypes::{NationalId, PatientId, PrincipalId, VerificationCode};
use crate::patient::{AuditStamp, Demographics, Patient, VerificationState};
use crate::validation::{RuleContext, ValidationConfig};

/// A checksum-valid national identifier used as the default in fixtures.
pub const TEST_NATIONAL_ID: &str = "9434765870";

/// Parses a principal id, panicking on invalid input (test-only).
pub fn principal(s: &str) -> PrincipalId {
    PrincipalId::try_from(s).expect("valid PrincipalId")
}

/// Parses a patient id, panicking on invalid input (test-only).
pub fn patient_id(s: &str) -> PatientId {
    PatientId::try_from(s).expect("valid PatientId")
}

/// Parses a national identifier, panicking on invalid input (test-only).
pub fn national_id(s: &str) -> NationalId {
    NationalId::try_from(s).expect("valid NationalId")
}

/// Parses a verification code, panicking on invalid input (test-only).
pub fn code(s: &str) -> VerificationCode {
    VerificationCode::try_from(s).expect("valid VerificationCode")
}

/// A fixed reference instant shared by fixtures.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

/// Builds a freshly-created patient record: no id, default verification
/// state, audit stamp from `by` at `at`.
pub fn new_patient(by: &str, at: DateTime<Utc>) -> Patient {
    Patient {
        id: None,
        national_id: Some(TEST_NATIONAL_ID.to_owned()),
        demographics: Demographics {
            given_name: "Ada".to_owned(),
            family_name: "Lovelace".to_owned(),
            email: Some("ada@example.org".to_owned()),
            phone: Some("01632 960123".to_owned()),
            ..Demographics::default()
        },
        is_sensitive: false,
        notification_preference: NotificationPreference::Email,
        verification: VerificationState::default(),
        audit: AuditStamp::new(principal(by), at),
        row_version: 0,
    }
}

/// Builds a stored patient record with an assigned id and row version 1.
pub fn stored_patient(id: &str, by: &str, at: DateTime<Utc>) -> Patient {
    let mut patient = new_patient(by, at);
    patient.id = Some(patient_id(id));
    patient.row_version = 1;
    patient
}

/// Builds a rule context with the default configuration.
pub fn ctx(by: &str, now: DateTime<Utc>) -> RuleContext {
    RuleContext {
        principal: principal(by),
        now,
        config: ValidationConfig::default(),
    }
}
