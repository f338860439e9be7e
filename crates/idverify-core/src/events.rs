//! Audit/telemetry events and the notification collaborator.
//!
//! The audit sink receives a structured record for every issuance,
//! successful match, lockout, and privileged bypass. Delivery of codes to
//! patients is fire-and-forget from the core's perspective: a notification
//! failure is reported to the caller but never rolls back the issued code.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::newtypes::{PatientId, PrincipalId, VerificationCode};
use crate::redaction::RedactedPatient;

// ---------------------------------------------------------------------------
// Audit events
// ---------------------------------------------------------------------------

/// A structured audit record emitted by the verification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A fresh verification code was issued and persisted.
    CodeIssued {
        patient_id: PatientId,
        expires_at: DateTime<Utc>,
        /// Whether delivery to the patient's contact channel succeeded.
        notified: bool,
    },
    /// A submitted code matched the stored code.
    CodeMatched {
        patient_id: PatientId,
        matched_at: DateTime<Utc>,
    },
    /// A failed attempt exhausted the retry budget.
    LockoutReached {
        patient_id: PatientId,
        retry_count: u32,
    },
    /// A privileged caller skipped the matcher entirely.
    VerificationBypassed {
        patient_id: PatientId,
        principal: PrincipalId,
        role: String,
    },
}

/// Receives audit records. Implementations forward them to whatever
/// transport the application uses; the core only guarantees one record per
/// qualifying transition.
pub trait AuditSink {
    /// Accepts one audit record.
    fn record(&self, event: &AuditEvent);
}

impl<T: AuditSink + ?Sized> AuditSink for std::sync::Arc<T> {
    fn record(&self, event: &AuditEvent) {
        (**self).record(event);
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

/// Collects events in memory for assertions and the CLI demo.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: std::sync::Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event.clone());
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// A notification delivery failure. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("notification delivery failed: {message}")]
pub struct NotifyError {
    /// Description of the failure, safe for logs.
    pub message: String,
}

impl NotifyError {
    /// Constructs a [`NotifyError`] from a message string.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Delivers a verification code over the patient's preferred channel.
///
/// Receives the redacted view, not the full record: delivery needs the
/// display name and the contact address, nothing more.
pub trait Notifier {
    /// Sends `code` to the patient.
    fn send_code(&self, recipient: &RedactedPatient, code: &VerificationCode)
    -> Result<(), NotifyError>;
}

/// Accepts and discards every delivery request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn send_code(
        &self,
        _recipient: &RedactedPatient,
        _code: &VerificationCode,
    ) -> Result<(), NotifyError> {
        Ok(())
    }
}
