#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod check_digits;
pub mod clock;
pub mod enums;
pub mod events;
pub mod identity;
pub mod lookup;
pub mod newtypes;
pub mod patient;
pub mod redaction;
pub mod service;
pub mod store;
pub mod validation;
pub mod verification;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use check_digits::is_valid_national_identifier;
pub use clock::{Clock, FixedClock, SystemClock};
pub use enums::NotificationPreference;
pub use events::{
    AuditEvent, AuditSink, Notifier, NotifyError, NullAuditSink, NullNotifier, RecordingAuditSink,
};
pub use identity::{IdentityContext, StaticIdentity};
pub use lookup::{
    DemographicQuery, DemographicsDirectory, DirectoryError, LookupCriteria, LookupError,
    StaticDirectory, resolve_patient,
};
pub use newtypes::{NationalId, NewtypeError, PatientId, PrincipalId, VerificationCode};
pub use patient::{AuditStamp, Audited, Demographics, Patient, VerificationState};
pub use redaction::{RedactedPatient, redact};
pub use service::{
    BusinessRuleViolation, DependencyConflict, IssueReceipt, ServiceConfig, ServiceError,
    VerificationService,
};
pub use store::{MemoryStore, PatientStore, StoreError};
pub use validation::{
    FieldViolation, RuleContext, RuleId, ValidationConfig, ValidationReport, ValidationRule,
    WriteMode, build_patient_registry, run_rules, validate_patient,
};
pub use verification::{
    CODE_ALPHABET, CODE_LENGTH, IssueRefusal, MatchOutcome, VerificationPolicy, generate_code,
    issue, match_submission, reset_verification,
};

/// Returns the current version of the idverify-core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
