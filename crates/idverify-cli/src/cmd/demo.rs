//! Implementation of `idverify demo`.
//!
//! Wires a [`VerificationService`] from the in-memory store and drives the
//! whole workflow once: lookup against a static directory, record the
//! resolved patient, issue a code, submit a wrong code, submit the right
//! one, and dump the audit trail. Useful as a living example of the public
//! API; nothing here touches real infrastructure.
use std::sync::Arc;

use idverify_core::{
    AuditStamp, Clock, Demographics, LookupCriteria, MemoryStore, NationalId,
    NotificationPreference, NullNotifier, Patient, PatientStore, PrincipalId, RecordingAuditSink,
    ServiceConfig, StaticDirectory, StaticIdentity, SystemClock, VerificationService,
    VerificationState,
};

use crate::error::CliError;

const DEMO_PRINCIPAL: &str = "demo-clerk";
const DEMO_NATIONAL_ID: &str = "9434765870";

fn service_failed(err: impl std::fmt::Display) -> CliError {
    CliError::ServiceFailed {
        detail: err.to_string(),
    }
}

fn demo_patient(principal: PrincipalId) -> Patient {
    Patient {
        id: None,
        national_id: Some(DEMO_NATIONAL_ID.to_owned()),
        demographics: Demographics {
            given_name: "Ada".to_owned(),
            family_name: "Lovelace".to_owned(),
            email: Some("ada@example.org".to_owned()),
            ..Demographics::default()
        },
        is_sensitive: false,
        notification_preference: NotificationPreference::Email,
        verification: VerificationState::default(),
        audit: AuditStamp::new(principal, SystemClock.now()),
        row_version: 0,
    }
}

/// Runs the `demo` command.
pub fn run() -> Result<(), CliError> {
    let principal =
        PrincipalId::try_from(DEMO_PRINCIPAL).map_err(service_failed)?;
    let record = demo_patient(principal.clone());

    let store = Arc::new(MemoryStore::new());
    let audit = Arc::new(RecordingAuditSink::new());
    let mut service = VerificationService::new(
        Arc::clone(&store),
        StaticDirectory::new(vec![record.clone()]),
        SystemClock,
        StaticIdentity::new(principal),
        NullNotifier,
        Arc::clone(&audit),
        ServiceConfig::default(),
    );

    let national = NationalId::try_from(DEMO_NATIONAL_ID).map_err(service_failed)?;
    let redacted = service
        .lookup_patient(&LookupCriteria::ByIdentifier(national))
        .map_err(service_failed)?;
    println!("resolved: {}", redacted.display_name);

    let stored = service.add_record(&record).map_err(service_failed)?;
    let Some(id) = stored.id else {
        return Err(CliError::ServiceFailed {
            detail: "store did not assign an id".to_owned(),
        });
    };
    println!("recorded: {id}");

    let receipt = service.issue_verification_code(&id).map_err(service_failed)?;
    println!("code issued, expires {}", receipt.expires_at);

    // Peek at the stored code the way the patient would read it off their
    // email, then show one failed attempt before the real one.
    let code = store
        .select_by_id(&id)
        .map_err(service_failed)?
        .and_then(|patient| patient.verification.code)
        .ok_or_else(|| CliError::ServiceFailed {
            detail: "no code was stored".to_owned(),
        })?;

    let wrong = if &*code == "XXXXX" { "YYYYY" } else { "XXXXX" };
    let outcome = service.verify_code(&id, wrong, "demo-captcha").map_err(service_failed)?;
    println!("wrong code: {outcome}");

    let outcome = service.verify_code(&id, &code, "demo-captcha").map_err(service_failed)?;
    println!("right code: {outcome}");

    for event in audit.events() {
        match serde_json::to_string(&event) {
            Ok(line) => println!("audit: {line}"),
            Err(err) => return Err(service_failed(err)),
        }
    }

    Ok(())
}
