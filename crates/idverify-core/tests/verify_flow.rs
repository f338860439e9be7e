//! Integration tests for the full verification flow.
//!
//! Each test wires a [`VerificationService`] from the in-memory store, a
//! pinned clock, a seeded random source, and a static directory, then drives
//! the public operations end to end: lookup → record → issue → verify,
//! including the lockout, bypass, and concurrency-conflict paths.
#![allow(clippy::expect_used)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;

use idverify_core::{
    AuditEvent, AuditStamp, BusinessRuleViolation, Demographics, DependencyConflict, FixedClock,
    LookupCriteria, MatchOutcome, MemoryStore, NationalId, NotificationPreference, Patient,
    PatientId, PatientStore, PrincipalId, RecordingAuditSink, ServiceConfig, ServiceError,
    StaticDirectory, StaticIdentity, VerificationService, VerificationState,
};

const CLERK: &str = "clerk-1";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

fn principal(s: &str) -> PrincipalId {
    PrincipalId::try_from(s).expect("valid PrincipalId")
}

fn ada(by: &str, at: DateTime<Utc>) -> Patient {
    Patient {
        id: None,
        national_id: Some("9434765870".to_owned()),
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

struct Flow {
    store: Arc<MemoryStore>,
    clock: Arc<FixedClock>,
    audit: Arc<RecordingAuditSink>,
    service: VerificationService<
        Arc<MemoryStore>,
        StaticDirectory,
        Arc<FixedClock>,
        StaticIdentity,
        idverify_core::NullNotifier,
        Arc<RecordingAuditSink>,
    >,
}

fn flow_with(identity: StaticIdentity, directory: StaticDirectory) -> Flow {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(t0()));
    let audit = Arc::new(RecordingAuditSink::new());
    let service = VerificationService::with_rng(
        Arc::clone(&store),
        directory,
        Arc::clone(&clock),
        identity,
        idverify_core::NullNotifier,
        Arc::clone(&audit),
        ServiceConfig::default(),
        StdRng::seed_from_u64(2026),
    );
    Flow {
        store,
        clock,
        audit,
        service,
    }
}

fn flow() -> Flow {
    flow_with(
        StaticIdentity::new(principal(CLERK)),
        StaticDirectory::new(vec![ada(CLERK, t0())]),
    )
}

fn fetch(flow: &Flow, id: &PatientId) -> Patient {
    flow.store
        .select_by_id(id)
        .expect("select")
        .expect("record present")
}

#[test]
fn lookup_record_issue_verify_happy_path() {
    let mut flow = flow();

    // Resolve via the external directory by national identifier; the caller
    // only ever sees the redacted view.
    let national = NationalId::try_from("943 476 5870").expect("valid NationalId");
    let redacted = flow
        .service
        .lookup_patient(&LookupCriteria::ByIdentifier(national))
        .expect("lookup");
    assert_eq!(redacted.display_name, "Ada Lovelace");
    assert_eq!(redacted.contact.as_deref(), Some("ada@example.org"));

    // Record the resolved patient, then issue a code.
    let stored = flow.service.add_record(&ada(CLERK, t0())).expect("add_record");
    let id = stored.id.expect("assigned id");
    let receipt = flow.service.issue_verification_code(&id).expect("issue");
    assert_eq!(receipt.expires_at, t0() + Duration::minutes(30));
    assert!(receipt.notified);

    // The patient reads the code off their email and submits it lower-case.
    let code = fetch(&flow, &id).verification.code.expect("code stored");
    flow.clock.advance(Duration::minutes(10));
    let outcome = flow
        .service
        .verify_code(&id, &code.to_lowercase(), "captcha-token")
        .expect("verify");
    assert_eq!(outcome, MatchOutcome::Matched);

    let after = fetch(&flow, &id);
    assert_eq!(
        after.verification.code_matched_at,
        Some(t0() + Duration::minutes(10))
    );
    assert_eq!(after.verification.retry_count, 0);

    let events = flow.audit.events();
    assert!(matches!(events[0], AuditEvent::CodeIssued { .. }));
    assert!(matches!(events[1], AuditEvent::CodeMatched { .. }));
}

#[test]
fn reissue_is_refused_until_the_first_code_expires() {
    let mut flow = flow();
    let id = flow
        .service
        .add_record(&ada(CLERK, t0()))
        .expect("add_record")
        .id
        .expect("id");

    flow.service.issue_verification_code(&id).expect("first issue");
    let refused = flow.service.issue_verification_code(&id).err().expect("refused");
    assert!(matches!(
        refused,
        ServiceError::BusinessRule(BusinessRuleViolation::OutstandingCode { .. })
    ));

    // Once the TTL has elapsed a new code goes out.
    flow.clock.advance(Duration::minutes(31));
    flow.service.issue_verification_code(&id).expect("reissue");
}

#[test]
fn brute_force_attempts_end_in_lockout() {
    let mut flow = flow();
    let id = flow
        .service
        .add_record(&ada(CLERK, t0()))
        .expect("add_record")
        .id
        .expect("id");
    flow.service.issue_verification_code(&id).expect("issue");
    let correct = fetch(&flow, &id).verification.code.expect("code stored");
    let wrong = if &*correct == "QQQQQ" { "WWWWW" } else { "QQQQQ" };

    for attempt in 1..=5u32 {
        let outcome = flow
            .service
            .verify_code(&id, wrong, "captcha-token")
            .expect("verify");
        assert_eq!(outcome, MatchOutcome::Incorrect, "attempt {attempt}");
    }

    // Budget spent: the correct code no longer helps, and issuing a fresh
    // code is refused until an administrative reset.
    let outcome = flow
        .service
        .verify_code(&id, &correct, "captcha-token")
        .expect("verify");
    assert_eq!(outcome, MatchOutcome::LockedOut);
    assert!(matches!(
        flow.service.issue_verification_code(&id).err(),
        Some(ServiceError::BusinessRule(
            BusinessRuleViolation::VerificationLocked { retry_count: 5 }
        ))
    ));

    flow.service.reset_verification_state(&id).expect("reset");
    flow.service.issue_verification_code(&id).expect("issue after reset");

    let lockouts = flow
        .audit
        .events()
        .into_iter()
        .filter(|event| matches!(event, AuditEvent::LockoutReached { .. }))
        .count();
    assert_eq!(lockouts, 1);
}

#[test]
fn privileged_caller_bypasses_stored_code_state() {
    let identity = StaticIdentity::new(principal("agent-7")).with_role("verification-bypass");
    let flow = flow_with(identity, StaticDirectory::default());
    let id = flow
        .service
        .add_record(&ada("agent-7", t0()))
        .expect("add_record")
        .id
        .expect("id");

    let outcome = flow
        .service
        .verify_code(&id, "whatever", "no-captcha-needed")
        .expect("bypass");
    assert_eq!(outcome, MatchOutcome::Matched);

    // Stored verification state was never consulted or mutated.
    let after = fetch(&flow, &id);
    assert_eq!(after.verification, VerificationState::default());
    assert!(matches!(
        flow.audit.events().as_slice(),
        [AuditEvent::VerificationBypassed { .. }]
    ));
}

#[test]
fn racing_writers_surface_a_concurrency_conflict() {
    let flow = flow();
    let stored = flow.service.add_record(&ada(CLERK, t0())).expect("add_record");
    flow.clock.advance(Duration::seconds(30));
    let now = t0() + Duration::seconds(30);

    let mut first = stored.clone();
    first.demographics.postcode = Some("AB1 2CD".to_owned());
    first.audit = stored.audit.touched(principal(CLERK), now);
    flow.service.modify_record(&first).expect("first writer wins");

    let mut second = stored.clone();
    second.demographics.postcode = Some("ZZ9 9ZZ".to_owned());
    second.audit = stored.audit.touched(principal(CLERK), now + Duration::seconds(1));
    flow.clock.advance(Duration::seconds(1));
    let err = flow.service.modify_record(&second).err().expect("conflict");
    assert!(matches!(
        err,
        ServiceError::DependencyValidation(DependencyConflict::Concurrency)
    ));

    // The loser's write left no trace.
    let after = fetch(&flow, stored.id.as_ref().expect("id"));
    assert_eq!(after.demographics.postcode.as_deref(), Some("AB1 2CD"));
}

#[test]
fn ambiguous_directory_results_never_guess() {
    let twin_a = ada(CLERK, t0());
    let mut twin_b = ada(CLERK, t0());
    twin_b.national_id = None;
    let flow = flow_with(
        StaticIdentity::new(principal(CLERK)),
        StaticDirectory::new(vec![twin_a, twin_b]),
    );

    let criteria = LookupCriteria::ByDetails(idverify_core::DemographicQuery {
        family_name: Some("Lovelace".to_owned()),
        ..idverify_core::DemographicQuery::default()
    });
    let err = flow.service.lookup_patient(&criteria).err().expect("ambiguous");
    assert!(matches!(
        err,
        ServiceError::BusinessRule(BusinessRuleViolation::AmbiguousMatch { count: 2 })
    ));
}
