#![allow(clippy::expect_used)]

use chrono::Duration;

use crate::test_helpers::{ctx, new_patient, stored_patient, t0};

use super::*;

// --- Create mode ---

#[test]
fn clean_create_passes() {
    let patient = new_patient("clerk-1", t0());
    let report = validate_patient(&patient, None, WriteMode::Create, &ctx("clerk-1", t0()));
    assert!(report.is_empty(), "unexpected violations: {report}");
}

#[test]
fn create_with_id_present_fails_aud_c_01() {
    let patient = stored_patient("p-1", "clerk-1", t0());
    let report = validate_patient(&patient, None, WriteMode::Create, &ctx("clerk-1", t0()));
    let on_id: Vec<_> = report.for_field("id").collect();
    assert_eq!(on_id.len(), 1);
    assert_eq!(on_id[0].rule_id, RuleId::AudC01);
}

#[test]
fn create_with_foreign_principals_reports_both_fields() {
    let patient = new_patient("intruder", t0());
    let report = validate_patient(&patient, None, WriteMode::Create, &ctx("clerk-1", t0()));
    // Aggregation: both created_by and updated_by are wrong, and both are
    // reported in a single pass.
    assert_eq!(report.for_field("created_by").count(), 1);
    assert_eq!(report.for_field("updated_by").count(), 1);
    assert_eq!(report.len(), 2);
}

#[test]
fn create_with_diverged_stamps_fails_aud_c_04() {
    let mut patient = new_patient("clerk-1", t0());
    patient.audit.updated_date = t0() + Duration::seconds(10);
    let report = validate_patient(&patient, None, WriteMode::Create, &ctx("clerk-1", t0()));
    assert!(report.violations.iter().any(|v| v.rule_id == RuleId::AudC04));
}

#[test]
fn create_with_stale_stamp_fails_aud_c_05() {
    let patient = new_patient("clerk-1", t0() - Duration::minutes(10));
    let report = validate_patient(&patient, None, WriteMode::Create, &ctx("clerk-1", t0()));
    assert!(report.violations.iter().any(|v| v.rule_id == RuleId::AudC05));
}

#[test]
fn create_stamp_just_inside_tolerance_passes() {
    let patient = new_patient("clerk-1", t0() - Duration::seconds(89));
    let report = validate_patient(&patient, None, WriteMode::Create, &ctx("clerk-1", t0()));
    assert!(report.is_empty(), "unexpected violations: {report}");
}

// --- Modify mode ---

fn modified(base: &crate::patient::Patient) -> crate::patient::Patient {
    let mut candidate = base.clone();
    candidate.audit.updated_date = t0() + Duration::seconds(30);
    candidate
}

#[test]
fn clean_modify_passes() {
    let stored = stored_patient("p-1", "clerk-1", t0());
    let candidate = modified(&stored);
    let report = validate_patient(
        &candidate,
        Some(&stored),
        WriteMode::Modify,
        &ctx("clerk-1", t0() + Duration::seconds(30)),
    );
    assert!(report.is_empty(), "unexpected violations: {report}");
}

#[test]
fn modify_with_equal_stamps_fails_on_updated_date() {
    let stored = stored_patient("p-1", "clerk-1", t0());
    // Candidate still carries updated_date == created_date.
    let candidate = stored.clone();
    let report = validate_patient(&candidate, Some(&stored), WriteMode::Modify, &ctx("clerk-1", t0()));
    let on_updated: Vec<_> = report.for_field("updated_date").collect();
    assert!(
        on_updated
            .iter()
            .any(|v| v.rule_id == RuleId::AudM03 && v.message.contains("differ from created_date")),
        "expected AUD-M-03 against updated_date, got: {report}"
    );
}

#[test]
fn modify_without_id_fails_aud_m_01() {
    let stored = stored_patient("p-1", "clerk-1", t0());
    let mut candidate = modified(&stored);
    candidate.id = None;
    let report = validate_patient(
        &candidate,
        Some(&stored),
        WriteMode::Modify,
        &ctx("clerk-1", t0() + Duration::seconds(30)),
    );
    assert!(report.violations.iter().any(|v| v.rule_id == RuleId::AudM01));
}

#[test]
fn modify_with_swapped_id_fails_aud_m_02() {
    let stored = stored_patient("p-1", "clerk-1", t0());
    let mut candidate = modified(&stored);
    candidate.id = Some(crate::test_helpers::patient_id("p-2"));
    let report = validate_patient(
        &candidate,
        Some(&stored),
        WriteMode::Modify,
        &ctx("clerk-1", t0() + Duration::seconds(30)),
    );
    let on_id: Vec<_> = report.for_field("id").collect();
    assert_eq!(on_id.len(), 1);
    assert_eq!(on_id[0].rule_id, RuleId::AudM02);
}

#[test]
fn modify_with_unchanged_updated_date_fails_aud_m_04() {
    let stored = {
        let mut patient = stored_patient("p-1", "clerk-1", t0());
        patient.audit.updated_date = t0() + Duration::seconds(30);
        patient
    };
    // Candidate reuses the stored updated_date instead of advancing it.
    let candidate = stored.clone();
    let report = validate_patient(
        &candidate,
        Some(&stored),
        WriteMode::Modify,
        &ctx("clerk-1", t0() + Duration::seconds(30)),
    );
    assert!(report.violations.iter().any(|v| v.rule_id == RuleId::AudM04));
}

#[test]
fn modify_with_tampered_creation_fields_reports_each_field() {
    let stored = stored_patient("p-1", "clerk-1", t0());
    let mut candidate = modified(&stored);
    candidate.audit.created_by = crate::test_helpers::principal("someone-else");
    candidate.audit.created_date = t0() - Duration::days(1);
    let report = validate_patient(
        &candidate,
        Some(&stored),
        WriteMode::Modify,
        &ctx("clerk-1", t0() + Duration::seconds(30)),
    );
    // Each immutable field is reported individually, not as one generic error.
    assert_eq!(report.for_field("created_by").count(), 1);
    assert_eq!(report.for_field("created_date").count(), 1);
}

#[test]
fn modify_by_foreign_principal_fails_aud_m_08() {
    let stored = stored_patient("p-1", "clerk-1", t0());
    let mut candidate = modified(&stored);
    candidate.audit.updated_by = crate::test_helpers::principal("clerk-2");
    let report = validate_patient(
        &candidate,
        Some(&stored),
        WriteMode::Modify,
        &ctx("clerk-1", t0() + Duration::seconds(30)),
    );
    assert!(report.violations.iter().any(|v| v.rule_id == RuleId::AudM08));
}

// --- Field rules ---

#[test]
fn empty_names_fail_both_required_rules() {
    let mut patient = new_patient("clerk-1", t0());
    patient.demographics.given_name = "  ".to_owned();
    patient.demographics.family_name.clear();
    let report = validate_patient(&patient, None, WriteMode::Create, &ctx("clerk-1", t0()));
    assert!(report.violations.iter().any(|v| v.rule_id == RuleId::Fld01));
    assert!(report.violations.iter().any(|v| v.rule_id == RuleId::Fld02));
}

#[test]
fn oversize_fields_report_under_fld_03() {
    let mut patient = new_patient("clerk-1", t0());
    patient.demographics.given_name = "a".repeat(71);
    patient.demographics.email = Some(format!("{}@example.org", "x".repeat(260)));
    let report = validate_patient(&patient, None, WriteMode::Create, &ctx("clerk-1", t0()));
    let lengths: Vec<_> = report
        .violations
        .iter()
        .filter(|v| v.rule_id == RuleId::Fld03)
        .collect();
    assert_eq!(lengths.len(), 2);
}

#[test]
fn bad_national_id_fails_fld_04() {
    let mut patient = new_patient("clerk-1", t0());
    patient.national_id = Some("9434765871".to_owned());
    let report = validate_patient(&patient, None, WriteMode::Create, &ctx("clerk-1", t0()));
    let on_field: Vec<_> = report.for_field("national_id").collect();
    assert_eq!(on_field.len(), 1);
    assert_eq!(on_field[0].rule_id, RuleId::Fld04);
}

#[test]
fn absent_national_id_is_not_a_violation() {
    let mut patient = new_patient("clerk-1", t0());
    patient.national_id = None;
    let report = validate_patient(&patient, None, WriteMode::Create, &ctx("clerk-1", t0()));
    assert!(report.is_empty(), "unexpected violations: {report}");
}

#[test]
fn retry_count_over_bound_fails_fld_05() {
    let mut patient = new_patient("clerk-1", t0());
    patient.verification.retry_count = 6;
    let report = validate_patient(&patient, None, WriteMode::Create, &ctx("clerk-1", t0()));
    assert!(report.violations.iter().any(|v| v.rule_id == RuleId::Fld05));
}

// --- Aggregation and report shape ---

#[test]
fn rules_never_short_circuit() {
    let mut patient = stored_patient("p-1", "intruder", t0() - Duration::hours(1));
    patient.demographics.given_name.clear();
    patient.national_id = Some("1234567890".to_owned());
    let report = validate_patient(&patient, None, WriteMode::Create, &ctx("clerk-1", t0()));
    // id present + both principals wrong + stale stamp + empty name + bad
    // identifier: all of it lands in one report.
    assert!(report.len() >= 5, "expected at least 5 violations: {report}");
}

#[test]
fn by_field_groups_preserve_first_seen_order() {
    let report = ValidationReport::from_violations(vec![
        FieldViolation::new(RuleId::AudC02, "created_by", "first"),
        FieldViolation::new(RuleId::AudC04, "updated_date", "second"),
        FieldViolation::new(RuleId::AudC03, "created_by", "third"),
    ]);
    let grouped = report.by_field();
    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped[0].0, "created_by");
    assert_eq!(grouped[0].1.len(), 2);
    assert_eq!(grouped[1].0, "updated_date");
}

#[test]
fn report_serialises_rule_codes() {
    let report = ValidationReport::from_violations(vec![FieldViolation::new(
        RuleId::AudM06,
        "created_by",
        "immutable",
    )]);
    let json = serde_json::to_string(&report).expect("serialize");
    assert!(json.contains("\"AUD-M-06\""), "{json}");
}

#[test]
fn empty_report_display() {
    let report = ValidationReport::new();
    assert_eq!(report.to_string(), "0 violation(s)");
    assert!(report.is_empty());
}

#[test]
fn registry_orders_audit_rules_before_field_rules() {
    let registry = build_patient_registry(WriteMode::Create);
    let codes: Vec<&str> = registry.iter().map(|r| r.id().code()).collect();
    assert_eq!(
        codes,
        vec![
            "AUD-C-01", "AUD-C-02", "AUD-C-03", "AUD-C-04", "AUD-C-05", "FLD-01", "FLD-02",
            "FLD-03", "FLD-04", "FLD-05",
        ]
    );
}
