/// FLD-01 through FLD-05: patient field rules.
///
/// Concrete rules over [`Patient`] covering required-field presence,
/// per-field maximum lengths, the national-identifier checksum, and the
/// retry-counter bound. Run in both write modes, after the audit rules.
use crate::check_digits::is_valid_national_identifier;
use crate::patient::Patient;

use super::{FieldViolation, RuleContext, RuleId, ValidationRule};

/// FLD-01 — given name present and non-empty.
pub struct GivenNameRequired;

impl ValidationRule<Patient> for GivenNameRequired {
    fn id(&self) -> RuleId {
        RuleId::Fld01
    }

    fn check(
        &self,
        candidate: &Patient,
        _existing: Option<&Patient>,
        _ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    ) {
        if candidate.demographics.given_name.trim().is_empty() {
            out.push(FieldViolation::new(
                RuleId::Fld01,
                "given_name",
                "given name is required",
            ));
        }
    }
}

/// FLD-02 — family name present and non-empty.
pub struct FamilyNameRequired;

impl ValidationRule<Patient> for FamilyNameRequired {
    fn id(&self) -> RuleId {
        RuleId::Fld02
    }

    fn check(
        &self,
        candidate: &Patient,
        _existing: Option<&Patient>,
        _ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    ) {
        if candidate.demographics.family_name.trim().is_empty() {
            out.push(FieldViolation::new(
                RuleId::Fld02,
                "family_name",
                "family name is required",
            ));
        }
    }
}

/// FLD-03 — per-field maximum lengths.
///
/// One violation per offending field, all under the same rule id, so a
/// record with several oversize fields reports each of them in one pass.
pub struct FieldLengths;

impl FieldLengths {
    fn check_len(
        field: &'static str,
        value: &str,
        max: usize,
        out: &mut Vec<FieldViolation>,
    ) {
        let len = value.chars().count();
        if len > max {
            out.push(FieldViolation::new(
                RuleId::Fld03,
                field,
                format!("{field} is {len} characters; the maximum is {max}"),
            ));
        }
    }
}

impl ValidationRule<Patient> for FieldLengths {
    fn id(&self) -> RuleId {
        RuleId::Fld03
    }

    fn check(
        &self,
        candidate: &Patient,
        _existing: Option<&Patient>,
        ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    ) {
        let demographics = &candidate.demographics;
        let config = &ctx.config;
        Self::check_len("given_name", &demographics.given_name, config.max_name_len, out);
        Self::check_len("family_name", &demographics.family_name, config.max_name_len, out);
        if let Some(email) = &demographics.email {
            Self::check_len("email", email, config.max_email_len, out);
        }
        if let Some(phone) = &demographics.phone {
            Self::check_len("phone", phone, config.max_phone_len, out);
        }
        if let Some(postcode) = &demographics.postcode {
            Self::check_len("postcode", postcode, config.max_postcode_len, out);
        }
    }
}

/// FLD-04 — national identifier, when present, passes the mod-11 checksum.
pub struct NationalIdChecksum;

impl ValidationRule<Patient> for NationalIdChecksum {
    fn id(&self) -> RuleId {
        RuleId::Fld04
    }

    fn check(
        &self,
        candidate: &Patient,
        _existing: Option<&Patient>,
        _ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    ) {
        if let Some(national_id) = &candidate.national_id {
            if !is_valid_national_identifier(national_id) {
                out.push(FieldViolation::new(
                    RuleId::Fld04,
                    "national_id",
                    format!("\"{national_id}\" is not a checksum-valid national identifier"),
                ));
            }
        }
    }
}

/// FLD-05 — retry count within the configured bound.
pub struct RetryCountBounded;

impl ValidationRule<Patient> for RetryCountBounded {
    fn id(&self) -> RuleId {
        RuleId::Fld05
    }

    fn check(
        &self,
        candidate: &Patient,
        _existing: Option<&Patient>,
        ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    ) {
        let retry_count = candidate.verification.retry_count;
        if retry_count > ctx.config.max_retry_count {
            out.push(FieldViolation::new(
                RuleId::Fld05,
                "retry_count",
                format!(
                    "retry_count {retry_count} exceeds the configured maximum {}",
                    ctx.config.max_retry_count
                ),
            ));
        }
    }
}
