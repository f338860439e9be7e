/// AUD-C-01 through AUD-M-08: audit-invariant rules for auditable entities.
///
/// These rules enforce the creation/modification bookkeeping invariants on
/// every tracked entity. Each rule is a stateless struct implementing
/// [`crate::validation::ValidationRule`], generic over
/// [`crate::patient::Audited`] so the same rule set validates any entity
/// the system persists. All rules collect every violation without early
/// exit.
///
/// Modify-mode comparison rules receive the stored record as `existing`;
/// when it is `None` they skip silently, because a missing stored record is
/// reported as not-found before the registry runs.
use crate::patient::Audited;

use super::{FieldViolation, RuleContext, RuleId, ValidationRule, within_tolerance};

// ---------------------------------------------------------------------------
// Create mode
// ---------------------------------------------------------------------------

/// AUD-C-01 — on create, the record identifier must be absent.
///
/// Identifiers are assigned by the storage layer on first insert; a caller
/// that supplies one is either replaying a stored record or guessing keys.
pub struct CreateIdAbsent;

impl<T: Audited> ValidationRule<T> for CreateIdAbsent {
    fn id(&self) -> RuleId {
        RuleId::AudC01
    }

    fn check(
        &self,
        candidate: &T,
        _existing: Option<&T>,
        _ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    ) {
        if let Some(id) = candidate.record_id() {
            out.push(FieldViolation::new(
                RuleId::AudC01,
                "id",
                format!("identifier \"{id}\" must not be supplied on create"),
            ));
        }
    }
}

/// AUD-C-02 — on create, `created_by` must equal the acting principal.
pub struct CreateCreatedByPrincipal;

impl<T: Audited> ValidationRule<T> for CreateCreatedByPrincipal {
    fn id(&self) -> RuleId {
        RuleId::AudC02
    }

    fn check(
        &self,
        candidate: &T,
        _existing: Option<&T>,
        ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    ) {
        let created_by = &candidate.audit().created_by;
        if created_by != &ctx.principal {
            out.push(FieldViolation::new(
                RuleId::AudC02,
                "created_by",
                format!(
                    "created_by \"{created_by}\" does not match the acting principal \"{}\"",
                    ctx.principal
                ),
            ));
        }
    }
}

/// AUD-C-03 — on create, `updated_by` must equal the acting principal.
pub struct CreateUpdatedByPrincipal;

impl<T: Audited> ValidationRule<T> for CreateUpdatedByPrincipal {
    fn id(&self) -> RuleId {
        RuleId::AudC03
    }

    fn check(
        &self,
        candidate: &T,
        _existing: Option<&T>,
        ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    ) {
        let updated_by = &candidate.audit().updated_by;
        if updated_by != &ctx.principal {
            out.push(FieldViolation::new(
                RuleId::AudC03,
                "updated_by",
                format!(
                    "updated_by \"{updated_by}\" does not match the acting principal \"{}\"",
                    ctx.principal
                ),
            ));
        }
    }
}

/// AUD-C-04 — on create, `created_date` must equal `updated_date`.
pub struct CreateStampsEqual;

impl<T: Audited> ValidationRule<T> for CreateStampsEqual {
    fn id(&self) -> RuleId {
        RuleId::AudC04
    }

    fn check(
        &self,
        candidate: &T,
        _existing: Option<&T>,
        _ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    ) {
        let audit = candidate.audit();
        if audit.created_date != audit.updated_date {
            out.push(FieldViolation::new(
                RuleId::AudC04,
                "updated_date",
                "created_date and updated_date must be identical on create",
            ));
        }
    }
}

/// AUD-C-05 — on create, `created_date` must be within tolerance of "now".
pub struct CreateStampRecent;

impl<T: Audited> ValidationRule<T> for CreateStampRecent {
    fn id(&self) -> RuleId {
        RuleId::AudC05
    }

    fn check(
        &self,
        candidate: &T,
        _existing: Option<&T>,
        ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    ) {
        let created = candidate.audit().created_date;
        if !within_tolerance(created, ctx.now, ctx.config.timestamp_tolerance) {
            out.push(FieldViolation::new(
                RuleId::AudC05,
                "created_date",
                format!(
                    "created_date {created} is not within {}s of the current time",
                    ctx.config.timestamp_tolerance.num_seconds()
                ),
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Modify mode
// ---------------------------------------------------------------------------

/// AUD-M-01 — on modify, the record identifier must be present.
pub struct ModifyIdPresent;

impl<T: Audited> ValidationRule<T> for ModifyIdPresent {
    fn id(&self) -> RuleId {
        RuleId::AudM01
    }

    fn check(
        &self,
        candidate: &T,
        _existing: Option<&T>,
        _ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    ) {
        if candidate.record_id().is_none() {
            out.push(FieldViolation::new(
                RuleId::AudM01,
                "id",
                "identifier is required on modify",
            ));
        }
    }
}

/// AUD-M-02 — on modify, the identifier must match the stored record's.
pub struct ModifyIdImmutable;

impl<T: Audited> ValidationRule<T> for ModifyIdImmutable {
    fn id(&self) -> RuleId {
        RuleId::AudM02
    }

    fn check(
        &self,
        candidate: &T,
        existing: Option<&T>,
        _ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    ) {
        let Some(stored) = existing else { return };
        if let (Some(candidate_id), Some(stored_id)) = (candidate.record_id(), stored.record_id()) {
            if candidate_id != stored_id {
                out.push(FieldViolation::new(
                    RuleId::AudM02,
                    "id",
                    format!(
                        "identifier \"{candidate_id}\" does not match the stored record \"{stored_id}\""
                    ),
                ));
            }
        }
    }
}

/// AUD-M-03 — on modify, `updated_date` must have diverged from `created_date`.
pub struct ModifyStampsDiverged;

impl<T: Audited> ValidationRule<T> for ModifyStampsDiverged {
    fn id(&self) -> RuleId {
        RuleId::AudM03
    }

    fn check(
        &self,
        candidate: &T,
        _existing: Option<&T>,
        _ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    ) {
        let audit = candidate.audit();
        if audit.updated_date == audit.created_date {
            out.push(FieldViolation::new(
                RuleId::AudM03,
                "updated_date",
                "updated_date must differ from created_date on modify",
            ));
        }
    }
}

/// AUD-M-04 — on modify, `updated_date` must differ from the previously
/// stored `updated_date`.
pub struct ModifyUpdatedDateAdvances;

impl<T: Audited> ValidationRule<T> for ModifyUpdatedDateAdvances {
    fn id(&self) -> RuleId {
        RuleId::AudM04
    }

    fn check(
        &self,
        candidate: &T,
        existing: Option<&T>,
        _ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    ) {
        let Some(stored) = existing else { return };
        if candidate.audit().updated_date == stored.audit().updated_date {
            out.push(FieldViolation::new(
                RuleId::AudM04,
                "updated_date",
                "updated_date must differ from the stored record's updated_date",
            ));
        }
    }
}

/// AUD-M-05 — on modify, `updated_date` must be within tolerance of "now".
pub struct ModifyUpdatedDateRecent;

impl<T: Audited> ValidationRule<T> for ModifyUpdatedDateRecent {
    fn id(&self) -> RuleId {
        RuleId::AudM05
    }

    fn check(
        &self,
        candidate: &T,
        _existing: Option<&T>,
        ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    ) {
        let updated = candidate.audit().updated_date;
        if !within_tolerance(updated, ctx.now, ctx.config.timestamp_tolerance) {
            out.push(FieldViolation::new(
                RuleId::AudM05,
                "updated_date",
                format!(
                    "updated_date {updated} is not within {}s of the current time",
                    ctx.config.timestamp_tolerance.num_seconds()
                ),
            ));
        }
    }
}

/// AUD-M-06 — on modify, `created_by` must be identical to the stored value.
///
/// Any divergence is reported against `created_by` specifically, never as a
/// generic tamper error.
pub struct ModifyCreatedByImmutable;

impl<T: Audited> ValidationRule<T> for ModifyCreatedByImmutable {
    fn id(&self) -> RuleId {
        RuleId::AudM06
    }

    fn check(
        &self,
        candidate: &T,
        existing: Option<&T>,
        _ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    ) {
        let Some(stored) = existing else { return };
        let candidate_by = &candidate.audit().created_by;
        let stored_by = &stored.audit().created_by;
        if candidate_by != stored_by {
            out.push(FieldViolation::new(
                RuleId::AudM06,
                "created_by",
                format!(
                    "created_by \"{candidate_by}\" does not match the stored value \"{stored_by}\""
                ),
            ));
        }
    }
}

/// AUD-M-07 — on modify, `created_date` must be identical to the stored value.
pub struct ModifyCreatedDateImmutable;

impl<T: Audited> ValidationRule<T> for ModifyCreatedDateImmutable {
    fn id(&self) -> RuleId {
        RuleId::AudM07
    }

    fn check(
        &self,
        candidate: &T,
        existing: Option<&T>,
        _ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    ) {
        let Some(stored) = existing else { return };
        if candidate.audit().created_date != stored.audit().created_date {
            out.push(FieldViolation::new(
                RuleId::AudM07,
                "created_date",
                "created_date does not match the stored value",
            ));
        }
    }
}

/// AUD-M-08 — on modify, `updated_by` must equal the acting principal.
pub struct ModifyUpdatedByPrincipal;

impl<T: Audited> ValidationRule<T> for ModifyUpdatedByPrincipal {
    fn id(&self) -> RuleId {
        RuleId::AudM08
    }

    fn check(
        &self,
        candidate: &T,
        _existing: Option<&T>,
        ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    ) {
        let updated_by = &candidate.audit().updated_by;
        if updated_by != &ctx.principal {
            out.push(FieldViolation::new(
                RuleId::AudM08,
                "updated_by",
                format!(
                    "updated_by \"{updated_by}\" does not match the acting principal \"{}\"",
                    ctx.principal
                ),
            ));
        }
    }
}
