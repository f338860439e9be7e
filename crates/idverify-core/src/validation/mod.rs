/// Rule types and dispatch for the record-validation engine.
///
/// This module defines [`RuleId`], [`FieldViolation`], [`ValidationReport`],
/// the [`ValidationRule`] trait, [`WriteMode`], [`RuleContext`],
/// [`ValidationConfig`], and the registry builder / dispatch functions.
///
/// The engine never fails fast: every registered rule runs against the
/// candidate record, and the report aggregates every violation found so a
/// caller can fix all problems in one pass.
pub mod rules_audit;
pub mod rules_patient;

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};

use crate::newtypes::PrincipalId;
use crate::patient::Patient;

#[cfg(test)]
mod tests;

// ---------------------------------------------------------------------------
// RuleId
// ---------------------------------------------------------------------------

/// Machine-readable identifier for a validation rule.
///
/// [`RuleId::code`] returns the canonical hyphenated form used in serialised
/// reports (e.g. `"AUD-M-06"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RuleId {
    /// AUD-C-01: On create, the record identifier is absent (assigned downstream).
    AudC01,
    /// AUD-C-02: On create, `created_by` equals the acting principal.
    AudC02,
    /// AUD-C-03: On create, `updated_by` equals the acting principal.
    AudC03,
    /// AUD-C-04: On create, `created_date` equals `updated_date`.
    AudC04,
    /// AUD-C-05: On create, `created_date` is within tolerance of "now".
    AudC05,

    /// AUD-M-01: On modify, the record identifier is present.
    AudM01,
    /// AUD-M-02: On modify, the identifier matches the stored record's.
    AudM02,
    /// AUD-M-03: On modify, `updated_date` differs from `created_date`.
    AudM03,
    /// AUD-M-04: On modify, `updated_date` differs from the stored `updated_date`.
    AudM04,
    /// AUD-M-05: On modify, `updated_date` is within tolerance of "now".
    AudM05,
    /// AUD-M-06: On modify, `created_by` is identical to the stored value.
    AudM06,
    /// AUD-M-07: On modify, `created_date` is identical to the stored value.
    AudM07,
    /// AUD-M-08: On modify, `updated_by` equals the acting principal.
    AudM08,

    /// FLD-01: Given name present and non-empty.
    Fld01,
    /// FLD-02: Family name present and non-empty.
    Fld02,
    /// FLD-03: Per-field maximum lengths.
    Fld03,
    /// FLD-04: National identifier, when present, passes the mod-11 checksum.
    Fld04,
    /// FLD-05: Retry count within the configured bound.
    Fld05,
}

impl RuleId {
    /// Returns the canonical hyphenated rule code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AudC01 => "AUD-C-01",
            Self::AudC02 => "AUD-C-02",
            Self::AudC03 => "AUD-C-03",
            Self::AudC04 => "AUD-C-04",
            Self::AudC05 => "AUD-C-05",
            Self::AudM01 => "AUD-M-01",
            Self::AudM02 => "AUD-M-02",
            Self::AudM03 => "AUD-M-03",
            Self::AudM04 => "AUD-M-04",
            Self::AudM05 => "AUD-M-05",
            Self::AudM06 => "AUD-M-06",
            Self::AudM07 => "AUD-M-07",
            Self::AudM08 => "AUD-M-08",
            Self::Fld01 => "FLD-01",
            Self::Fld02 => "FLD-02",
            Self::Fld03 => "FLD-03",
            Self::Fld04 => "FLD-04",
            Self::Fld05 => "FLD-05",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for RuleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// FieldViolation
// ---------------------------------------------------------------------------

/// A single finding produced by the validation engine, anchored to the
/// specific field that violated a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// The rule that produced this finding.
    pub rule_id: RuleId,
    /// The record field the finding is reported against.
    pub field: String,
    /// A human-readable explanation of the problem.
    pub message: String,
}

impl FieldViolation {
    /// Constructs a new [`FieldViolation`].
    pub fn new(rule_id: RuleId, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule_id,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.rule_id, self.field, self.message)
    }
}

// ---------------------------------------------------------------------------
// ValidationReport
// ---------------------------------------------------------------------------

/// The aggregated output of a validation pass over one candidate record.
///
/// Always contains every violation found — the engine never fails fast.
/// An empty report means the record may be persisted; a non-empty report
/// must be surfaced as a structured validation failure, never as a generic
/// error.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ValidationReport {
    /// All violations, in rule-registration order.
    pub violations: Vec<FieldViolation>,
}

impl ValidationReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a report from a pre-built list of violations.
    pub fn from_violations(violations: Vec<FieldViolation>) -> Self {
        Self { violations }
    }

    /// Returns `true` if the record passed every rule.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Total number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Groups violations by field name, preserving the order in which each
    /// field first appeared (which follows rule-registration order).
    pub fn by_field(&self) -> Vec<(&str, Vec<&FieldViolation>)> {
        let mut order: Vec<&str> = Vec::new();
        let mut groups: HashMap<&str, Vec<&FieldViolation>> = HashMap::new();
        for violation in &self.violations {
            let field = violation.field.as_str();
            if !groups.contains_key(field) {
                order.push(field);
            }
            groups.entry(field).or_default().push(violation);
        }
        order
            .into_iter()
            .map(|field| (field, groups.remove(field).unwrap_or_default()))
            .collect()
    }

    /// Returns an iterator over the violations reported against `field`.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldViolation> {
        self.violations.iter().filter(move |v| v.field == field)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} violation(s)", self.len())?;
        for violation in &self.violations {
            write!(f, "; {violation}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// WriteMode / RuleContext / ValidationConfig
// ---------------------------------------------------------------------------

/// The persistence operation a candidate record is being validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMode {
    /// The record is new; no stored counterpart exists.
    Create,
    /// The record updates an existing stored counterpart.
    Modify,
}

/// Per-request inputs every rule may consult.
///
/// Carries the acting principal and the injected "now" so rules stay pure:
/// the same candidate, context, and stored record always produce the same
/// report.
#[derive(Debug, Clone)]
pub struct RuleContext {
    /// The authenticated principal performing the write.
    pub principal: PrincipalId,
    /// The clock reading taken once at the start of the operation.
    pub now: DateTime<Utc>,
    /// Tunable limits shared by the rule set.
    pub config: ValidationConfig,
}

/// Tunable limits for the rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Maximum allowed distance between an audit timestamp and "now",
    /// applied symmetrically.
    pub timestamp_tolerance: Duration,
    /// Maximum length of each name field.
    pub max_name_len: usize,
    /// Maximum length of the email field.
    pub max_email_len: usize,
    /// Maximum length of the phone field.
    pub max_phone_len: usize,
    /// Maximum length of the postcode field.
    pub max_postcode_len: usize,
    /// Upper bound for the stored retry counter.
    pub max_retry_count: u32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            timestamp_tolerance: Duration::seconds(90),
            max_name_len: 70,
            max_email_len: 254,
            max_phone_len: 35,
            max_postcode_len: 10,
            max_retry_count: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationRule
// ---------------------------------------------------------------------------

/// A single, stateless validation rule over records of type `T`.
///
/// Rules push zero or more [`FieldViolation`] values into the provided
/// vector; a rule that finds nothing wrong pushes nothing. Rules hold no
/// mutable state and receive the candidate and its stored counterpart only
/// by shared reference, so the dispatch loop can run every rule exactly
/// once per pass in registration order.
///
/// `existing` is `Some` only in [`WriteMode::Modify`] passes; create-mode
/// rules ignore it, and modify-mode comparison rules skip silently when it
/// is `None` (the caller reports a missing stored record as not-found
/// before any rules run).
///
/// The trait is object-safe; registries store rules as
/// `Vec<Box<dyn ValidationRule<T>>>`.
pub trait ValidationRule<T> {
    /// The unique identifier for this rule.
    fn id(&self) -> RuleId;

    /// Inspect `candidate` and push any findings into `out`.
    fn check(
        &self,
        candidate: &T,
        existing: Option<&T>,
        ctx: &RuleContext,
        out: &mut Vec<FieldViolation>,
    );
}

/// Runs an ordered rule set against one candidate record.
///
/// Every rule runs; the report aggregates all violations in registration
/// order. This is the generic engine behind [`validate_patient`], usable
/// for any other auditable entity type.
pub fn run_rules<T>(
    rules: &[Box<dyn ValidationRule<T>>],
    candidate: &T,
    existing: Option<&T>,
    ctx: &RuleContext,
) -> ValidationReport {
    let mut violations: Vec<FieldViolation> = Vec::new();
    for rule in rules {
        rule.check(candidate, existing, ctx, &mut violations);
    }
    ValidationReport::from_violations(violations)
}

/// Builds the ordered rule registry for a patient write in the given mode.
///
/// Audit-invariant rules come first (creation/modification bookkeeping),
/// then the patient field rules. Rules are compiled into `idverify-core`;
/// this is not a plugin system.
pub fn build_patient_registry(mode: WriteMode) -> Vec<Box<dyn ValidationRule<Patient>>> {
    use rules_audit::{
        CreateCreatedByPrincipal, CreateIdAbsent, CreateStampRecent, CreateStampsEqual,
        CreateUpdatedByPrincipal, ModifyCreatedByImmutable, ModifyCreatedDateImmutable,
        ModifyIdImmutable, ModifyIdPresent, ModifyStampsDiverged, ModifyUpdatedByPrincipal,
        ModifyUpdatedDateAdvances, ModifyUpdatedDateRecent,
    };
    use rules_patient::{
        FamilyNameRequired, FieldLengths, GivenNameRequired, NationalIdChecksum, RetryCountBounded,
    };

    let mut registry: Vec<Box<dyn ValidationRule<Patient>>> = Vec::new();

    match mode {
        WriteMode::Create => {
            registry.push(Box::new(CreateIdAbsent));
            registry.push(Box::new(CreateCreatedByPrincipal));
            registry.push(Box::new(CreateUpdatedByPrincipal));
            registry.push(Box::new(CreateStampsEqual));
            registry.push(Box::new(CreateStampRecent));
        }
        WriteMode::Modify => {
            registry.push(Box::new(ModifyIdPresent));
            registry.push(Box::new(ModifyIdImmutable));
            registry.push(Box::new(ModifyStampsDiverged));
            registry.push(Box::new(ModifyUpdatedDateAdvances));
            registry.push(Box::new(ModifyUpdatedDateRecent));
            registry.push(Box::new(ModifyCreatedByImmutable));
            registry.push(Box::new(ModifyCreatedDateImmutable));
            registry.push(Box::new(ModifyUpdatedByPrincipal));
        }
    }

    registry.push(Box::new(GivenNameRequired));
    registry.push(Box::new(FamilyNameRequired));
    registry.push(Box::new(FieldLengths));
    registry.push(Box::new(NationalIdChecksum));
    registry.push(Box::new(RetryCountBounded));

    registry
}

/// Validates a patient record for persistence in the given mode.
///
/// Builds the registry for `mode`, walks it linearly, and collects every
/// violation. An empty report means the write may proceed.
pub fn validate_patient(
    candidate: &Patient,
    existing: Option<&Patient>,
    mode: WriteMode,
    ctx: &RuleContext,
) -> ValidationReport {
    let registry = build_patient_registry(mode);
    run_rules(&registry, candidate, existing, ctx)
}

/// Returns `true` when `stamp` lies within the configured tolerance of
/// `now`, in either direction.
pub(crate) fn within_tolerance(
    stamp: DateTime<Utc>,
    now: DateTime<Utc>,
    tolerance: Duration,
) -> bool {
    (now - stamp).abs() <= tolerance
}
