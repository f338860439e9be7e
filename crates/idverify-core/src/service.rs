//! The verification service: orchestration of validation, lookup, issuance,
//! and matching over the injected collaborators.
//!
//! Every collaborator arrives through the constructor — storage, the
//! demographics directory, the clock, caller identity, notification, the
//! audit sink, and the random source — so tests substitute fakes without
//! any override hooks. Each public operation is a short-lived unit of work:
//! one clock reading, at most one storage round trip and one directory
//! round trip, no locks held in between.
//!
//! Every failure is logged exactly once, at the point where it is first
//! classified into the [`ServiceError`] taxonomy, and never again as it
//! propagates. Raw collaborator errors survive only as internal sources;
//! the messages callers see are stable and user-safe.
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::clock::Clock;
use crate::events::{AuditEvent, AuditSink, Notifier};
use crate::identity::IdentityContext;
use crate::lookup::{DemographicsDirectory, LookupCriteria, LookupError, resolve_patient};
use crate::newtypes::{PatientId, VerificationCode};
use crate::patient::Patient;
use crate::redaction::{RedactedPatient, redact};
use crate::store::{PatientStore, StoreError};
use crate::validation::{
    RuleContext, ValidationConfig, ValidationReport, WriteMode, validate_patient,
};
use crate::verification::{
    IssueRefusal, MatchOutcome, VerificationPolicy, issue, match_submission, reset_verification,
};

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// A domain-specific refusal: the request was well-formed and the
/// dependencies are healthy, but a business rule says no.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusinessRuleViolation {
    /// An unexpired, unmatched code is already outstanding.
    #[error("a valid code already exists for this patient")]
    OutstandingCode {
        /// When the outstanding code stops being usable.
        expires_at: DateTime<Utc>,
    },
    /// The retry budget is exhausted; an administrative reset is required
    /// before a new code can be issued.
    #[error("the record is locked after repeated failed attempts")]
    VerificationLocked {
        /// The stored failed-attempt count.
        retry_count: u32,
    },
    /// Lookup produced no candidate.
    #[error("no patient matches the supplied criteria")]
    NoMatch,
    /// Lookup produced more than one candidate.
    #[error("more than one patient matches the supplied criteria")]
    AmbiguousMatch {
        /// Number of candidates returned.
        count: usize,
    },
    /// The resolved record is flagged for manual handling.
    #[error("the resolved record has opted out of automated processing")]
    SensitiveRecord,
    /// The anonymous caller failed the CAPTCHA challenge.
    #[error("the CAPTCHA challenge was not passed")]
    CaptchaRejected,
}

/// A collaborator rejected the write for a validation-like reason. The raw
/// storage error is logged where it is classified; only these stable
/// messages reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DependencyConflict {
    /// A uniqueness constraint was violated.
    #[error("a record with the same key already exists")]
    DuplicateKey,
    /// A referenced record does not exist.
    #[error("a referenced record does not exist")]
    ForeignKey,
    /// The record changed underneath the caller. The service never retries
    /// on the caller's behalf; it surfaces the conflict and stops.
    #[error("the record was modified concurrently; try again later")]
    Concurrency,
}

/// The error taxonomy every public operation classifies its failures into.
///
/// [`ServiceError::kind`] exposes the discriminator as a stable string for
/// logging and API mapping.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed or missing fields, caught before any collaborator call.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What was wrong with the input.
        reason: String,
    },
    /// The rule engine produced one or more field violations. Always
    /// carries the full aggregated report.
    #[error("validation failed: {report}")]
    Validation {
        /// Every violation, grouped and ordered by the engine.
        report: ValidationReport,
    },
    /// A referenced entity does not exist in storage.
    #[error("{entity} \"{id}\" was not found")]
    NotFound {
        /// The entity kind that failed to resolve.
        entity: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },
    /// A domain rule refused the request.
    #[error(transparent)]
    BusinessRule(#[from] BusinessRuleViolation),
    /// A collaborator rejected the request for a validation-like reason.
    #[error(transparent)]
    DependencyValidation(#[from] DependencyConflict),
    /// A collaborator failed for an infrastructure reason.
    #[error("a dependency is unavailable; try again later")]
    DependencyFailure {
        /// The raw collaborator error, preserved internally only.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// Anything that fits none of the kinds above. The surrounding
    /// application wraps unforeseen conditions here so callers never see
    /// raw infrastructure error shapes.
    #[error("an internal error occurred")]
    Internal {
        /// The underlying condition, preserved internally only.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ServiceError {
    /// Stable discriminator for logs and API error mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::Validation { .. } => "validation",
            Self::NotFound { .. } => "not_found",
            Self::BusinessRule(_) => "business_rule",
            Self::DependencyValidation(_) => "dependency_validation",
            Self::DependencyFailure { .. } => "dependency_failure",
            Self::Internal { .. } => "internal",
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable behaviour of the verification service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Code TTL and retry budget.
    pub policy: VerificationPolicy,
    /// Rule-engine limits. `validation.max_retry_count` should agree with
    /// `policy.max_retry_count`; both default to the same value.
    pub validation: ValidationConfig,
    /// Callers holding this role skip the matcher entirely.
    pub bypass_role: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            policy: VerificationPolicy::default(),
            validation: ValidationConfig::default(),
            bypass_role: "verification-bypass".to_owned(),
        }
    }
}

/// What the caller learns from a successful issuance. The code itself is
/// delivered over the patient's contact channel, never returned here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueReceipt {
    /// The record the code was issued for.
    pub patient_id: PatientId,
    /// When the code stops being usable.
    pub expires_at: DateTime<Utc>,
    /// Whether delivery to the contact channel succeeded. A failed delivery
    /// does not roll back the issued code.
    pub notified: bool,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Orchestrator for the public verification operations.
pub struct VerificationService<S, D, C, I, N, A> {
    store: S,
    directory: D,
    clock: C,
    identity: I,
    notifier: N,
    audit: A,
    config: ServiceConfig,
    rng: StdRng,
}

impl<S, D, C, I, N, A> VerificationService<S, D, C, I, N, A>
where
    S: PatientStore,
    D: DemographicsDirectory,
    C: Clock,
    I: IdentityContext,
    N: Notifier,
    A: AuditSink,
{
    /// Wires a service from its collaborators, seeding the code generator
    /// from system entropy.
    pub fn new(
        store: S,
        directory: D,
        clock: C,
        identity: I,
        notifier: N,
        audit: A,
        config: ServiceConfig,
    ) -> Self {
        Self::with_rng(store, directory, clock, identity, notifier, audit, config, StdRng::from_entropy())
    }

    /// Like [`VerificationService::new`] but with an explicit random source,
    /// so tests get deterministic codes.
    #[allow(clippy::too_many_arguments)]
    pub fn with_rng(
        store: S,
        directory: D,
        clock: C,
        identity: I,
        notifier: N,
        audit: A,
        config: ServiceConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            directory,
            clock,
            identity,
            notifier,
            audit,
            config,
            rng,
        }
    }

    fn rule_context(&self, now: DateTime<Utc>) -> RuleContext {
        RuleContext {
            principal: self.identity.current_principal(),
            now,
            config: self.config.validation.clone(),
        }
    }

    /// Validates (create mode) and persists a new patient record.
    pub fn add_record(&self, candidate: &Patient) -> Result<Patient, ServiceError> {
        let now = self.clock.now();
        let report = validate_patient(candidate, None, WriteMode::Create, &self.rule_context(now));
        if !report.is_empty() {
            debug!(violations = report.len(), "create-mode validation refused the record");
            return Err(ServiceError::Validation { report });
        }

        self.store
            .insert(candidate)
            .map_err(|err| self.classify_store_failure("add_record", err))
    }

    /// Validates (modify mode, against the stored version) and persists an
    /// update, guarded by the record's row stamp.
    pub fn modify_record(&self, candidate: &Patient) -> Result<Patient, ServiceError> {
        let now = self.clock.now();

        // A missing stored record is a distinct not-found condition; there
        // is nothing to compare the candidate against, so no rules run.
        let existing = match &candidate.id {
            Some(id) => Some(self.fetch(id)?),
            None => None,
        };

        let report = validate_patient(
            candidate,
            existing.as_ref(),
            WriteMode::Modify,
            &self.rule_context(now),
        );
        if !report.is_empty() {
            debug!(violations = report.len(), "modify-mode validation refused the record");
            return Err(ServiceError::Validation { report });
        }

        self.store
            .update(candidate, candidate.row_version)
            .map_err(|err| self.classify_store_failure("modify_record", err))
    }

    /// Resolves exactly one patient via the external directory and returns
    /// the redacted view.
    pub fn lookup_patient(&self, criteria: &LookupCriteria) -> Result<RedactedPatient, ServiceError> {
        match resolve_patient(&self.directory, criteria) {
            Ok(patient) => Ok(redact(&patient)),
            Err(err) => Err(self.classify_lookup_failure(err)),
        }
    }

    /// Issues a fresh verification code for a stored record, persists it,
    /// and dispatches it over the patient's contact channel.
    ///
    /// Delivery is fire-and-forget: a notification failure is reported via
    /// [`IssueReceipt::notified`] and logged, but the stored code stands.
    pub fn issue_verification_code(
        &mut self,
        patient_id: &PatientId,
    ) -> Result<IssueReceipt, ServiceError> {
        let now = self.clock.now();
        let stored = self.fetch(patient_id)?;

        let updated = issue(&stored, now, &self.config.policy, &mut self.rng).map_err(|refusal| {
            debug!(patient = %patient_id, %refusal, "code issuance refused");
            ServiceError::BusinessRule(match refusal {
                IssueRefusal::OutstandingCode { expires_at } => {
                    BusinessRuleViolation::OutstandingCode { expires_at }
                }
                IssueRefusal::LockedOut { retry_count } => {
                    BusinessRuleViolation::VerificationLocked { retry_count }
                }
            })
        })?;

        let persisted = self
            .store
            .update(&updated, stored.row_version)
            .map_err(|err| self.classify_store_failure("issue_verification_code", err))?;

        let expires_at = persisted
            .verification
            .code_expires_at
            .unwrap_or_else(|| now + self.config.policy.code_ttl);

        let notified = match &persisted.verification.code {
            Some(code) => match self.notifier.send_code(&redact(&persisted), code) {
                Ok(()) => true,
                Err(err) => {
                    warn!(patient = %patient_id, %err, "code notification failed; code stands");
                    false
                }
            },
            None => false,
        };

        self.audit.record(&AuditEvent::CodeIssued {
            patient_id: patient_id.clone(),
            expires_at,
            notified,
        });

        Ok(IssueReceipt {
            patient_id: patient_id.clone(),
            expires_at,
            notified,
        })
    }

    /// Runs the matcher (or the privileged bypass) for a submitted code and
    /// persists the outcome.
    ///
    /// A caller holding the configured bypass role is treated as already
    /// verified: the matcher is skipped entirely, stored code state is
    /// neither read nor mutated, and an audit event records the bypass.
    /// Anyone else must pass the CAPTCHA challenge before the matcher runs.
    pub fn verify_code(
        &self,
        patient_id: &PatientId,
        submitted: &str,
        captcha_token: &str,
    ) -> Result<MatchOutcome, ServiceError> {
        if self.identity.is_in_role(&self.config.bypass_role) {
            self.audit.record(&AuditEvent::VerificationBypassed {
                patient_id: patient_id.clone(),
                principal: self.identity.current_principal(),
                role: self.config.bypass_role.clone(),
            });
            return Ok(MatchOutcome::Matched);
        }

        if !self.identity.validate_captcha(captcha_token) {
            debug!(patient = %patient_id, "captcha rejected before the matcher");
            return Err(BusinessRuleViolation::CaptchaRejected.into());
        }

        let submitted = VerificationCode::try_from(submitted).map_err(|err| {
            debug!(patient = %patient_id, "malformed verification code submitted");
            ServiceError::InvalidInput {
                reason: err.to_string(),
            }
        })?;

        let now = self.clock.now();
        let stored = self.fetch(patient_id)?;
        let (outcome, updated) = match_submission(&stored, &submitted, now, &self.config.policy);

        if let Some(updated) = updated {
            let persisted = self
                .store
                .update(&updated, stored.row_version)
                .map_err(|err| self.classify_store_failure("verify_code", err))?;

            match outcome {
                MatchOutcome::Matched => self.audit.record(&AuditEvent::CodeMatched {
                    patient_id: patient_id.clone(),
                    matched_at: now,
                }),
                MatchOutcome::Expired | MatchOutcome::Incorrect => {
                    let budget = self.config.policy.max_retry_count;
                    let crossed = stored.verification.retry_count < budget
                        && persisted.verification.retry_count >= budget;
                    if crossed {
                        warn!(patient = %patient_id, "verification retry budget exhausted");
                        self.audit.record(&AuditEvent::LockoutReached {
                            patient_id: patient_id.clone(),
                            retry_count: persisted.verification.retry_count,
                        });
                    }
                }
                // LockedOut attempts never mutate state, so they cannot
                // reach this branch.
                MatchOutcome::LockedOut => {}
            }
        }

        Ok(outcome)
    }

    /// Administrative lockout reset: clears all verification-code state so
    /// a fresh issuance can follow.
    pub fn reset_verification_state(&self, patient_id: &PatientId) -> Result<Patient, ServiceError> {
        let stored = self.fetch(patient_id)?;
        let cleared = reset_verification(&stored);
        self.store
            .update(&cleared, stored.row_version)
            .map_err(|err| self.classify_store_failure("reset_verification_state", err))
    }

    // -- classification helpers -------------------------------------------

    fn fetch(&self, id: &PatientId) -> Result<Patient, ServiceError> {
        match self.store.select_by_id(id) {
            Ok(Some(patient)) => Ok(patient),
            Ok(None) => {
                debug!(patient = %id, "no stored record");
                Err(ServiceError::NotFound {
                    entity: "patient",
                    id: id.to_string(),
                })
            }
            Err(err) => Err(self.classify_store_failure("select_by_id", err)),
        }
    }

    fn classify_store_failure(&self, operation: &'static str, err: StoreError) -> ServiceError {
        match err {
            StoreError::DuplicateKey { .. } => {
                warn!(operation, %err, "storage rejected the write");
                DependencyConflict::DuplicateKey.into()
            }
            StoreError::ForeignKeyConflict { .. } => {
                warn!(operation, %err, "storage rejected the write");
                DependencyConflict::ForeignKey.into()
            }
            StoreError::ConcurrencyConflict { .. } => {
                warn!(operation, %err, "concurrent modification detected");
                DependencyConflict::Concurrency.into()
            }
            StoreError::NotFound { id } => {
                debug!(operation, %id, "no stored record");
                ServiceError::NotFound {
                    entity: "patient",
                    id,
                }
            }
            StoreError::Backend { .. } => {
                error!(operation, %err, "storage failure");
                ServiceError::DependencyFailure {
                    source: Box::new(err),
                }
            }
        }
    }

    fn classify_lookup_failure(&self, err: LookupError) -> ServiceError {
        match err {
            LookupError::NoMatch => {
                debug!("lookup produced no candidate");
                BusinessRuleViolation::NoMatch.into()
            }
            LookupError::AmbiguousMatch { count } => {
                debug!(count, "lookup produced multiple candidates");
                BusinessRuleViolation::AmbiguousMatch { count }.into()
            }
            LookupError::SensitiveRecord => {
                warn!("lookup resolved a sensitive record; refused");
                BusinessRuleViolation::SensitiveRecord.into()
            }
            LookupError::EmptyCriteria => {
                debug!("lookup criteria carried no usable search field");
                ServiceError::InvalidInput {
                    reason: "detail-based lookup requires at least one non-empty search field"
                        .to_owned(),
                }
            }
            LookupError::Directory(directory_err) => {
                error!(%directory_err, "demographics directory failure");
                ServiceError::DependencyFailure {
                    source: Box::new(directory_err),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
