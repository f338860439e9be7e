//! Verification-code issuance and matching.
//!
//! Both operations are pure transitions on a [`Patient`] record: they take
//! the stored record, the injected "now", and the policy, and return the
//! updated record for the caller to persist. Neither touches a clock, a
//! random source, or storage of its own — randomness comes in as an `Rng`
//! and persistence is the orchestrator's job, so both halves are
//! deterministic under test.
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::newtypes::VerificationCode;
use crate::patient::{Patient, VerificationState};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Tunable limits for the verification-code workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationPolicy {
    /// How long an issued code stays usable.
    pub code_ttl: Duration,
    /// Failed attempts allowed before the record locks.
    pub max_retry_count: u32,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            code_ttl: Duration::minutes(30),
            max_retry_count: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// Code generation
// ---------------------------------------------------------------------------

/// Number of characters in a generated code.
pub const CODE_LENGTH: usize = 5;

/// Generation alphabet: upper-case alphanumerics minus the easily-confused
/// `I`, `L`, `O`, `0`, `1`. Submitted codes are still accepted across the
/// full `[A-Z0-9]` range, so transcription of a generated code can never
/// fail the shape check.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Draws a fresh 5-character code from [`CODE_ALPHABET`].
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> VerificationCode {
    let mut text = String::with_capacity(CODE_LENGTH);
    for _ in 0..CODE_LENGTH {
        let index = rng.gen_range(0..CODE_ALPHABET.len());
        text.push(char::from(CODE_ALPHABET[index]));
    }
    VerificationCode::from_trusted(text)
}

// ---------------------------------------------------------------------------
// Issuance
// ---------------------------------------------------------------------------

/// Reasons a code issuance request is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IssueRefusal {
    /// An unexpired, unmatched code is already outstanding. Refusing here
    /// stops repeated issuance requests from flooding the patient's contact
    /// channel or enumerating fresh codes.
    #[error("a valid code already exists for this patient (expires {expires_at})")]
    OutstandingCode {
        /// When the outstanding code stops being usable.
        expires_at: DateTime<Utc>,
    },
    /// The record is locked: the retry budget is exhausted and must be
    /// cleared administratively before a new code can be issued.
    #[error("the record is locked after {retry_count} failed attempts")]
    LockedOut {
        /// The stored failed-attempt count.
        retry_count: u32,
    },
}

/// Issues a fresh verification code, or decides that issuance must be refused.
///
/// Preconditions checked in order:
/// 1. the record is not locked ([`IssueRefusal::LockedOut`]);
/// 2. no unexpired, unmatched code is outstanding
///    ([`IssueRefusal::OutstandingCode`]).
///
/// On success the returned record carries the new code, an expiry of
/// `now + policy.code_ttl`, a cleared matched-on marker, and a zeroed retry
/// counter.
pub fn issue<R: Rng + ?Sized>(
    patient: &Patient,
    now: DateTime<Utc>,
    policy: &VerificationPolicy,
    rng: &mut R,
) -> Result<Patient, IssueRefusal> {
    let state = &patient.verification;

    if state.retry_count >= policy.max_retry_count {
        return Err(IssueRefusal::LockedOut {
            retry_count: state.retry_count,
        });
    }

    if state.code.is_some() && state.code_matched_at.is_none() {
        if let Some(expires_at) = state.code_expires_at {
            if expires_at > now {
                return Err(IssueRefusal::OutstandingCode { expires_at });
            }
        }
    }

    let mut updated = patient.clone();
    updated.verification = VerificationState {
        code: Some(generate_code(rng)),
        code_expires_at: Some(now + policy.code_ttl),
        code_matched_at: None,
        retry_count: 0,
    };
    Ok(updated)
}

/// Clears all verification-code state, including the retry counter.
///
/// This is the administrative "lockout reset": after it, a locked record can
/// be issued a fresh code again.
pub fn reset_verification(patient: &Patient) -> Patient {
    let mut updated = patient.clone();
    updated.verification = VerificationState::default();
    updated
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// The result of comparing a submitted code against stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    /// The submitted code matched a live code.
    Matched,
    /// No live code: it expired, was already matched, or was never issued.
    Expired,
    /// A live code exists but the submission does not match it.
    Incorrect,
    /// The retry budget is exhausted; nothing was checked or mutated.
    LockedOut,
}

impl MatchOutcome {
    /// Label for structured logging and audit payloads.
    pub fn label(self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::Expired => "expired",
            Self::Incorrect => "incorrect",
            Self::LockedOut => "locked_out",
        }
    }
}

impl fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Compares a submitted code against the record's stored state and applies
/// the retry/lockout policy.
///
/// Returns the outcome plus, where the attempt mutated state, the updated
/// record the caller must persist. State transitions:
///
/// - retry budget exhausted → [`MatchOutcome::LockedOut`], no mutation, the
///   submission is not even compared;
/// - code missing, past expiry, or already matched →
///   [`MatchOutcome::Expired`], retry counter incremented;
/// - code live but different → [`MatchOutcome::Incorrect`], retry counter
///   incremented;
/// - code live and equal → [`MatchOutcome::Matched`], matched-on set to
///   `now`, retry counter reset to zero.
///
/// Comparison is effectively case-insensitive because both sides are
/// upper-cased by the [`VerificationCode`] constructor. Retry increments
/// saturate at `policy.max_retry_count`.
pub fn match_submission(
    patient: &Patient,
    submitted: &VerificationCode,
    now: DateTime<Utc>,
    policy: &VerificationPolicy,
) -> (MatchOutcome, Option<Patient>) {
    let state = &patient.verification;

    if state.retry_count >= policy.max_retry_count {
        return (MatchOutcome::LockedOut, None);
    }

    let live = state.code.is_some()
        && state.code_matched_at.is_none()
        && state.code_expires_at.is_some_and(|expires_at| now < expires_at);

    if !live {
        return (MatchOutcome::Expired, Some(bump_retry(patient, policy)));
    }

    if state.code.as_ref() != Some(submitted) {
        return (MatchOutcome::Incorrect, Some(bump_retry(patient, policy)));
    }

    let mut updated = patient.clone();
    updated.verification.code_matched_at = Some(now);
    updated.verification.retry_count = 0;
    (MatchOutcome::Matched, Some(updated))
}

fn bump_retry(patient: &Patient, policy: &VerificationPolicy) -> Patient {
    let mut updated = patient.clone();
    let bumped = updated.verification.retry_count.saturating_add(1);
    updated.verification.retry_count = bumped.min(policy.max_retry_count);
    updated
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
