//! Patient resolution against the external demographics directory.
//!
//! The orchestration here decides whether to search by national identifier
//! or by demographic details, requires the directory to yield exactly one
//! candidate, and refuses sensitive-flagged records before any redaction or
//! further processing. It never guesses among multiple candidates.
use serde::{Deserialize, Serialize};

use crate::newtypes::NationalId;
use crate::patient::Patient;

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

/// Search keys for detail-based lookup.
///
/// The fields are opaque to this core beyond "non-empty when used as a
/// search key"; their matching semantics belong to the external directory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DemographicQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<chrono::NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl DemographicQuery {
    /// Returns `true` if at least one search field carries a usable value.
    pub fn has_search_key(&self) -> bool {
        let non_empty = |field: &Option<String>| {
            field.as_deref().is_some_and(|value| !value.trim().is_empty())
        };
        non_empty(&self.given_name)
            || non_empty(&self.family_name)
            || self.date_of_birth.is_some()
            || non_empty(&self.postcode)
            || non_empty(&self.email)
    }
}

/// How a caller identifies the patient they want verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupCriteria {
    /// A checksum-valid national identifier; resolves via
    /// [`DemographicsDirectory::by_identifier`].
    ByIdentifier(NationalId),
    /// Demographic details; resolves via
    /// [`DemographicsDirectory::by_details`] and must match exactly one
    /// record.
    ByDetails(DemographicQuery),
}

// ---------------------------------------------------------------------------
// Directory collaborator
// ---------------------------------------------------------------------------

/// An infrastructure-level failure of the external demographics directory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("demographics directory failure: {message}")]
pub struct DirectoryError {
    /// Description of the failure, safe to log but not shown to end users.
    pub message: String,
}

impl DirectoryError {
    /// Constructs a [`DirectoryError`] from a message string.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The external demographics lookup service, specified only at this
/// boundary. Implementations live outside the core.
pub trait DemographicsDirectory {
    /// Resolves a patient by national identifier. `None` means no record.
    fn by_identifier(&self, id: &NationalId) -> Result<Option<Patient>, DirectoryError>;

    /// Resolves zero or more candidates by demographic details.
    fn by_details(&self, query: &DemographicQuery) -> Result<Vec<Patient>, DirectoryError>;
}

/// A directory backed by a fixed record set.
///
/// Used by the test suites and the CLI demo to stand in for the real
/// external service. Identifier lookups match on the national identifier;
/// detail lookups require every supplied field to match
/// (names case-insensitively).
#[derive(Debug, Default)]
pub struct StaticDirectory {
    records: Vec<Patient>,
}

impl StaticDirectory {
    /// Creates a directory holding `records`.
    pub fn new(records: Vec<Patient>) -> Self {
        Self { records }
    }
}

fn field_matches(queried: Option<&str>, held: Option<&str>) -> bool {
    match queried {
        Some(wanted) => held.is_some_and(|value| value.eq_ignore_ascii_case(wanted.trim())),
        None => true,
    }
}

impl DemographicsDirectory for StaticDirectory {
    fn by_identifier(&self, id: &NationalId) -> Result<Option<Patient>, DirectoryError> {
        Ok(self
            .records
            .iter()
            .find(|record| record.national_id.as_deref() == Some(&**id))
            .cloned())
    }

    fn by_details(&self, query: &DemographicQuery) -> Result<Vec<Patient>, DirectoryError> {
        let matches = self
            .records
            .iter()
            .filter(|record| {
                field_matches(
                    query.given_name.as_deref(),
                    Some(record.demographics.given_name.as_str()),
                )
                    && field_matches(
                        query.family_name.as_deref(),
                        Some(record.demographics.family_name.as_str()),
                    )
                    && query
                        .date_of_birth
                        .is_none_or(|dob| record.demographics.date_of_birth == Some(dob))
                    && field_matches(query.postcode.as_deref(), record.demographics.postcode.as_deref())
                    && field_matches(query.email.as_deref(), record.demographics.email.as_deref())
            })
            .cloned()
            .collect();
        Ok(matches)
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Reasons a lookup does not produce a usable patient.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// The directory returned no candidate for the criteria.
    #[error("no patient matches the supplied criteria")]
    NoMatch,
    /// More than one candidate matched; the orchestration never guesses.
    #[error("{count} patients match the supplied criteria; refine the search")]
    AmbiguousMatch {
        /// Number of candidates returned by the directory.
        count: usize,
    },
    /// The resolved record is flagged for manual handling. Distinguishable
    /// from [`LookupError::NoMatch`] so callers can route the request to a
    /// human instead of reporting a missing record.
    #[error("the resolved record has opted out of automated processing")]
    SensitiveRecord,
    /// Detail-based criteria carried no usable search field.
    #[error("detail-based lookup requires at least one non-empty search field")]
    EmptyCriteria,
    /// The directory itself failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Resolves exactly one patient for the given criteria.
///
/// Sensitive-flagged records are refused after resolution but before the
/// caller sees any of their content; redaction of the survivors is the
/// caller's next step.
pub fn resolve_patient(
    directory: &dyn DemographicsDirectory,
    criteria: &LookupCriteria,
) -> Result<Patient, LookupError> {
    let patient = match criteria {
        LookupCriteria::ByIdentifier(id) => {
            directory.by_identifier(id)?.ok_or(LookupError::NoMatch)?
        }
        LookupCriteria::ByDetails(query) => {
            if !query.has_search_key() {
                return Err(LookupError::EmptyCriteria);
            }
            let mut candidates = directory.by_details(query)?;
            if candidates.len() > 1 {
                return Err(LookupError::AmbiguousMatch {
                    count: candidates.len(),
                });
            }
            candidates.pop().ok_or(LookupError::NoMatch)?
        }
    };

    if patient.is_sensitive {
        return Err(LookupError::SensitiveRecord);
    }

    Ok(patient)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
