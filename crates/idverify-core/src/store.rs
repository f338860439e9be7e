//! The storage collaborator boundary.
//!
//! Persistence is external to this core; [`PatientStore`] is the contract
//! it is consumed through. Implementations must surface duplicate keys,
//! foreign-key conflicts, and optimistic-concurrency conflicts as
//! distinguishable conditions so the service layer can map each to its own
//! error kind instead of passing raw driver errors through.
//!
//! [`MemoryStore`] is the reference implementation used by the test suites
//! and the CLI demo. Its interior mutex is its own consistency mechanism,
//! standing in for a database's row-stamp check; the core itself holds no
//! locks across calls.
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::newtypes::PatientId;
use crate::patient::Patient;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure conditions a store implementation must distinguish.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated.
    #[error("duplicate key: {detail}")]
    DuplicateKey {
        /// Which key collided.
        detail: String,
    },
    /// A referenced record does not exist.
    #[error("foreign key conflict: {detail}")]
    ForeignKeyConflict {
        /// Which reference failed.
        detail: String,
    },
    /// The record changed since the caller read it (row-stamp mismatch).
    #[error("concurrent modification detected for \"{id}\"")]
    ConcurrencyConflict {
        /// Identifier of the contested record.
        id: String,
    },
    /// The record to update does not exist.
    #[error("no stored record with id \"{id}\"")]
    NotFound {
        /// Identifier that failed to resolve.
        id: String,
    },
    /// An infrastructure-level failure (connection, timeout, corruption).
    #[error("storage backend failure: {message}")]
    Backend {
        /// Description safe for logs.
        message: String,
    },
}

impl StoreError {
    /// Constructs a [`StoreError::Backend`] from a message string.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Storage operations the verification core consumes.
///
/// Every write commits fully or not at all; partially-applied field updates
/// must never become visible to other callers.
pub trait PatientStore {
    /// Fetches a record by its stable identifier.
    fn select_by_id(&self, id: &PatientId) -> Result<Option<Patient>, StoreError>;

    /// Persists a new record, assigning its identifier if absent.
    ///
    /// Returns the stored form (assigned id, `row_version` 1).
    fn insert(&self, patient: &Patient) -> Result<Patient, StoreError>;

    /// Persists an update, guarded by the row stamp the caller read.
    ///
    /// Fails with [`StoreError::ConcurrencyConflict`] when the stored
    /// `row_version` no longer equals `expected_version`. Returns the stored
    /// form with the incremented stamp.
    fn update(&self, patient: &Patient, expected_version: u64) -> Result<Patient, StoreError>;

    /// Fetches every stored record.
    fn select_all(&self) -> Result<Vec<Patient>, StoreError>;
}

impl<T: PatientStore + ?Sized> PatientStore for std::sync::Arc<T> {
    fn select_by_id(&self, id: &PatientId) -> Result<Option<Patient>, StoreError> {
        (**self).select_by_id(id)
    }

    fn insert(&self, patient: &Patient) -> Result<Patient, StoreError> {
        (**self).insert(patient)
    }

    fn update(&self, patient: &Patient, expected_version: u64) -> Result<Patient, StoreError> {
        (**self).update(patient, expected_version)
    }

    fn select_all(&self) -> Result<Vec<Patient>, StoreError> {
        (**self).select_all()
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory [`PatientStore`] with the same observable semantics as a
/// row-stamped table: unique national identifiers, versioned updates,
/// full-record commits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, Patient>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Patient>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::backend("store mutex poisoned"))
    }

    fn assign_id(&self) -> Result<PatientId, StoreError> {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        PatientId::try_from(format!("p-{n:06}").as_str())
            .map_err(|err| StoreError::backend(err.to_string()))
    }
}

impl PatientStore for MemoryStore {
    fn select_by_id(&self, id: &PatientId) -> Result<Option<Patient>, StoreError> {
        Ok(self.records()?.get(&**id).cloned())
    }

    fn insert(&self, patient: &Patient) -> Result<Patient, StoreError> {
        let mut records = self.records()?;

        if let Some(national_id) = &patient.national_id {
            let clash = records
                .values()
                .any(|existing| existing.national_id.as_deref() == Some(national_id));
            if clash {
                return Err(StoreError::DuplicateKey {
                    detail: format!("national_id \"{national_id}\""),
                });
            }
        }

        let id = match &patient.id {
            Some(id) => {
                if records.contains_key(&**id) {
                    return Err(StoreError::DuplicateKey {
                        detail: format!("id \"{id}\""),
                    });
                }
                id.clone()
            }
            None => self.assign_id()?,
        };

        let mut stored = patient.clone();
        stored.id = Some(id.clone());
        stored.row_version = 1;
        records.insert(id.to_string(), stored.clone());
        Ok(stored)
    }

    fn update(&self, patient: &Patient, expected_version: u64) -> Result<Patient, StoreError> {
        let Some(id) = &patient.id else {
            return Err(StoreError::backend("update requires an assigned record id"));
        };

        let mut records = self.records()?;
        let Some(current) = records.get(&**id) else {
            return Err(StoreError::NotFound { id: id.to_string() });
        };

        if current.row_version != expected_version {
            return Err(StoreError::ConcurrencyConflict { id: id.to_string() });
        }

        let mut stored = patient.clone();
        stored.row_version = expected_version + 1;
        records.insert(id.to_string(), stored.clone());
        Ok(stored)
    }

    fn select_all(&self) -> Result<Vec<Patient>, StoreError> {
        Ok(self.records()?.values().cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
