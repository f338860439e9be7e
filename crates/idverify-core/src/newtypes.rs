/// Validated newtype wrappers for core identity-verification string types.
///
/// Each newtype enforces a shape constraint at construction time via
/// [`TryFrom<&str>`]. Once constructed, the inner value is immutable (no
/// `DerefMut`). Serde `Deserialize` impls re-run validation so invalid data
/// cannot enter the type system from untrusted JSON.
use std::fmt;
use std::ops::Deref;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::check_digits::is_valid_national_identifier;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors produced when constructing a validated newtype from an invalid string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewtypeError {
    /// The string did not match the expected format.
    InvalidFormat {
        /// Name of the type that rejected the input.
        type_name: &'static str,
        /// A human-readable description of the expected format.
        expected: &'static str,
        /// The input that was rejected.
        got: String,
    },
}

impl fmt::Display for NewtypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat {
                type_name,
                expected,
                got,
            } => write!(f, "invalid {type_name}: expected {expected}, got {got:?}"),
        }
    }
}

impl std::error::Error for NewtypeError {}

// ---------------------------------------------------------------------------
// Regex statics
//
// All patterns are compile-time string literals; Regex::new never returns Err
// for them. The fallback chain is required because the workspace bans
// expect() and unwrap(), but "a^" (a pattern that never matches) is always
// valid, so we use it as a safe fallback that satisfies the type checker.
// ---------------------------------------------------------------------------

/// Matches exactly 5 upper-case alphanumeric characters.
static VERIFICATION_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z0-9]{5}$").unwrap_or_else(|_| {
        Regex::new("a^").unwrap_or_else(|_| unreachable!("regex engine broken"))
    })
});

/// Matches an opaque internal record identifier.
static PATIENT_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").unwrap_or_else(|_| {
        Regex::new("a^").unwrap_or_else(|_| unreachable!("regex engine broken"))
    })
});

/// Matches an acting-principal identifier (user id, service account, etc.).
static PRINCIPAL_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9@._-]{0,127}$").unwrap_or_else(|_| {
        Regex::new("a^").unwrap_or_else(|_| unreachable!("regex engine broken"))
    })
});

// ---------------------------------------------------------------------------
// NationalId
// ---------------------------------------------------------------------------

/// A checksum-valid 10-digit national patient identifier.
///
/// Construction strips presentation whitespace and requires the mod-11
/// weighted check digit to verify (see [`crate::check_digits`]). The stored
/// form is always the bare 10 digits.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NationalId(String);

impl TryFrom<&str> for NationalId {
    type Error = NewtypeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        if is_valid_national_identifier(s) {
            let digits: String = s.chars().filter(char::is_ascii_digit).collect();
            Ok(Self(digits))
        } else {
            Err(NewtypeError::InvalidFormat {
                type_name: "NationalId",
                expected: "10 digits with a valid mod-11 check digit",
                got: s.to_owned(),
            })
        }
    }
}

impl Deref for NationalId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NationalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NationalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for NationalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NationalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::try_from(s.as_str()).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// VerificationCode
// ---------------------------------------------------------------------------

/// A 5-character one-time verification code.
///
/// Codes are matched case-insensitively, so construction upper-cases the
/// input before checking the `[A-Z0-9]{5}` shape. The stored form is always
/// upper-case, which makes comparison a plain equality check.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VerificationCode(String);

impl VerificationCode {
    /// Infallible constructor for the code generator, whose alphabet is a
    /// strict subset of the accepted shape. Not part of the public API.
    pub(crate) fn from_trusted(text: String) -> Self {
        Self(text)
    }
}

impl TryFrom<&str> for VerificationCode {
    type Error = NewtypeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let upper = s.trim().to_ascii_uppercase();
        if VERIFICATION_CODE_RE.is_match(&upper) {
            Ok(Self(upper))
        } else {
            Err(NewtypeError::InvalidFormat {
                type_name: "VerificationCode",
                expected: "exactly 5 alphanumeric characters",
                got: s.to_owned(),
            })
        }
    }
}

impl Deref for VerificationCode {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for VerificationCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for VerificationCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VerificationCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::try_from(s.as_str()).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// PatientId
// ---------------------------------------------------------------------------

/// The stable internal identifier of a patient record.
///
/// Opaque and immutable once assigned by the storage layer. The shape
/// constraint only guards against accidental whitespace or path characters
/// leaking into keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatientId(String);

impl TryFrom<&str> for PatientId {
    type Error = NewtypeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        if PATIENT_ID_RE.is_match(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(NewtypeError::InvalidFormat {
                type_name: "PatientId",
                expected: "1-64 alphanumeric, dash or underscore characters",
                got: s.to_owned(),
            })
        }
    }
}

impl Deref for PatientId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PatientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for PatientId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PatientId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::try_from(s.as_str()).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// PrincipalId
// ---------------------------------------------------------------------------

/// The identifier of the acting principal (user or service account)
/// recorded in audit fields and compared by the audit-invariant rules.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrincipalId(String);

impl TryFrom<&str> for PrincipalId {
    type Error = NewtypeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        if PRINCIPAL_ID_RE.is_match(s) {
            Ok(Self(s.to_owned()))
        } else {
            Err(NewtypeError::InvalidFormat {
                type_name: "PrincipalId",
                expected: "1-128 printable identifier characters",
                got: s.to_owned(),
            })
        }
    }
}

impl Deref for PrincipalId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PrincipalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for PrincipalId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PrincipalId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::try_from(s.as_str()).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
