//! CLI error type and exit-code mapping.
use std::fmt;

/// Failures the `idverify` binary reports to its caller.
///
/// Exit codes follow the usual convention: 1 for a negative verdict
/// (invalid identifier, validation violations, a refused operation),
/// 2 for input that could not be read or parsed at all.
#[derive(Debug)]
pub enum CliError {
    /// A file could not be read.
    ReadFailed {
        /// Path that failed.
        path: String,
        /// Underlying io error text.
        detail: String,
    },
    /// Input was not a valid record or argument.
    ParseFailed {
        /// What failed to parse.
        detail: String,
    },
    /// The identifier's check digit does not verify.
    InvalidIdentifier {
        /// The rejected input.
        value: String,
    },
    /// The validation engine reported violations (already printed).
    ValidationErrors {
        /// Number of violations found.
        count: usize,
    },
    /// A demo service operation was refused or failed.
    ServiceFailed {
        /// The service error text.
        detail: String,
    },
}

impl CliError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ReadFailed { .. } | Self::ParseFailed { .. } => 2,
            Self::InvalidIdentifier { .. }
            | Self::ValidationErrors { .. }
            | Self::ServiceFailed { .. } => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFailed { path, detail } => write!(f, "cannot read {path}: {detail}"),
            Self::ParseFailed { detail } => write!(f, "parse failure: {detail}"),
            Self::InvalidIdentifier { value } => {
                write!(f, "\"{value}\" is not a checksum-valid national identifier")
            }
            Self::ValidationErrors { count } => {
                write!(f, "validation failed with {count} violation(s)")
            }
            Self::ServiceFailed { detail } => write!(f, "operation failed: {detail}"),
        }
    }
}

impl std::error::Error for CliError {}
