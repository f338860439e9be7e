//! Implementation of `idverify validate <file>`.
//!
//! Parses a patient record JSON file and runs the record-validation engine
//! in the requested mode, emitting the aggregated report as JSON on stdout.
//!
//! Exit codes:
//! - 0 = the record passed every rule
//! - 1 = one or more violations (the report was printed)
//! - 2 = a file could not be read or parsed
use std::path::Path;

use idverify_core::{
    Clock, Patient, PrincipalId, RuleContext, SystemClock, ValidationConfig, WriteMode,
    validate_patient,
};

use crate::cli::ModeArg;
use crate::error::CliError;

fn load_record(path: &Path) -> Result<Patient, CliError> {
    let content = std::fs::read_to_string(path).map_err(|err| CliError::ReadFailed {
        path: path.display().to_string(),
        detail: err.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|err| CliError::ParseFailed {
        detail: format!("{}: line {}, column {}: {err}", path.display(), err.line(), err.column()),
    })
}

/// Runs the `validate` command.
pub fn run(
    file: &Path,
    mode: ModeArg,
    existing: Option<&Path>,
    principal: &str,
) -> Result<(), CliError> {
    let candidate = load_record(file)?;
    let existing = existing.map(load_record).transpose()?;

    let principal = PrincipalId::try_from(principal).map_err(|err| CliError::ParseFailed {
        detail: err.to_string(),
    })?;

    let mode = match mode {
        ModeArg::Create => WriteMode::Create,
        ModeArg::Modify => WriteMode::Modify,
    };

    let ctx = RuleContext {
        principal,
        now: SystemClock.now(),
        config: ValidationConfig::default(),
    };

    let report = validate_patient(&candidate, existing.as_ref(), mode, &ctx);
    if report.is_empty() {
        println!("ok");
        return Ok(());
    }

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            return Err(CliError::ParseFailed {
                detail: err.to_string(),
            });
        }
    }
    Err(CliError::ValidationErrors {
        count: report.len(),
    })
}
