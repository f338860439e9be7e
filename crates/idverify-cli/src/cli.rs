//! Clap CLI definition: root struct, subcommands, and shared argument types.
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Which persistence operation a record is validated for.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    /// Create-mode rules: no identifier, fresh audit stamps.
    Create,
    /// Modify-mode rules: compared against a stored record (`--existing`).
    Modify,
}

/// All top-level subcommands exposed by the `idverify` binary.
#[derive(Subcommand)]
pub enum Command {
    /// Check the mod-11 check digit of a national identifier.
    CheckId {
        /// The identifier to check; presentation spacing is accepted.
        #[arg(value_name = "IDENTIFIER")]
        value: String,
    },

    /// Run the record-validation engine over a patient record JSON file.
    Validate {
        /// Path to the candidate record.
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Validation mode (create or modify).
        #[arg(long, default_value = "create")]
        mode: ModeArg,
        /// Path to the stored record, required for modify mode.
        #[arg(long, value_name = "FILE")]
        existing: Option<PathBuf>,
        /// Acting principal the audit rules compare against.
        #[arg(long, default_value = "cli-operator")]
        principal: String,
    },

    /// Drive a scripted issue/verify round trip against an in-memory store.
    Demo,

    /// Print the idverify-core library version.
    Version,
}

/// Root CLI parser.
#[derive(Parser)]
#[command(name = "idverify", about = "Patient identity verification CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}
