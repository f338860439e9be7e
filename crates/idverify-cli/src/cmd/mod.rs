//! Subcommand implementations and dispatch.
use crate::cli::Command;
use crate::error::CliError;

mod check_id;
mod demo;
mod validate;

/// Dispatches a parsed subcommand.
pub fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::CheckId { value } => check_id::run(&value),
        Command::Validate {
            file,
            mode,
            existing,
            principal,
        } => validate::run(&file, mode, existing.as_deref(), &principal),
        Command::Demo => demo::run(),
        Command::Version => {
            println!("{}", idverify_core::version());
            Ok(())
        }
    }
}
