//! Command-line interface for `osm-sieve`.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod extract;

pub use error::CliError;

use extract::ExtractArgs;

pub(crate) const ARG_TAGS: &str = "tags";
pub(crate) const ARG_STAGING_DIR: &str = "staging-dir";
pub(crate) const ARG_INPUTS: &str = "inputs";
pub(crate) const ENV_INPUTS: &str = "OSM_SIEVE_CMDS_EXTRACT_INPUTS";
pub(crate) const DEFAULT_TAGS_FILE: &str = "tags.yaml";
pub(crate) const DEFAULT_STAGING_DIR: &str = ".";

/// Run the CLI with the current process arguments and environment, writing
/// the extract to standard output.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Extract(args) => extract::run_extract(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "osm-sieve",
    about = "Extract tag-selected relations, and everything they reference, from OSM PBF files",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write matched relations and their transitive members as JSON.
    Extract(ExtractArgs),
}

#[cfg(test)]
mod tests;
