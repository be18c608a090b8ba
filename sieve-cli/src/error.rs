//! Error types emitted by the `osm-sieve` CLI.
//!
//! Every variant maps to a process exit code: `2` for usage and
//! configuration problems, `1` for failures while extracting.

use std::sync::Arc;

use camino::Utf8PathBuf;
use sieve_core::PipelineError;
use sieve_data::{PbfSourceError, RulesFileError, SqliteStagingError};
use thiserror::Error;

const EXIT_RUNTIME: i32 = 1;
const EXIT_USAGE: i32 = 2;

/// Errors emitted by the `osm-sieve` CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation, or help was requested.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (pass at least one path or set {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The tag rule file could not be loaded.
    #[error(transparent)]
    LoadRules(#[from] RulesFileError),
    /// Opening the staging database failed.
    #[error(transparent)]
    OpenStaging(#[from] SqliteStagingError),
    /// Opening the PBF inputs failed.
    #[error(transparent)]
    OpenInput(#[from] PbfSourceError),
    /// The extraction pipeline failed.
    #[error(transparent)]
    Extract(#[from] PipelineError),
    /// Writing the trailing newline of the extract failed.
    #[error("failed to write extract output: {0}")]
    WriteOutput(#[source] std::io::Error),
}

impl CliError {
    /// Process exit code reported for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ArgumentParsing(err) => err.exit_code(),
            Self::Configuration(_)
            | Self::MissingArgument { .. }
            | Self::MissingSourceFile { .. }
            | Self::SourcePathNotFile { .. }
            | Self::InspectSourcePath { .. }
            | Self::LoadRules(_) => EXIT_USAGE,
            Self::OpenStaging(_) | Self::OpenInput(_) | Self::Extract(_) | Self::WriteOutput(_) => {
                EXIT_RUNTIME
            }
        }
    }
}
