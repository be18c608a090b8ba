//! Extract command implementation for the `osm-sieve` CLI.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::{debug, info};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use sieve_core::run_extraction;
use sieve_data::{PbfEntitySource, SqliteStagingStore, load_tag_rules, staging_path_for};
use std::io::{BufWriter, Write};

use crate::{
    ARG_INPUTS, ARG_STAGING_DIR, ARG_TAGS, CliError, DEFAULT_STAGING_DIR, DEFAULT_TAGS_FILE,
    ENV_INPUTS,
};

/// CLI arguments for the `extract` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Read one or more OSM PBF files as a single stream, select \
                 every relation whose tags satisfy the rule file, and write \
                 those relations plus all nodes, ways and relations they \
                 reference (transitively) to standard output as one JSON \
                 array. Entities are staged in a SQLite database named after \
                 the md5 of the input paths.",
    about = "Extract tag-selected relations and their members as JSON"
)]
#[ortho_config(prefix = "OSM_SIEVE")]
pub(crate) struct ExtractArgs {
    /// YAML file mapping tag keys to `true`, a value, or a list of values.
    #[arg(long = ARG_TAGS, value_name = "path")]
    #[serde(default)]
    pub(crate) tags: Option<Utf8PathBuf>,
    /// Directory holding the staging database.
    #[arg(long = ARG_STAGING_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) staging_dir: Option<Utf8PathBuf>,
    /// OSM PBF files, read in the order given.
    #[arg(value_name = "path")]
    #[serde(default)]
    pub(crate) inputs: Vec<Utf8PathBuf>,
}

impl ExtractArgs {
    pub(crate) fn into_config(self) -> Result<ExtractConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ExtractConfig::try_from(merged)
    }
}

/// Resolved `extract` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExtractConfig {
    /// Path to the YAML tag rule file.
    pub(crate) tags: Utf8PathBuf,
    /// Directory the staging database is derived under.
    pub(crate) staging_dir: Utf8PathBuf,
    /// PBF inputs in stream order.
    pub(crate) inputs: Vec<Utf8PathBuf>,
}

impl ExtractConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        Self::require_existing(&self.tags, ARG_TAGS)?;
        for input in &self.inputs {
            Self::require_existing(input, ARG_INPUTS)?;
        }
        Ok(())
    }

    /// Location of the staging database for this input list.
    pub(crate) fn staging_path(&self) -> Utf8PathBuf {
        staging_path_for(&self.staging_dir, self.inputs.as_slice())
    }

    fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
        match sieve_fs::file_is_file(path) {
            Ok(true) => Ok(()),
            Ok(false) => Err(CliError::SourcePathNotFile {
                field,
                path: path.to_path_buf(),
            }),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                Err(CliError::MissingSourceFile {
                    field,
                    path: path.to_path_buf(),
                })
            }
            Err(source) => Err(CliError::InspectSourcePath {
                field,
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl TryFrom<ExtractArgs> for ExtractConfig {
    type Error = CliError;

    fn try_from(args: ExtractArgs) -> Result<Self, Self::Error> {
        if args.inputs.is_empty() {
            return Err(CliError::MissingArgument {
                field: ARG_INPUTS,
                env: ENV_INPUTS,
            });
        }
        Ok(Self {
            tags: args
                .tags
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_TAGS_FILE)),
            staging_dir: args
                .staging_dir
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_STAGING_DIR)),
            inputs: args.inputs,
        })
    }
}

pub(super) fn run_extract(args: ExtractArgs) -> Result<(), CliError> {
    let mut stdout = std::io::stdout().lock();
    run_extract_with(args, &mut stdout)
}

pub(super) fn run_extract_with(args: ExtractArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let config = resolve_extract_config(args)?;
    execute_extract(&config, writer)
}

fn resolve_extract_config(args: ExtractArgs) -> Result<ExtractConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

fn execute_extract(config: &ExtractConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    let rules = load_tag_rules(&config.tags)?;
    let staging_path = config.staging_path();
    debug!("Staging entities in {staging_path}");
    let store = SqliteStagingStore::open(&staging_path)?;
    let source = PbfEntitySource::open(config.inputs.as_slice())?;

    let mut buffered = BufWriter::new(writer);
    let report = run_extraction(source, &store, &rules, &mut buffered)?;
    buffered.write_all(b"\n").map_err(CliError::WriteOutput)?;
    buffered.flush().map_err(CliError::WriteOutput)?;

    info!(
        "Extracted {} entities from {} input file(s) ({} relations matched)",
        report.emitted,
        config.inputs.len(),
        report.ingest.matched
    );
    Ok(())
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<ExtractConfig, CliError> {
    let merged = ExtractArgs::merge_from_layers(layers).map_err(CliError::from)?;
    ExtractConfig::try_from(merged)
}
