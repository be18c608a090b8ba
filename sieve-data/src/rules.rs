//! Loading tag rule files.

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use sieve_core::TagRules;
use sieve_fs::read_utf8_to_string;
use thiserror::Error;

/// Errors raised while loading a tag rule file.
#[derive(Debug, Error)]
pub enum RulesFileError {
    /// The file could not be read.
    #[error("failed to read tag rules from {path}: {source}")]
    Open {
        /// Path of the rule file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a valid rule mapping.
    #[error("failed to parse tag rules in {path}: {source}")]
    Parse {
        /// Path of the rule file.
        path: Utf8PathBuf,
        /// Source error returned by `serde_yaml`.
        #[source]
        source: serde_yaml::Error,
    },
}

/// Load tag rules from a YAML mapping of tag key to matcher.
///
/// A document holding only blank lines or comments yields an empty rule
/// set, which selects nothing.
///
/// # Examples
/// ```no_run
/// use camino::Utf8Path;
/// use sieve_data::load_tag_rules;
///
/// # fn main() -> Result<(), sieve_data::RulesFileError> {
/// let rules = load_tag_rules(Utf8Path::new("tags.yaml"))?;
/// println!("{} tag rules loaded", rules.len());
/// # Ok(())
/// # }
/// ```
pub fn load_tag_rules(path: &Utf8Path) -> Result<TagRules, RulesFileError> {
    let contents = read_utf8_to_string(path).map_err(|source| RulesFileError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let rules = parse_tag_rules(&contents).map_err(|source| RulesFileError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Loaded {} tag rules from {path}", rules.len());
    Ok(rules)
}

fn parse_tag_rules(contents: &str) -> Result<TagRules, serde_yaml::Error> {
    let blank = contents.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    });
    if blank {
        return Ok(TagRules::default());
    }
    serde_yaml::from_str::<Option<TagRules>>(contents).map(Option::unwrap_or_default)
}
