//! File formats and storage engines for `osm-sieve`.
//!
//! Responsibilities:
//! - Decode OSM PBF extracts into the entity stream the pipeline consumes.
//! - Persist the staging namespaces in an on-disk SQLite database.
//! - Load tag rule files written in YAML.
//!
//! Boundaries:
//! - Extraction semantics live in `sieve-core`; this crate only adapts I/O.
//! - No process concerns such as argument parsing or exit codes.
//!
//! Invariants:
//! - Input files are read strictly sequentially, one blob at a time.
//! - The staging database location is a pure function of the input paths.

#![forbid(unsafe_code)]

pub mod pbf;
pub mod rules;
pub mod staging;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use pbf::{PbfEntitySource, PbfSourceError};
pub use rules::{RulesFileError, load_tag_rules};
pub use staging::{SqliteStagingError, SqliteStagingStore, staging_path_for};
