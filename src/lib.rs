//! Facade crate for `osm-sieve`, a selective extractor for OpenStreetMap PBF
//! files.
//!
//! This crate re-exports the core entity model and extraction pipeline, and
//! exposes the PBF decoder and SQLite staging store behind the `store-sqlite`
//! feature.

#![forbid(unsafe_code)]

pub use sieve_core::{
    ElementKind, Entity, EntitySource, ExtractionReport, Matcher, Member, Namespace, Node,
    PipelineError, Relation, StagingError, StagingKey, StagingStore, TagRules, Tags, Way,
    run_extraction,
};

#[cfg(feature = "store-sqlite")]
pub use sieve_data::{
    PbfEntitySource, PbfSourceError, RulesFileError, SqliteStagingError, SqliteStagingStore,
    load_tag_rules, staging_path_for,
};
