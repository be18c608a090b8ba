//! Core extraction logic for `osm-sieve`.
//!
//! Responsibilities:
//! - Model OSM entities and the tag rules that select them.
//! - Define the staging store and entity source contracts.
//! - Run the ingest, closure and output stages over those contracts.
//!
//! Boundaries:
//! - No file formats or storage engines live here (see `sieve-data`).
//! - No process concerns such as argument parsing or exit codes.
//!
//! Invariants:
//! - An entity key lives in at most one staging namespace at a time.
//! - No global mutable state; the collected key marker is a constant.

#![forbid(unsafe_code)]

pub mod entity;
pub mod pipeline;
pub mod rules;
pub mod source;
pub mod staging;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use entity::{ElementKind, Entity, Member, Node, Relation, Tags, Way};
pub use pipeline::{
    ClosureSummary, ExtractionReport, IngestSummary, PipelineError, classify, collect_closure,
    emit_json, ingest, run_extraction,
};
pub use rules::{Matcher, TagRules};
pub use source::EntitySource;
pub use staging::{
    COLLECTED_MARKER, CodecError, Namespace, StagedRecord, StagingError, StagingIter, StagingKey,
    StagingStore,
};
