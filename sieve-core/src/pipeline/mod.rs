//! The selective extraction pipeline.
//!
//! Three stages run strictly in sequence against one staging store:
//!
//! 1. [`ingest`] drains the entity source, staging rule-matched relations as
//!    collected and everything else as plain.
//! 2. [`collect_closure`] promotes every entity reachable from a collected
//!    relation until the collected namespace is closed under membership.
//! 3. [`emit_json`] streams the collected namespace as a JSON array.
//!
//! [`run_extraction`] wires the stages together. Output is only written once
//! the closure has completed, so a failed run never produces partial JSON
//! from the earlier stages.

use std::error::Error as StdError;
use std::io::{self, Write};

use thiserror::Error;

use crate::entity::ElementKind;
use crate::rules::TagRules;
use crate::source::EntitySource;
use crate::staging::{CodecError, StagingError, StagingKey, StagingStore};

mod closure;
mod emit;
mod ingest;

pub use closure::{ClosureSummary, collect_closure};
pub use emit::emit_json;
pub use ingest::{IngestSummary, classify, ingest};

/// Errors that abort an extraction run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The entity source failed to decode its input.
    #[error("failed to decode entity stream: {source}")]
    Decode {
        /// Error reported by the entity source.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    /// The staging store failed.
    #[error(transparent)]
    Staging(#[from] StagingError),
    /// A staged value failed to encode or decode.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// A relation key held a value of another kind.
    #[error("staged value for {key:?} is a {found:?}, not a relation")]
    KindMismatch {
        /// Key the value was stored under.
        key: StagingKey,
        /// Kind the value decoded as.
        found: ElementKind,
    },
    /// Writing the output failed.
    #[error("failed to write extract output: {source}")]
    Write {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    fn decode<E>(source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Decode {
            source: Box::new(source),
        }
    }

    const fn write(source: io::Error) -> Self {
        Self::Write { source }
    }
}

/// Summary of a completed extraction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractionReport {
    /// Counts from the ingest stage.
    pub ingest: IngestSummary,
    /// Counts from the closure stage.
    pub closure: ClosureSummary,
    /// Number of entities written to the output.
    pub emitted: u64,
}

/// Run a complete extraction: clear, ingest, close, emit.
///
/// The store is cleared first so that a reused staging location never leaks
/// entities from an earlier run.
pub fn run_extraction<Src, St, W>(
    source: Src,
    store: &St,
    rules: &TagRules,
    writer: W,
) -> Result<ExtractionReport, PipelineError>
where
    Src: EntitySource,
    St: StagingStore,
    W: Write,
{
    store.clear()?;
    let ingest = ingest(source, store, rules)?;
    store.commit()?;
    let closure = collect_closure(store)?;
    store.commit()?;
    let emitted = emit_json(store, writer)?;
    Ok(ExtractionReport {
        ingest,
        closure,
        emitted,
    })
}
