//! Ingest stage: drain the entity source into the staging store.

use log::info;

use super::PipelineError;
use crate::entity::Entity;
use crate::rules::TagRules;
use crate::source::EntitySource;
use crate::staging::{Namespace, StagingStore, encode_entity};

/// Counts of entities staged by [`ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestSummary {
    /// Number of nodes staged.
    pub nodes: u64,
    /// Number of ways staged.
    pub ways: u64,
    /// Number of relations staged.
    pub relations: u64,
    /// Number of relations selected directly by the tag rules.
    pub matched: u64,
}

impl IngestSummary {
    fn record(&mut self, entity: &Entity, namespace: Namespace) {
        match entity {
            Entity::Node(_) => self.nodes += 1,
            Entity::Way(_) => self.ways += 1,
            Entity::Relation(_) => self.relations += 1,
        }
        if namespace == Namespace::Collected {
            self.matched += 1;
        }
    }

    /// Total number of entities staged.
    pub const fn total(&self) -> u64 {
        self.nodes + self.ways + self.relations
    }
}

/// Namespace an entity is staged into on ingest.
///
/// Entities selected by the rules go straight to [`Namespace::Collected`];
/// everything else waits in [`Namespace::Plain`] for the closure.
pub fn classify(entity: &Entity, rules: &TagRules) -> Namespace {
    if rules.selects(entity) {
        Namespace::Collected
    } else {
        Namespace::Plain
    }
}

/// Stage every entity produced by `source`, in arrival order.
///
/// The source is drained exactly once. An entity seen again replaces the
/// earlier copy, in whichever namespace the later one classifies into, so a
/// key never sits in both namespaces. Any decode, encode or store failure
/// aborts ingestion; entities staged before the failure are left in place.
pub fn ingest<Src, St>(
    mut source: Src,
    store: &St,
    rules: &TagRules,
) -> Result<IngestSummary, PipelineError>
where
    Src: EntitySource,
    St: StagingStore,
{
    let mut summary = IngestSummary::default();
    while let Some(entity) = source.next_entity().map_err(PipelineError::decode)? {
        let namespace = classify(&entity, rules);
        let key = entity.key();
        let value = encode_entity(&entity)?;
        store.delete(namespace.other(), key)?;
        store.put(namespace, key, &value)?;
        summary.record(&entity, namespace);
    }
    info!(
        "Staged {} entities ({} nodes, {} ways, {} relations); {} relations matched the tag rules",
        summary.total(),
        summary.nodes,
        summary.ways,
        summary.relations,
        summary.matched
    );
    Ok(summary)
}
