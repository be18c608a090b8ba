//! Closure stage: promote every entity reachable from a collected relation.
//!
//! The walk starts from each relation in [`Namespace::Collected`] and moves
//! referenced members out of [`Namespace::Plain`]. Promoted relations are
//! descended into through an explicit stack of member iterators, so deep
//! relation chains never grow the call stack, and a visited set of relation
//! keys keeps cyclic membership from being walked twice.

use std::collections::HashSet;

use log::{debug, info};

use super::PipelineError;
use crate::entity::{ElementKind, Entity, Member, Relation};
use crate::staging::{Namespace, StagingKey, StagingStore, decode_entity};

/// Outcome of [`collect_closure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClosureSummary {
    /// Relations whose member lists were walked.
    pub relations_walked: u64,
    /// Entities moved from the plain to the collected namespace.
    pub promoted: u64,
    /// Member references absent from both namespaces.
    pub dangling: u64,
}

/// Close the collected namespace under relation membership.
///
/// After a successful return every member of every collected relation is
/// itself collected, unless it was never ingested. A single pass over the
/// collected namespace suffices: newly promoted relations are walked before
/// the outer scan advances.
pub fn collect_closure<St: StagingStore>(store: &St) -> Result<ClosureSummary, PipelineError> {
    let mut walker = ClosureWalker::new(store);
    for record in store.iter(Namespace::Collected) {
        let (key, value) = record?;
        match key.kind {
            ElementKind::Relation => walker.walk_from(key, &value)?,
            ElementKind::Node | ElementKind::Way => {}
        }
    }
    let summary = walker.summary;
    info!(
        "Closure walked {} relations, promoted {} entities, skipped {} dangling members",
        summary.relations_walked, summary.promoted, summary.dangling
    );
    Ok(summary)
}

struct ClosureWalker<'a, St> {
    store: &'a St,
    visited: HashSet<StagingKey>,
    summary: ClosureSummary,
}

impl<'a, St: StagingStore> ClosureWalker<'a, St> {
    fn new(store: &'a St) -> Self {
        Self {
            store,
            visited: HashSet::new(),
            summary: ClosureSummary::default(),
        }
    }

    fn walk_from(&mut self, key: StagingKey, value: &[u8]) -> Result<(), PipelineError> {
        if !self.visited.insert(key) {
            return Ok(());
        }
        let root = decode_relation(key, value)?;
        self.summary.relations_walked += 1;

        let mut stack = vec![root.members.into_iter()];
        while let Some(members) = stack.last_mut() {
            let Some(member) = members.next() else {
                stack.pop();
                continue;
            };
            if let Some(promoted) = self.collect_member(&member)? {
                self.summary.relations_walked += 1;
                stack.push(promoted.members.into_iter());
            }
        }
        Ok(())
    }

    /// Promote one member, returning it when it is a relation still to walk.
    fn collect_member(&mut self, member: &Member) -> Result<Option<Relation>, PipelineError> {
        let key = member.key();
        let Some(value) = self.store.get(Namespace::Plain, key)? else {
            if self.store.get(Namespace::Collected, key)?.is_none() {
                self.summary.dangling += 1;
                debug!("Skipped member {key:?}: not present in the extract");
            }
            return Ok(None);
        };

        self.store.delete(Namespace::Plain, key)?;
        self.store.put(Namespace::Collected, key, &value)?;
        self.summary.promoted += 1;

        match key.kind {
            ElementKind::Relation if self.visited.insert(key) => {
                decode_relation(key, &value).map(Some)
            }
            ElementKind::Relation | ElementKind::Node | ElementKind::Way => Ok(None),
        }
    }
}

fn decode_relation(key: StagingKey, value: &[u8]) -> Result<Relation, PipelineError> {
    match decode_entity(key, value)? {
        Entity::Relation(relation) => Ok(relation),
        other @ (Entity::Node(_) | Entity::Way(_)) => Err(PipelineError::KindMismatch {
            key,
            found: other.kind(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Tags;
    use crate::staging::encode_entity;
    use crate::test_support::{MemoryStagingStore, node, relation, way};
    use rstest::rstest;

    fn stage(store: &MemoryStagingStore, namespace: Namespace, entity: &Entity) {
        let value = encode_entity(entity).expect("encode");
        store.put(namespace, entity.key(), &value).expect("put");
    }

    fn key(kind: ElementKind, id: i64) -> StagingKey {
        StagingKey::new(kind, id)
    }

    #[rstest]
    fn promotes_direct_members() {
        let store = MemoryStagingStore::default();
        stage(
            &store,
            Namespace::Collected,
            &relation(1, Tags::new(), [(ElementKind::Way, 10), (ElementKind::Node, 20)]),
        );
        stage(&store, Namespace::Plain, &way(10, Tags::new()));
        stage(&store, Namespace::Plain, &node(20));
        stage(&store, Namespace::Plain, &node(30));

        let summary = collect_closure(&store).expect("closure");

        assert_eq!(summary.promoted, 2);
        assert_eq!(summary.dangling, 0);
        assert!(store.contains(Namespace::Collected, key(ElementKind::Way, 10)));
        assert!(store.contains(Namespace::Collected, key(ElementKind::Node, 20)));
        assert!(!store.contains(Namespace::Plain, key(ElementKind::Way, 10)));
        assert!(store.contains(Namespace::Plain, key(ElementKind::Node, 30)));
    }

    #[rstest]
    fn descends_into_promoted_relations() {
        let store = MemoryStagingStore::default();
        stage(
            &store,
            Namespace::Collected,
            &relation(1, Tags::new(), [(ElementKind::Relation, 2)]),
        );
        stage(
            &store,
            Namespace::Plain,
            &relation(2, Tags::new(), [(ElementKind::Relation, 3)]),
        );
        stage(
            &store,
            Namespace::Plain,
            &relation(3, Tags::new(), [(ElementKind::Node, 7)]),
        );
        stage(&store, Namespace::Plain, &node(7));

        let summary = collect_closure(&store).expect("closure");

        assert_eq!(summary.relations_walked, 3);
        assert_eq!(summary.promoted, 3);
        assert_eq!(store.len(Namespace::Plain), 0);
        assert_eq!(store.len(Namespace::Collected), 4);
    }

    #[rstest]
    fn cyclic_membership_terminates() {
        let store = MemoryStagingStore::default();
        stage(
            &store,
            Namespace::Collected,
            &relation(1, Tags::new(), [(ElementKind::Relation, 2)]),
        );
        stage(
            &store,
            Namespace::Plain,
            &relation(2, Tags::new(), [(ElementKind::Relation, 1), (ElementKind::Relation, 2)]),
        );

        let summary = collect_closure(&store).expect("closure");

        assert_eq!(summary.relations_walked, 2);
        assert_eq!(summary.promoted, 1);
        assert_eq!(summary.dangling, 0);
        assert_eq!(store.len(Namespace::Collected), 2);
    }

    #[rstest]
    fn tolerates_dangling_members() {
        let store = MemoryStagingStore::default();
        stage(
            &store,
            Namespace::Collected,
            &relation(1, Tags::new(), [(ElementKind::Way, 404), (ElementKind::Node, 5)]),
        );
        stage(&store, Namespace::Plain, &node(5));

        let summary = collect_closure(&store).expect("dangling members are not fatal");

        assert_eq!(summary.dangling, 1);
        assert_eq!(summary.promoted, 1);
        assert!(store.contains(Namespace::Collected, key(ElementKind::Node, 5)));
    }

    #[rstest]
    fn shared_members_are_promoted_once() {
        let store = MemoryStagingStore::default();
        for id in [1, 2] {
            stage(
                &store,
                Namespace::Collected,
                &relation(id, Tags::new(), [(ElementKind::Node, 9)]),
            );
        }
        stage(&store, Namespace::Plain, &node(9));

        let summary = collect_closure(&store).expect("closure");

        assert_eq!(summary.promoted, 1);
        assert_eq!(summary.dangling, 0);
        assert_eq!(store.len(Namespace::Collected), 3);
    }

    #[rstest]
    fn deep_chains_do_not_recurse() {
        let store = MemoryStagingStore::default();
        let depth = 5_000;
        stage(
            &store,
            Namespace::Collected,
            &relation(0, Tags::new(), [(ElementKind::Relation, 1)]),
        );
        for id in 1..depth {
            stage(
                &store,
                Namespace::Plain,
                &relation(id, Tags::new(), [(ElementKind::Relation, id + 1)]),
            );
        }

        let summary = collect_closure(&store).expect("closure");

        assert_eq!(summary.promoted, u64::try_from(depth - 1).expect("positive depth"));
        assert_eq!(summary.dangling, 1);
        assert_eq!(store.len(Namespace::Plain), 0);
    }

    #[rstest]
    fn rejects_relation_key_holding_other_kind() {
        let store = MemoryStagingStore::default();
        let value = encode_entity(&node(1)).expect("encode");
        store
            .put(Namespace::Collected, key(ElementKind::Relation, 1), &value)
            .expect("put");

        let err = collect_closure(&store).expect_err("mismatched kind");
        match err {
            PipelineError::KindMismatch { key: reported, found } => {
                assert_eq!(reported, key(ElementKind::Relation, 1));
                assert_eq!(found, ElementKind::Node);
            }
            other => panic!("expected kind mismatch, got {other:?}"),
        }
    }
}
