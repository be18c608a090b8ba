//! Test-only staging store, entity source and entity builders used by unit
//! and behaviour tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::convert::Infallible;
use std::ops::Bound;

use crate::entity::{ElementKind, Entity, Member, Node, Relation, Tags, Way};
use crate::source::EntitySource;
use crate::staging::{Namespace, StagedRecord, StagingError, StagingKey, StagingStore};

/// In-memory [`StagingStore`] keyed by encoded bytes.
///
/// Keys are ordered exactly as an on-disk engine would order them, so scans
/// and namespace bounds behave like the SQLite store.
#[derive(Debug, Default)]
pub struct MemoryStagingStore {
    entries: RefCell<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStagingStore {
    /// Number of keys staged in `namespace`.
    pub fn len(&self, namespace: Namespace) -> usize {
        let (lower, upper) = namespace.key_bounds();
        self.entries
            .borrow()
            .range::<[u8], _>((Bound::Excluded(lower), Bound::Excluded(upper)))
            .count()
    }

    /// Whether `key` is staged in `namespace`.
    pub fn contains(&self, namespace: Namespace, key: StagingKey) -> bool {
        self.entries
            .borrow()
            .contains_key(&namespace.encode_key(key))
    }
}

impl StagingStore for MemoryStagingStore {
    fn put(&self, namespace: Namespace, key: StagingKey, value: &[u8]) -> Result<(), StagingError> {
        self.entries
            .borrow_mut()
            .insert(namespace.encode_key(key), value.to_vec());
        Ok(())
    }

    fn get(&self, namespace: Namespace, key: StagingKey) -> Result<Option<Vec<u8>>, StagingError> {
        Ok(self
            .entries
            .borrow()
            .get(&namespace.encode_key(key))
            .cloned())
    }

    fn delete(&self, namespace: Namespace, key: StagingKey) -> Result<(), StagingError> {
        self.entries.borrow_mut().remove(&namespace.encode_key(key));
        Ok(())
    }

    fn scan(
        &self,
        namespace: Namespace,
        after: Option<StagingKey>,
        limit: usize,
    ) -> Result<Vec<StagedRecord>, StagingError> {
        let (lower, upper) = namespace.key_bounds();
        let cursor = after.map_or_else(|| lower.to_vec(), |key| namespace.encode_key(key));
        let entries = self.entries.borrow();
        entries
            .range::<[u8], _>((Bound::Excluded(cursor.as_slice()), Bound::Excluded(upper)))
            .take(limit)
            .map(|(raw, value)| {
                namespace
                    .decode_key(raw)
                    .map(|key| (key, value.clone()))
                    .ok_or_else(|| StagingError::CorruptKey {
                        namespace,
                        key: raw.clone(),
                    })
            })
            .collect()
    }

    fn clear(&self) -> Result<(), StagingError> {
        self.entries.borrow_mut().clear();
        Ok(())
    }
}

/// Entity source replaying a fixed list of entities.
#[derive(Debug, Default, Clone)]
pub struct VecSource {
    entities: VecDeque<Entity>,
}

impl VecSource {
    /// Create a source yielding `entities` in order.
    pub fn new<I>(entities: I) -> Self
    where
        I: IntoIterator<Item = Entity>,
    {
        Self {
            entities: entities.into_iter().collect(),
        }
    }
}

impl EntitySource for VecSource {
    type Error = Infallible;

    fn next_entity(&mut self) -> Result<Option<Entity>, Self::Error> {
        Ok(self.entities.pop_front())
    }
}

/// Build a tag map from string pairs.
pub fn tags<const N: usize>(pairs: [(&str, &str); N]) -> Tags {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

/// Build a tagless node at the origin.
pub fn node(id: i64) -> Entity {
    Entity::Node(Node {
        id,
        lat: 0.0,
        lon: 0.0,
        tags: Tags::new(),
    })
}

/// Build a way with the given tags and no node references.
pub fn way(id: i64, tags: Tags) -> Entity {
    Entity::Way(Way {
        id,
        refs: Vec::new(),
        tags,
    })
}

/// Build a relation from tags and `(kind, id)` member references.
pub fn relation<I>(id: i64, tags: Tags, members: I) -> Entity
where
    I: IntoIterator<Item = (ElementKind, i64)>,
{
    Entity::Relation(Relation {
        id,
        members: members
            .into_iter()
            .map(|(kind, member_id)| Member::new(kind, member_id, ""))
            .collect(),
        tags,
    })
}
