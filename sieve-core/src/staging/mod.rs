//! Staging store contract used as the out-of-core working set.
//!
//! Entities are staged in one of two [`Namespace`]s: `Plain` holds everything
//! ingested but not (yet) selected, `Collected` holds the extract. The
//! [`StagingStore`] trait is the only view the pipeline has of the
//! underlying key-value engine.
//!
//! Keys are encoded as `[marker?][kind][id]`, where `kind` is one byte and
//! `id` is eight big-endian bytes. Collected keys carry the
//! [`COLLECTED_MARKER`] prefix byte, which never collides with a kind byte,
//! so each namespace occupies a contiguous key range.

use std::error::Error as StdError;

use thiserror::Error;

use crate::entity::ElementKind;

mod codec;

pub use codec::{CodecError, decode_entity, encode_entity};

/// Prefix byte reserving the collected key range.
pub const COLLECTED_MARKER: u8 = 0xFF;

/// Records fetched per page by [`StagingIter`].
pub const DEFAULT_PAGE_SIZE: usize = 512;

const NODE_BYTE: u8 = 0x01;
const WAY_BYTE: u8 = 0x02;
const RELATION_BYTE: u8 = 0x03;
const ENCODED_KEY_LEN: usize = 9;

/// Primary key of a staged entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StagingKey {
    /// Kind of the staged entity.
    pub kind: ElementKind,
    /// OSM identifier of the staged entity.
    pub id: i64,
}

impl StagingKey {
    /// Construct a key.
    pub const fn new(kind: ElementKind, id: i64) -> Self {
        Self { kind, id }
    }

    fn encode_into(self, buffer: &mut Vec<u8>) {
        let kind = match self.kind {
            ElementKind::Node => NODE_BYTE,
            ElementKind::Way => WAY_BYTE,
            ElementKind::Relation => RELATION_BYTE,
        };
        #[expect(
            clippy::big_endian_bytes,
            reason = "keys use a fixed, platform-independent byte order"
        )]
        let id = self.id.to_be_bytes();
        buffer.push(kind);
        buffer.extend_from_slice(&id);
    }

    fn decode(bytes: &[u8]) -> Option<Self> {
        let (kind, id) = bytes.split_first()?;
        let kind = match *kind {
            NODE_BYTE => ElementKind::Node,
            WAY_BYTE => ElementKind::Way,
            RELATION_BYTE => ElementKind::Relation,
            _ => return None,
        };
        let id: [u8; 8] = id.try_into().ok()?;
        #[expect(
            clippy::big_endian_bytes,
            reason = "keys use a fixed, platform-independent byte order"
        )]
        let id = i64::from_be_bytes(id);
        Some(Self { kind, id })
    }
}

/// Logical partition of the staging key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Ingested entities that are not part of the extract.
    Plain,
    /// Entities selected by the rules or promoted by the closure.
    Collected,
}

impl Namespace {
    /// The namespace a key must be absent from while it lives in `self`.
    pub const fn other(self) -> Self {
        match self {
            Self::Plain => Self::Collected,
            Self::Collected => Self::Plain,
        }
    }

    /// Encode a key into this namespace's byte representation.
    ///
    /// # Examples
    /// ```
    /// use sieve_core::{ElementKind, Namespace, StagingKey};
    ///
    /// let key = StagingKey::new(ElementKind::Way, 10);
    /// let plain = Namespace::Plain.encode_key(key);
    /// let collected = Namespace::Collected.encode_key(key);
    /// assert_eq!(plain.len(), 9);
    /// assert_eq!(collected.len(), 10);
    /// assert_eq!(Namespace::Collected.decode_key(&collected), Some(key));
    /// assert_eq!(Namespace::Plain.decode_key(&collected), None);
    /// ```
    pub fn encode_key(self, key: StagingKey) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(ENCODED_KEY_LEN + 1);
        if self == Self::Collected {
            buffer.push(COLLECTED_MARKER);
        }
        key.encode_into(&mut buffer);
        buffer
    }

    /// Decode raw key bytes stored under this namespace.
    pub fn decode_key(self, bytes: &[u8]) -> Option<StagingKey> {
        match self {
            Self::Plain => StagingKey::decode(bytes),
            Self::Collected => match bytes.split_first() {
                Some((&COLLECTED_MARKER, rest)) => StagingKey::decode(rest),
                _ => None,
            },
        }
    }

    /// Exclusive byte bounds enclosing every key of this namespace.
    ///
    /// Every encoded key sorts strictly between the two bounds under
    /// byte-wise comparison.
    pub const fn key_bounds(self) -> (&'static [u8], &'static [u8]) {
        match self {
            Self::Plain => (&[], &[COLLECTED_MARKER]),
            Self::Collected => (&[COLLECTED_MARKER], &[COLLECTED_MARKER, COLLECTED_MARKER]),
        }
    }
}

/// A raw staged entry: decoded key and encoded entity value.
pub type StagedRecord = (StagingKey, Vec<u8>);

/// Errors raised by staging store implementations.
#[derive(Debug, Error)]
pub enum StagingError {
    /// The storage engine failed.
    #[error("staging store failed to {operation}: {source}")]
    Backend {
        /// Operation that was attempted, such as `put` or `scan`.
        operation: &'static str,
        /// Engine-specific source error.
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    /// A stored key did not decode for its namespace.
    #[error("staging store returned a malformed {namespace:?} key {key:02x?}")]
    CorruptKey {
        /// Namespace being scanned.
        namespace: Namespace,
        /// Raw key bytes.
        key: Vec<u8>,
    },
}

impl StagingError {
    /// Wrap an engine error raised while performing `operation`.
    pub fn backend<E>(operation: &'static str, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Backend {
            operation,
            source: Box::new(source),
        }
    }
}

/// Ordered key-value engine holding staged entities.
///
/// Implementations provide atomic single-key operations and ordered range
/// scans. The pipeline is the only writer during a run, so no locking is
/// required beyond what the engine gives each operation.
pub trait StagingStore {
    /// Insert or overwrite the value stored under `key`.
    fn put(&self, namespace: Namespace, key: StagingKey, value: &[u8]) -> Result<(), StagingError>;

    /// Fetch the value stored under `key`, if any.
    fn get(&self, namespace: Namespace, key: StagingKey) -> Result<Option<Vec<u8>>, StagingError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, namespace: Namespace, key: StagingKey) -> Result<(), StagingError>;

    /// Return up to `limit` records in key order, strictly after `after`
    /// when given, otherwise from the start of the namespace.
    fn scan(
        &self,
        namespace: Namespace,
        after: Option<StagingKey>,
        limit: usize,
    ) -> Result<Vec<StagedRecord>, StagingError>;

    /// Remove every key from both namespaces.
    fn clear(&self) -> Result<(), StagingError>;

    /// Make every write so far durable. Stores that write through
    /// immediately keep the default no-op.
    fn commit(&self) -> Result<(), StagingError> {
        Ok(())
    }

    /// Lazily iterate every record of a namespace in key order.
    fn iter(&self, namespace: Namespace) -> StagingIter<'_, Self>
    where
        Self: Sized,
    {
        StagingIter::new(self, namespace)
    }
}

/// One-pass, lazily paged iterator over a namespace.
///
/// Pages are fetched with a key cursor, so the store may be mutated between
/// calls to [`Iterator::next`]. Every key present when iteration started and
/// not deleted since is yielded exactly once; keys inserted later are yielded
/// when they sort after the cursor.
#[derive(Debug)]
pub struct StagingIter<'a, S> {
    store: &'a S,
    namespace: Namespace,
    page_size: usize,
    cursor: Option<StagingKey>,
    page: std::vec::IntoIter<StagedRecord>,
    finished: bool,
}

impl<'a, S: StagingStore> StagingIter<'a, S> {
    /// Iterate `namespace` using [`DEFAULT_PAGE_SIZE`].
    pub fn new(store: &'a S, namespace: Namespace) -> Self {
        Self::with_page_size(store, namespace, DEFAULT_PAGE_SIZE)
    }

    /// Iterate `namespace`, fetching `page_size` records at a time.
    pub fn with_page_size(store: &'a S, namespace: Namespace, page_size: usize) -> Self {
        Self {
            store,
            namespace,
            page_size: page_size.max(1),
            cursor: None,
            page: Vec::new().into_iter(),
            finished: false,
        }
    }

    fn refill(&mut self) -> Result<(), StagingError> {
        let page = self
            .store
            .scan(self.namespace, self.cursor, self.page_size)?;
        if page.len() < self.page_size {
            self.finished = true;
        }
        self.page = page.into_iter();
        Ok(())
    }
}

impl<S: StagingStore> Iterator for StagingIter<'_, S> {
    type Item = Result<StagedRecord, StagingError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.page.next() {
                self.cursor = Some(record.0);
                return Some(Ok(record));
            }
            if self.finished {
                return None;
            }
            if let Err(err) = self.refill() {
                self.finished = true;
                return Some(Err(err));
            }
        }
    }
}
