//! Decoding of OSM PBF extracts.
//!
//! Several input files are read back to back as one logical byte stream, the
//! same as concatenating them on disk. Blobs are read in windows and each
//! window is decoded on the rayon pool; entities are buffered in input order
//! until consumed.

use std::collections::VecDeque;
use std::io::{self, BufReader, Read};
use std::num::NonZeroUsize;
use std::thread;

use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, warn};
use osmpbf::{Blob, BlobDecode, BlobReader, Element, RelMember, RelMemberType};
use rayon::prelude::*;
use sieve_core::{ElementKind, Entity, EntitySource, Member, Node, Relation, Tags, Way};
use sieve_fs::open_utf8_file;
use thiserror::Error;

type InputStream = BufReader<Box<dyn Read + Send>>;

/// Errors raised while reading PBF input.
#[derive(Debug, Error)]
pub enum PbfSourceError {
    /// An input file could not be opened.
    #[error("failed to open OSM PBF file at {path}: {source}")]
    Open {
        /// Path of the input file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The byte stream was not valid PBF data.
    #[error("failed to decode OSM PBF data: {source}")]
    Decode {
        /// Source error returned by `osmpbf`.
        #[source]
        source: osmpbf::Error,
    },
}

impl PbfSourceError {
    const fn decode(source: osmpbf::Error) -> Self {
        Self::Decode { source }
    }
}

/// Entity source reading one or more PBF files in order.
pub struct PbfEntitySource {
    blobs: BlobReader<InputStream>,
    pending: VecDeque<Entity>,
    // Raised after the entities of every earlier blob have been handed out.
    deferred: Option<PbfSourceError>,
    window: usize,
    blocks: u64,
}

impl std::fmt::Debug for PbfEntitySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PbfEntitySource")
            .field("pending", &self.pending.len())
            .field("window", &self.window)
            .field("blocks", &self.blocks)
            .finish_non_exhaustive()
    }
}

impl PbfEntitySource {
    /// Open every path up front and chain them into one stream.
    ///
    /// # Examples
    /// ```no_run
    /// use camino::Utf8PathBuf;
    /// use sieve_core::EntitySource;
    /// use sieve_data::PbfEntitySource;
    ///
    /// # fn main() -> Result<(), sieve_data::PbfSourceError> {
    /// let inputs = [Utf8PathBuf::from("berlin.osm.pbf")];
    /// let mut source = PbfEntitySource::open(&inputs)?;
    /// while let Some(entity) = source.next_entity()? {
    ///     println!("{:?} {}", entity.kind(), entity.id());
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn open<P>(paths: &[P]) -> Result<Self, PbfSourceError>
    where
        P: AsRef<Utf8Path>,
    {
        let mut stream: Box<dyn Read + Send> = Box::new(io::empty());
        for path in paths {
            let path = path.as_ref();
            let file = open_utf8_file(path).map_err(|source| PbfSourceError::Open {
                path: path.to_path_buf(),
                source,
            })?;
            stream = Box::new(stream.chain(file));
        }
        Ok(Self::from_reader(stream))
    }

    /// Decode PBF data from an arbitrary reader.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        let boxed: Box<dyn Read + Send> = Box::new(reader);
        Self {
            blobs: BlobReader::new(BufReader::new(boxed)),
            pending: VecDeque::new(),
            deferred: None,
            window: thread::available_parallelism().map_or(1, NonZeroUsize::get),
            blocks: 0,
        }
    }

    #[cfg(test)]
    fn with_decode_window(mut self, window: usize) -> Self {
        self.window = window.max(1);
        self
    }

    /// Decode the next window of blobs, returning `false` at end of input.
    ///
    /// Reading stops at the first unreadable blob; its error is deferred until
    /// the blocks before it have been consumed.
    fn buffer_next_window(&mut self) -> Result<bool, PbfSourceError> {
        let mut blobs = Vec::with_capacity(self.window);
        for blob in self.blobs.by_ref().take(self.window) {
            let failed = blob.is_err();
            blobs.push(blob);
            if failed {
                break;
            }
        }
        if blobs.is_empty() {
            return Ok(false);
        }

        let decoded: Vec<Result<Option<Vec<Entity>>, PbfSourceError>> =
            blobs.into_par_iter().map(decode_blob).collect();
        for block in decoded {
            match block {
                Ok(Some(entities)) => {
                    self.blocks += 1;
                    self.pending.extend(entities);
                }
                Ok(None) => {}
                Err(err) => {
                    self.deferred = Some(err);
                    break;
                }
            }
        }
        Ok(true)
    }
}

/// Decode one blob into its entities, or `None` for non-data blobs.
fn decode_blob(
    blob: Result<Blob, osmpbf::Error>,
) -> Result<Option<Vec<Entity>>, PbfSourceError> {
    let blob = blob.map_err(PbfSourceError::decode)?;
    match blob.decode().map_err(PbfSourceError::decode)? {
        BlobDecode::OsmData(block) => Ok(Some(block.elements().map(entity_from_element).collect())),
        BlobDecode::OsmHeader(_) => Ok(None),
        BlobDecode::Unknown(kind) => {
            debug!("Skipping PBF blob of unknown type {kind:?}");
            Ok(None)
        }
    }
}

impl EntitySource for PbfEntitySource {
    type Error = PbfSourceError;

    fn next_entity(&mut self) -> Result<Option<Entity>, Self::Error> {
        loop {
            if let Some(entity) = self.pending.pop_front() {
                return Ok(Some(entity));
            }
            if let Some(err) = self.deferred.take() {
                return Err(err);
            }
            if !self.buffer_next_window()? {
                debug!("Finished reading {} PBF data blocks", self.blocks);
                return Ok(None);
            }
        }
    }
}

fn collect_tags<'a, T>(tags: T) -> Tags
where
    T: IntoIterator<Item = (&'a str, &'a str)>,
{
    tags.into_iter()
        .map(|(key, value)| (key.to_owned(), value.to_owned()))
        .collect()
}

fn entity_from_element(element: Element<'_>) -> Entity {
    match element {
        Element::Node(node) => Entity::Node(Node {
            id: node.id(),
            lat: node.lat(),
            lon: node.lon(),
            tags: collect_tags(node.tags()),
        }),
        Element::DenseNode(node) => Entity::Node(Node {
            id: node.id(),
            lat: node.lat(),
            lon: node.lon(),
            tags: collect_tags(node.tags()),
        }),
        Element::Way(way) => Entity::Way(Way {
            id: way.id(),
            refs: way.refs().collect(),
            tags: collect_tags(way.tags()),
        }),
        Element::Relation(relation) => {
            let id = relation.id();
            Entity::Relation(Relation {
                id,
                members: relation
                    .members()
                    .map(|member| member_from(id, &member))
                    .collect(),
                tags: collect_tags(relation.tags()),
            })
        }
    }
}

fn member_from(relation_id: i64, member: &RelMember<'_>) -> Member {
    let kind = match member.member_type {
        RelMemberType::Node => ElementKind::Node,
        RelMemberType::Way => ElementKind::Way,
        RelMemberType::Relation => ElementKind::Relation,
    };
    let role = member.role().unwrap_or_else(|err| {
        warn!(
            "Relation {relation_id} member {kind:?} {} has an unreadable role: {err}",
            member.member_id
        );
        ""
    });
    Member::new(kind, member.member_id, role)
}
