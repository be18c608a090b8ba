//! OpenStreetMap entities as they flow through the extraction pipeline.
//!
//! An [`Entity`] is one of three variants: a [`Node`], a [`Way`] or a
//! [`Relation`]. Relations reference other entities through ordered
//! [`Member`] lists, which is what the closure walks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::staging::StagingKey;

/// Free-form OSM key/value tags. Keys are unique and iterate in order.
pub type Tags = BTreeMap<String, String>;

/// Discriminates the three OSM element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// A single coordinate.
    Node,
    /// An ordered list of node references.
    Way,
    /// A composite of other elements.
    Relation,
}

/// A point with WGS84 coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// OSM identifier.
    pub id: i64,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Tags attached to the node.
    #[serde(default)]
    pub tags: Tags,
}

/// An ordered path through node references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Way {
    /// OSM identifier.
    pub id: i64,
    /// Node identifiers in path order.
    #[serde(default)]
    pub refs: Vec<i64>,
    /// Tags attached to the way.
    #[serde(default)]
    pub tags: Tags,
}

/// A composite entity referencing other entities as ordered members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// OSM identifier.
    pub id: i64,
    /// Members in declaration order.
    #[serde(default)]
    pub members: Vec<Member>,
    /// Tags attached to the relation.
    #[serde(default)]
    pub tags: Tags,
}

/// A reference held by a [`Relation`].
///
/// The role is carried through to the output but never consulted when
/// matching or collecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Kind of the referenced element.
    #[serde(rename = "type")]
    pub kind: ElementKind,
    /// Identifier of the referenced element.
    #[serde(rename = "ref")]
    pub id: i64,
    /// Role string, such as `outer` or `admin_centre`.
    #[serde(default)]
    pub role: String,
}

impl Member {
    /// Construct a member reference.
    pub fn new(kind: ElementKind, id: i64, role: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            role: role.into(),
        }
    }

    /// Staging key of the referenced element.
    pub const fn key(&self) -> StagingKey {
        StagingKey::new(self.kind, self.id)
    }
}

/// Any entity decoded from an extract.
///
/// Serialises with a `type` discriminator, for example
/// `{"type":"relation","id":7,"members":[],"tags":{}}`.
///
/// # Examples
/// ```
/// use sieve_core::{ElementKind, Entity, Relation, Tags};
///
/// let relation = Entity::Relation(Relation {
///     id: 7,
///     members: Vec::new(),
///     tags: Tags::from([("boundary".into(), "administrative".into())]),
/// });
/// assert_eq!(relation.kind(), ElementKind::Relation);
/// assert_eq!(relation.tags().get("boundary").map(String::as_str), Some("administrative"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entity {
    /// A node.
    Node(Node),
    /// A way.
    Way(Way),
    /// A relation.
    Relation(Relation),
}

impl Entity {
    /// Kind of this entity.
    pub const fn kind(&self) -> ElementKind {
        match self {
            Self::Node(_) => ElementKind::Node,
            Self::Way(_) => ElementKind::Way,
            Self::Relation(_) => ElementKind::Relation,
        }
    }

    /// OSM identifier of this entity.
    pub const fn id(&self) -> i64 {
        match self {
            Self::Node(node) => node.id,
            Self::Way(way) => way.id,
            Self::Relation(relation) => relation.id,
        }
    }

    /// Tags attached to this entity.
    pub const fn tags(&self) -> &Tags {
        match self {
            Self::Node(node) => &node.tags,
            Self::Way(way) => &way.tags,
            Self::Relation(relation) => &relation.tags,
        }
    }

    /// Primary key of this entity in the staging store.
    pub const fn key(&self) -> StagingKey {
        StagingKey::new(self.kind(), self.id())
    }
}

impl From<Node> for Entity {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<Way> for Entity {
    fn from(way: Way) -> Self {
        Self::Way(way)
    }
}

impl From<Relation> for Entity {
    fn from(relation: Relation) -> Self {
        Self::Relation(relation)
    }
}
