//! Test helpers that write small OSM PBF files.
//!
//! [`PbfFixture`] encodes entities into an uncompressed PBF byte stream: one
//! `OSMHeader` blob followed by one `OSMData` blob whose primitive block has
//! a group per element kind. Only the fields `osmpbf` needs are written.

use std::collections::HashMap;
use std::io;
use std::path::Path;

use sieve_core::{ElementKind, Entity, Node, Relation, Tags, Way};

const GRANULARITY: i64 = 100;
const NANODEGREES: f64 = 1.0e9;

/// Builder for an in-memory PBF extract.
#[derive(Debug, Clone, Default)]
pub struct PbfFixture {
    nodes: Vec<Node>,
    ways: Vec<Way>,
    relations: Vec<Relation>,
}

impl PbfFixture {
    /// Start an empty extract.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity.
    #[must_use]
    pub fn with(mut self, entity: Entity) -> Self {
        self.push(entity);
        self
    }

    /// Add an entity in place.
    pub fn push(&mut self, entity: Entity) {
        match entity {
            Entity::Node(node) => self.nodes.push(node),
            Entity::Way(way) => self.ways.push(way),
            Entity::Relation(relation) => self.relations.push(relation),
        }
    }

    /// Entities in the order a decoder yields them: nodes, ways, relations.
    pub fn entities(&self) -> Vec<Entity> {
        self.nodes
            .iter()
            .cloned()
            .map(Entity::Node)
            .chain(self.ways.iter().cloned().map(Entity::Way))
            .chain(self.relations.iter().cloned().map(Entity::Relation))
            .collect()
    }

    /// Encode the extract as PBF bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_blob(&mut out, "OSMHeader", &header_block());
        write_blob(&mut out, "OSMData", &self.primitive_block());
        out
    }

    /// Write the encoded extract to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        std::fs::write(path, self.to_bytes())
    }

    fn primitive_block(&self) -> Vec<u8> {
        let mut strings = StringTable::default();
        let mut groups = Vec::new();
        if !self.nodes.is_empty() {
            let mut group = Message::default();
            for node in &self.nodes {
                group.message(1, &encode_node(node, &mut strings));
            }
            groups.push(group);
        }
        if !self.ways.is_empty() {
            let mut group = Message::default();
            for way in &self.ways {
                group.message(3, &encode_way(way, &mut strings));
            }
            groups.push(group);
        }
        if !self.relations.is_empty() {
            let mut group = Message::default();
            for relation in &self.relations {
                group.message(4, &encode_relation(relation, &mut strings));
            }
            groups.push(group);
        }

        let mut block = Message::default();
        block.message(1, &strings.encode());
        for group in &groups {
            block.message(2, group);
        }
        block.varint(17, GRANULARITY as u64);
        block.into_bytes()
    }
}

fn header_block() -> Vec<u8> {
    let mut header = Message::default();
    header.bytes(4, b"OsmSchema-V0.6");
    header.bytes(16, b"osm-sieve test fixture");
    header.into_bytes()
}

fn write_blob(out: &mut Vec<u8>, kind: &str, payload: &[u8]) {
    let mut blob = Message::default();
    blob.bytes(1, payload);
    blob.varint(2, payload.len() as u64);
    let blob = blob.into_bytes();

    let mut header = Message::default();
    header.bytes(1, kind.as_bytes());
    header.varint(3, blob.len() as u64);
    let header = header.into_bytes();

    out.extend_from_slice(&(header.len() as u32).to_be_bytes());
    out.extend_from_slice(&header);
    out.extend_from_slice(&blob);
}

fn encode_tags(message: &mut Message, tags: &Tags, strings: &mut StringTable) {
    let (keys, values): (Vec<u64>, Vec<u64>) = tags
        .iter()
        .map(|(key, value)| (strings.index(key), strings.index(value)))
        .unzip();
    message.packed_varints(2, keys);
    message.packed_varints(3, values);
}

fn encode_node(node: &Node, strings: &mut StringTable) -> Message {
    let mut message = Message::default();
    message.sint(1, node.id);
    encode_tags(&mut message, &node.tags, strings);
    message.sint(8, scaled(node.lat));
    message.sint(9, scaled(node.lon));
    message
}

fn encode_way(way: &Way, strings: &mut StringTable) -> Message {
    let mut message = Message::default();
    message.varint(1, way.id as u64);
    encode_tags(&mut message, &way.tags, strings);
    message.packed_sints(8, delta(way.refs.iter().copied()));
    message
}

fn encode_relation(relation: &Relation, strings: &mut StringTable) -> Message {
    let mut message = Message::default();
    message.varint(1, relation.id as u64);
    encode_tags(&mut message, &relation.tags, strings);
    let roles: Vec<u64> = relation
        .members
        .iter()
        .map(|member| strings.index(&member.role))
        .collect();
    message.packed_varints(8, roles);
    message.packed_sints(9, delta(relation.members.iter().map(|member| member.id)));
    let kinds: Vec<u64> = relation
        .members
        .iter()
        .map(|member| match member.kind {
            ElementKind::Node => 0,
            ElementKind::Way => 1,
            ElementKind::Relation => 2,
        })
        .collect();
    message.packed_varints(10, kinds);
    message
}

fn scaled(degrees: f64) -> i64 {
    (degrees * NANODEGREES / GRANULARITY as f64).round() as i64
}

fn delta(values: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut previous = 0_i64;
    values
        .into_iter()
        .map(|value| {
            let step = value.wrapping_sub(previous);
            previous = value;
            step
        })
        .collect()
}

/// Interned strings; index 0 is the empty string.
#[derive(Debug)]
struct StringTable {
    strings: Vec<String>,
    positions: HashMap<String, u64>,
}

impl Default for StringTable {
    fn default() -> Self {
        Self {
            strings: vec![String::new()],
            positions: HashMap::from([(String::new(), 0)]),
        }
    }
}

impl StringTable {
    fn index(&mut self, value: &str) -> u64 {
        if let Some(position) = self.positions.get(value) {
            return *position;
        }
        let position = self.strings.len() as u64;
        self.strings.push(value.to_owned());
        self.positions.insert(value.to_owned(), position);
        position
    }

    fn encode(&self) -> Message {
        let mut message = Message::default();
        for value in &self.strings {
            message.bytes(1, value.as_bytes());
        }
        message
    }
}

/// Minimal protobuf message writer.
#[derive(Debug, Default)]
struct Message {
    buffer: Vec<u8>,
}

impl Message {
    fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn raw_varint(buffer: &mut Vec<u8>, mut value: u64) {
        while value >= 0x80 {
            buffer.push((value as u8 & 0x7F) | 0x80);
            value >>= 7;
        }
        buffer.push(value as u8);
    }

    fn zigzag(value: i64) -> u64 {
        ((value << 1) ^ (value >> 63)) as u64
    }

    fn tag(&mut self, field: u32, wire_type: u8) {
        Self::raw_varint(&mut self.buffer, (u64::from(field) << 3) | u64::from(wire_type));
    }

    fn varint(&mut self, field: u32, value: u64) {
        self.tag(field, 0);
        Self::raw_varint(&mut self.buffer, value);
    }

    fn sint(&mut self, field: u32, value: i64) {
        self.varint(field, Self::zigzag(value));
    }

    fn bytes(&mut self, field: u32, value: &[u8]) {
        self.tag(field, 2);
        Self::raw_varint(&mut self.buffer, value.len() as u64);
        self.buffer.extend_from_slice(value);
    }

    fn message(&mut self, field: u32, value: &Message) {
        self.bytes(field, &value.buffer);
    }

    fn packed_varints(&mut self, field: u32, values: impl IntoIterator<Item = u64>) {
        let mut packed = Vec::new();
        for value in values {
            Self::raw_varint(&mut packed, value);
        }
        if !packed.is_empty() {
            self.bytes(field, &packed);
        }
    }

    fn packed_sints(&mut self, field: u32, values: impl IntoIterator<Item = i64>) {
        self.packed_varints(field, values.into_iter().map(Self::zigzag));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, &[0x00])]
    #[case(1, &[0x01])]
    #[case(300, &[0xAC, 0x02])]
    fn writes_varints(#[case] value: u64, #[case] expected: &[u8]) {
        let mut buffer = Vec::new();
        Message::raw_varint(&mut buffer, value);
        assert_eq!(buffer, expected);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(-1, 1)]
    #[case(1, 2)]
    #[case(-2, 3)]
    fn zigzags_signed_values(#[case] value: i64, #[case] expected: u64) {
        assert_eq!(Message::zigzag(value), expected);
    }

    #[rstest]
    fn delta_codes_references() {
        assert_eq!(delta([10, 12, 11, 40]), vec![10, 2, -1, 29]);
    }

    #[rstest]
    fn interns_strings_once() {
        let mut strings = StringTable::default();
        assert_eq!(strings.index(""), 0);
        assert_eq!(strings.index("highway"), 1);
        assert_eq!(strings.index("primary"), 2);
        assert_eq!(strings.index("highway"), 1);
    }
}
