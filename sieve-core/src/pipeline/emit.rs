//! Output stage: stream the collected namespace as one JSON array.

use std::io::Write;

use log::info;

use super::PipelineError;
use crate::staging::{CodecError, Namespace, StagingStore, decode_entity};

/// Write every collected entity to `writer` as a JSON array.
///
/// Entities are written one at a time in the store's iteration order; the
/// array is never held in memory. An empty namespace produces `[]`. Returns
/// the number of entities written.
pub fn emit_json<St, W>(store: &St, mut writer: W) -> Result<u64, PipelineError>
where
    St: StagingStore,
    W: Write,
{
    writer.write_all(b"[").map_err(PipelineError::write)?;
    let mut written = 0_u64;
    for record in store.iter(Namespace::Collected) {
        let (key, value) = record?;
        let entity = decode_entity(key, &value)?;
        if written > 0 {
            writer.write_all(b",").map_err(PipelineError::write)?;
        }
        serde_json::to_writer(&mut writer, &entity).map_err(|source| {
            if source.is_io() {
                PipelineError::write(source.into())
            } else {
                CodecError::Encode { key, source }.into()
            }
        })?;
        written += 1;
    }
    writer.write_all(b"]").map_err(PipelineError::write)?;
    writer.flush().map_err(PipelineError::write)?;
    info!("Wrote {written} collected entities");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ElementKind, Entity, Tags};
    use crate::staging::encode_entity;
    use crate::test_support::{MemoryStagingStore, node, relation, tags};
    use rstest::rstest;
    use serde_json::Value;
    use std::io;

    fn stage(store: &MemoryStagingStore, namespace: Namespace, entity: &Entity) {
        let value = encode_entity(entity).expect("encode");
        store.put(namespace, entity.key(), &value).expect("put");
    }

    #[rstest]
    fn empty_namespace_is_an_empty_array() {
        let store = MemoryStagingStore::default();
        stage(&store, Namespace::Plain, &node(1));
        let mut output = Vec::new();
        let written = emit_json(&store, &mut output).expect("emit");
        assert_eq!(written, 0);
        assert_eq!(output, b"[]");
    }

    #[rstest]
    fn writes_collected_entities_as_array() {
        let store = MemoryStagingStore::default();
        let boundary = relation(
            1,
            tags([("boundary", "administrative")]),
            [(ElementKind::Node, 2)],
        );
        stage(&store, Namespace::Collected, &boundary);
        stage(&store, Namespace::Collected, &node(2));
        stage(&store, Namespace::Plain, &node(3));

        let mut output = Vec::new();
        let written = emit_json(&store, &mut output).expect("emit");

        assert_eq!(written, 2);
        let parsed: Vec<Entity> = serde_json::from_slice(&output).expect("valid JSON array");
        assert_eq!(parsed.len(), 2);
        assert!(parsed.contains(&boundary));
        assert!(parsed.contains(&node(2)));
        let raw: Value = serde_json::from_slice(&output).expect("valid JSON");
        let kinds: Vec<_> = raw
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|element| element.get("type").and_then(Value::as_str))
            .collect();
        assert_eq!(kinds.len(), 2, "every element carries its kind");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[rstest]
    fn reports_write_failures() {
        let store = MemoryStagingStore::default();
        stage(&store, Namespace::Collected, &relation(1, Tags::new(), []));
        let err = emit_json(&store, BrokenPipe).expect_err("write failure");
        match err {
            PipelineError::Write { source } => {
                assert_eq!(source.kind(), io::ErrorKind::BrokenPipe);
            }
            other => panic!("expected write error, got {other:?}"),
        }
    }
}
