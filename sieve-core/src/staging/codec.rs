//! Value encoding for staged entities.
//!
//! Entities are stored as JSON. `serde_json` is built with
//! `float_roundtrip`, so coordinates decode to the exact `f64` that was
//! encoded, and tags and member order are preserved verbatim.

use thiserror::Error;

use super::StagingKey;
use crate::entity::Entity;

/// Errors raised while encoding or decoding a staged value.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Serialising an entity failed.
    #[error("failed to encode entity {key:?}: {source}")]
    Encode {
        /// Key of the entity being encoded.
        key: StagingKey,
        /// Source error produced by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
    /// A stored value could not be decoded.
    #[error("failed to decode staged value for {key:?}: {source}")]
    Decode {
        /// Key the value was stored under.
        key: StagingKey,
        /// Source error produced by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
}

/// Encode an entity into its staged byte form.
pub fn encode_entity(entity: &Entity) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(entity).map_err(|source| CodecError::Encode {
        key: entity.key(),
        source,
    })
}

/// Decode a staged value stored under `key`.
pub fn decode_entity(key: StagingKey, value: &[u8]) -> Result<Entity, CodecError> {
    serde_json::from_slice(value).map_err(|source| CodecError::Decode { key, source })
}
