//! Pull interface over decoded entities.

use std::error::Error as StdError;

use crate::entity::Entity;

/// Sequential source of decoded entities.
///
/// Each call yields the next entity, `None` once the input is exhausted, or
/// the decode error that terminated the stream. Implementations may decode
/// with internal worker threads, but must present entities in input order
/// through this single blocking call.
pub trait EntitySource {
    /// Decode failure reported by the source.
    type Error: StdError + Send + Sync + 'static;

    /// Pull the next entity from the stream.
    fn next_entity(&mut self) -> Result<Option<Entity>, Self::Error>;
}

impl<S: EntitySource + ?Sized> EntitySource for &mut S {
    type Error = S::Error;

    fn next_entity(&mut self) -> Result<Option<Entity>, Self::Error> {
        (**self).next_entity()
    }
}
