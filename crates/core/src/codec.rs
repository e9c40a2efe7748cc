//! Entry codec
//!
//! Encodes a value together with its concrete type name and decodes an
//! entry back by resolving the recorded name. This is the per-value layer;
//! whole-document (de)serialization lives in the durability crate and never
//! decodes individual payloads.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use crate::entry::{StorageEntry, Tagged};
use crate::error::{CodecError, CodecResult};
use crate::mapper::DocumentMapper;
use crate::resolver::TypeResolver;

/// Per-value encoder/decoder for a store holding values of type `V`
pub struct EntryCodec<V> {
    mapper: DocumentMapper,
    resolver: Arc<dyn TypeResolver<V>>,
}

impl<V> EntryCodec<V> {
    /// Create a codec from a mapper and a type resolver
    pub fn new(mapper: DocumentMapper, resolver: Arc<dyn TypeResolver<V>>) -> Self {
        EntryCodec { mapper, resolver }
    }

    /// The value ⇄ document mapper
    pub fn mapper(&self) -> &DocumentMapper {
        &self.mapper
    }

    /// Encode `value`, recording its concrete type name
    pub fn encode(&self, value: &V) -> CodecResult<StorageEntry>
    where
        V: Serialize + Tagged,
    {
        self.mapper.encode(value)
    }

    /// Decode an entry using the type its name resolves to
    ///
    /// # Errors
    ///
    /// [`CodecError::UnknownType`] if the resolver does not know the name,
    /// or the mapping/adapter error raised while decoding the payload.
    pub fn decode(&self, entry: &StorageEntry) -> CodecResult<V> {
        let resolved = self
            .resolver
            .resolve(entry.type_name())
            .ok_or_else(|| CodecError::UnknownType(entry.type_name().to_string()))?;
        let value = resolved.decode(&self.mapper, entry.payload().clone())?;
        trace!(type_name = entry.type_name(), "Decoded entry");
        Ok(value)
    }
}

impl<V> fmt::Debug for EntryCodec<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryCodec")
            .field("mapper", &self.mapper)
            .finish_non_exhaustive()
    }
}
