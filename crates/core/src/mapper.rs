//! Value ⇄ document mapping
//!
//! The mapper turns typed values into [`serde_json::Value`] documents and
//! back using serde. Types whose document shape is irregular (configuration
//! maps, legacy layouts) can register a [`TypeAdapter`] under their type
//! name; the adapter rewrites the document after encoding and before
//! decoding.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::entry::{StorageEntry, Tagged};
use crate::error::{CodecError, CodecResult};

/// Per-type document rewriting hook
///
/// Both directions default to the identity.
pub trait TypeAdapter: Send + Sync {
    /// Rewrite a freshly encoded document before it is stored
    fn to_document(&self, document: JsonValue) -> CodecResult<JsonValue> {
        Ok(document)
    }

    /// Rewrite a stored document before it is decoded
    fn from_document(&self, document: JsonValue) -> CodecResult<JsonValue> {
        Ok(document)
    }
}

/// Pluggable value ⇄ document mapper
///
/// Cheap to clone; adapters are shared.
#[derive(Clone, Default)]
pub struct DocumentMapper {
    adapters: HashMap<String, Arc<dyn TypeAdapter>>,
}

impl DocumentMapper {
    /// Create a mapper without adapters
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter for a type name (builder form)
    pub fn with_adapter(
        mut self,
        type_name: impl Into<String>,
        adapter: impl TypeAdapter + 'static,
    ) -> Self {
        self.register_adapter(type_name, adapter);
        self
    }

    /// Register an adapter for a type name, replacing any previous one
    pub fn register_adapter(
        &mut self,
        type_name: impl Into<String>,
        adapter: impl TypeAdapter + 'static,
    ) {
        self.adapters.insert(type_name.into(), Arc::new(adapter));
    }

    /// Whether an adapter is registered for `type_name`
    pub fn has_adapter(&self, type_name: &str) -> bool {
        self.adapters.contains_key(type_name)
    }

    /// Encode `value` into a document as type `type_name`
    pub fn to_document<T: Serialize + ?Sized>(
        &self,
        type_name: &str,
        value: &T,
    ) -> CodecResult<JsonValue> {
        let document =
            serde_json::to_value(value).map_err(|e| CodecError::mapping(type_name, e))?;
        match self.adapters.get(type_name) {
            Some(adapter) => adapter.to_document(document),
            None => Ok(document),
        }
    }

    /// Decode a document recorded as type `type_name` into `T`
    pub fn from_document<T: DeserializeOwned>(
        &self,
        type_name: &str,
        document: JsonValue,
    ) -> CodecResult<T> {
        let document = match self.adapters.get(type_name) {
            Some(adapter) => adapter.from_document(document)?,
            None => document,
        };
        serde_json::from_value(document).map_err(|e| CodecError::mapping(type_name, e))
    }

    /// Encode a tagged value into a storage entry
    pub fn encode<V: Serialize + Tagged + ?Sized>(&self, value: &V) -> CodecResult<StorageEntry> {
        let type_name = value.type_name();
        let payload = self.to_document(type_name, value)?;
        Ok(StorageEntry::new(type_name, payload))
    }
}

impl fmt::Debug for DocumentMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.adapters.keys().collect();
        names.sort();
        f.debug_struct("DocumentMapper")
            .field("adapters", &names)
            .finish()
    }
}
