//! Migration descriptors
//!
//! A descriptor names an old recorded type, a new one, and how to turn a
//! payload of the first into a payload of the second. Descriptors are
//! owned by the embedding application and handed to the store at open.

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::CodecResult;
use crate::mapper::DocumentMapper;

/// Rewrites entries recorded as one type into another type
pub trait StorageMigration: Send + Sync {
    /// Type name of entries this descriptor applies to
    fn old_type_name(&self) -> &str;

    /// Type name recorded on migrated entries
    fn new_type_name(&self) -> &str;

    /// Transform an old payload into a new payload
    ///
    /// An error leaves the entry unmigrated.
    fn migrate(&self, mapper: &DocumentMapper, payload: JsonValue) -> CodecResult<JsonValue>;
}

/// Migration between two serde types via a plain function
///
/// The payload is decoded as `Old`, passed through the transform and
/// encoded as `New`. Type names default to the Rust type paths.
///
/// ```ignore
/// let migration = TypedMigration::new(|old: ThingV1| ThingV2::from(old))
///     .with_old_type_name("acme.Thing")
///     .with_new_type_name("acme.ThingV2");
/// ```
pub struct TypedMigration<Old, New, F> {
    old_type_name: String,
    new_type_name: String,
    transform: F,
    _types: PhantomData<fn(Old) -> New>,
}

impl<Old, New, F> TypedMigration<Old, New, F>
where
    Old: DeserializeOwned,
    New: Serialize,
    F: Fn(Old) -> New + Send + Sync,
{
    /// Create a migration from a transform function
    pub fn new(transform: F) -> Self {
        TypedMigration {
            old_type_name: std::any::type_name::<Old>().to_string(),
            new_type_name: std::any::type_name::<New>().to_string(),
            transform,
            _types: PhantomData,
        }
    }

    /// Override the old type name
    pub fn with_old_type_name(mut self, name: impl Into<String>) -> Self {
        self.old_type_name = name.into();
        self
    }

    /// Override the new type name
    pub fn with_new_type_name(mut self, name: impl Into<String>) -> Self {
        self.new_type_name = name.into();
        self
    }
}

impl<Old, New, F> StorageMigration for TypedMigration<Old, New, F>
where
    Old: DeserializeOwned,
    New: Serialize,
    F: Fn(Old) -> New + Send + Sync,
{
    fn old_type_name(&self) -> &str {
        &self.old_type_name
    }

    fn new_type_name(&self) -> &str {
        &self.new_type_name
    }

    fn migrate(&self, mapper: &DocumentMapper, payload: JsonValue) -> CodecResult<JsonValue> {
        let old: Old = mapper.from_document(&self.old_type_name, payload)?;
        let new = (self.transform)(old);
        mapper.to_document(&self.new_type_name, &new)
    }
}

impl<Old, New, F> fmt::Debug for TypedMigration<Old, New, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedMigration")
            .field("old_type_name", &self.old_type_name)
            .field("new_type_name", &self.new_type_name)
            .finish()
    }
}
