//! Type resolution by recorded name
//!
//! A stored entry only carries the *name* of the type it was encoded from.
//! Turning that name back into something that can decode the payload is
//! the job of a [`TypeResolver`], supplied by the embedding application.
//! [`TypeRegistry`] is the stock implementation: an explicit name → decoder
//! table that can delegate unknown names to a parent resolver.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::error::CodecResult;
use crate::mapper::DocumentMapper;

type DecodeFn<V> = dyn Fn(&DocumentMapper, &str, JsonValue) -> CodecResult<V> + Send + Sync;

/// A loadable type: its name plus a decoder producing `V`
pub struct ResolvedType<V> {
    name: String,
    decode: Arc<DecodeFn<V>>,
}

impl<V> ResolvedType<V> {
    /// Create a resolved type from a decode function
    ///
    /// The function receives the mapper, the type name and the payload.
    pub fn new<F>(name: impl Into<String>, decode: F) -> Self
    where
        F: Fn(&DocumentMapper, &str, JsonValue) -> CodecResult<V> + Send + Sync + 'static,
    {
        ResolvedType {
            name: name.into(),
            decode: Arc::new(decode),
        }
    }

    /// Resolved type for a serde type convertible into `V`
    pub fn of<T>(name: impl Into<String>) -> Self
    where
        T: DeserializeOwned + Into<V> + 'static,
        V: 'static,
    {
        Self::new(name, |mapper, type_name, payload| {
            mapper.from_document::<T>(type_name, payload).map(Into::into)
        })
    }

    /// Type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Re-materialize a value of this type from a payload document
    pub fn decode(&self, mapper: &DocumentMapper, payload: JsonValue) -> CodecResult<V> {
        (self.decode)(mapper, &self.name, payload)
    }
}

impl<V> Clone for ResolvedType<V> {
    fn clone(&self) -> Self {
        ResolvedType {
            name: self.name.clone(),
            decode: Arc::clone(&self.decode),
        }
    }
}

impl<V> fmt::Debug for ResolvedType<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedType")
            .field("name", &self.name)
            .finish()
    }
}

/// Resolves a recorded type name to a loadable type
///
/// Returning `None` means the type is unknown; the affected read yields no
/// value and the failure is logged.
pub trait TypeResolver<V>: Send + Sync {
    /// Look up the type registered under `type_name`
    fn resolve(&self, type_name: &str) -> Option<ResolvedType<V>>;
}

/// Explicit name → type table
pub struct TypeRegistry<V> {
    types: HashMap<String, ResolvedType<V>>,
    parent: Option<Arc<dyn TypeResolver<V>>>,
}

impl<V: 'static> TypeRegistry<V> {
    /// Create an empty registry
    pub fn new() -> Self {
        TypeRegistry {
            types: HashMap::new(),
            parent: None,
        }
    }

    /// Create an empty registry that delegates unknown names to `parent`
    pub fn with_parent(parent: Arc<dyn TypeResolver<V>>) -> Self {
        TypeRegistry {
            types: HashMap::new(),
            parent: Some(parent),
        }
    }

    /// Register `T` under its Rust type path
    ///
    /// Matches the default [`Tagged::type_name`](crate::Tagged::type_name).
    pub fn register<T>(self) -> Self
    where
        T: DeserializeOwned + Into<V> + 'static,
    {
        self.register_as::<T>(std::any::type_name::<T>())
    }

    /// Register `T` under an explicit name
    pub fn register_as<T>(mut self, name: impl Into<String>) -> Self
    where
        T: DeserializeOwned + Into<V> + 'static,
    {
        let resolved = ResolvedType::of::<T>(name);
        self.types.insert(resolved.name().to_string(), resolved);
        self
    }

    /// Register a custom decoder under `name`
    pub fn register_with<F>(mut self, name: impl Into<String>, decode: F) -> Self
    where
        F: Fn(&DocumentMapper, &str, JsonValue) -> CodecResult<V> + Send + Sync + 'static,
    {
        let resolved = ResolvedType::new(name, decode);
        self.types.insert(resolved.name().to_string(), resolved);
        self
    }

    /// Whether `name` is registered locally (parents are not consulted)
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }
}

impl<V: 'static> Default for TypeRegistry<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: 'static> TypeResolver<V> for TypeRegistry<V> {
    fn resolve(&self, type_name: &str) -> Option<ResolvedType<V>> {
        match self.types.get(type_name) {
            Some(resolved) => Some(resolved.clone()),
            None => self
                .parent
                .as_ref()
                .and_then(|parent| parent.resolve(type_name)),
        }
    }
}

impl<V> fmt::Debug for TypeRegistry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.types.keys().collect();
        names.sort();
        f.debug_struct("TypeRegistry")
            .field("types", &names)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
