//! Stored entries and runtime type tagging
//!
//! An entry is a payload document plus the name of the concrete type it
//! was encoded from. On disk it is written as an envelope:
//!
//! ```text
//! { "class": "<type name>", "value": <payload> }
//! ```
//!
//! Payloads stay as [`serde_json::Value`] trees in memory so a flush can
//! re-serialize the whole map without decoding any individual value.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A stored value together with its recorded type name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageEntry {
    #[serde(rename = "class")]
    type_name: String,
    #[serde(rename = "value")]
    payload: JsonValue,
}

impl StorageEntry {
    /// Create an entry from a type name and its payload document
    pub fn new(type_name: impl Into<String>, payload: JsonValue) -> Self {
        StorageEntry {
            type_name: type_name.into(),
            payload,
        }
    }

    /// Recorded concrete type name
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Payload document
    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    /// Consume the entry, returning the payload document
    pub fn into_payload(self) -> JsonValue {
        self.payload
    }
}

/// Values that know the name of their concrete runtime type
///
/// The name is recorded next to every stored payload and later handed to a
/// [`TypeResolver`](crate::TypeResolver) to pick the decoder. The default
/// is the Rust type path; sum types holding several concrete shapes
/// override it to report the name of the variant's inner type.
///
/// ```ignore
/// enum Element { Thing(Thing), Bridge(Bridge) }
///
/// impl Tagged for Element {
///     fn type_name(&self) -> &str {
///         match self {
///             Element::Thing(_) => "acme.Thing",
///             Element::Bridge(_) => "acme.Bridge",
///         }
///     }
/// }
/// ```
pub trait Tagged {
    /// Concrete type name of this value
    fn type_name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl Tagged for String {}
impl Tagged for bool {}
impl Tagged for i64 {}
impl Tagged for u64 {}
impl Tagged for f64 {}
impl Tagged for JsonValue {}
