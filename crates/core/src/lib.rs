//! Core types and traits for jsonvault
//!
//! This crate defines the foundational pieces shared by the storage layers:
//! - StorageEntry: a payload document plus its recorded type name
//! - Tagged: values that report their concrete type name
//! - DocumentMapper / TypeAdapter: value ⇄ document mapping with per-type hooks
//! - TypeResolver / TypeRegistry: recorded type name → decoder
//! - EntryCodec: per-value encode/decode
//! - StorageMigration / TypedMigration: startup type rewrites
//! - Storage: the key/value contract
//! - CodecError: decode/encode failures

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod entry;
pub mod error;
pub mod mapper;
pub mod migration;
pub mod resolver;
pub mod traits;

pub use codec::EntryCodec;
pub use entry::{StorageEntry, Tagged};
pub use error::{CodecError, CodecResult};
pub use mapper::{DocumentMapper, TypeAdapter};
pub use migration::{StorageMigration, TypedMigration};
pub use resolver::{ResolvedType, TypeRegistry, TypeResolver};
pub use traits::Storage;
