//! Storage trait
//!
//! The contract a key/value store offers to its owner. Keys are plain
//! strings; values are whatever the owner stores, possibly of several
//! concrete shapes. Lookups never fail loudly: a value that cannot be
//! decoded reads as `None` and the failure is logged by the implementation.

/// Key/value storage contract
///
/// Thread safety: all methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync). No cross-key atomicity is
/// promised.
pub trait Storage<V>: Send + Sync {
    /// Store `value` under `key`, returning the previous value
    ///
    /// Passing `None` removes the key.
    fn put(&self, key: &str, value: impl Into<Option<V>>) -> Option<V>;

    /// Remove `key`, returning the previous value
    fn remove(&self, key: &str) -> Option<V>;

    /// Current value for `key`
    ///
    /// Returns None if the key is absent or its entry cannot be decoded.
    fn get(&self, key: &str) -> Option<V>;

    /// Whether `key` is present (no decoding involved)
    fn contains_key(&self, key: &str) -> bool;

    /// Snapshot of the current keys (unique, unordered)
    fn keys(&self) -> Vec<String>;

    /// Decode every current entry
    ///
    /// Entries that fail to decode yield `None` in their slot.
    fn values(&self) -> Vec<Option<V>>;
}
