//! Key-value store capability needed by the allocator.
//!
//! The allocator only ever reads one key together with its modification
//! revision and writes it back conditionally on that revision. Any store with
//! linearizable single-key transactions (etcd, Xline) can back it.

mod etcd;
mod memory;

pub use etcd::{StoreOptions, XlineIpamStore};
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::Result;

/// A value together with the store revision of its last modification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revisioned {
    pub value: Vec<u8>,
    pub mod_revision: i64,
}

#[async_trait]
pub trait IpamStore: Send + Sync {
    /// Read `key`; `None` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Revisioned>>;

    /// Write `value` to `key` only if its modification revision still equals
    /// `expected_mod_revision`.
    ///
    /// An expected revision of `0` means the key must not exist. Returns
    /// `Ok(false)` without touching the store when the precondition fails;
    /// `Err` is reserved for the store itself failing.
    async fn put_if_revision(
        &self,
        key: &str,
        expected_mod_revision: i64,
        value: Vec<u8>,
    ) -> Result<bool>;

    /// All entries whose key starts with `prefix`, ordered by key.
    async fn list(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;
}
