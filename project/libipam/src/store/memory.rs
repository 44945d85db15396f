use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{IpamStore, Revisioned};
use crate::error::{IpamError, Result};

#[derive(Default)]
struct State {
    /// Store-wide revision, bumped on every write like etcd's.
    revision: i64,
    entries: BTreeMap<String, Revisioned>,
}

/// Linearizable in-process [`IpamStore`].
///
/// Every operation takes one lock, so transactions on a key are totally
/// ordered. Used by tests and for offline experiments with the allocator.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
    calls: AtomicU64,
    failed_txns: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IpamError::StoreUnavailable(
                "memory store is offline".to_string(),
            ));
        }
        self.state
            .lock()
            .map_err(|_| IpamError::StoreUnavailable("memory store lock poisoned".to_string()))
    }

    /// Unconditionally write `value`, returning the key's new revision.
    pub fn put(&self, key: &str, value: Vec<u8>) -> Result<i64> {
        let mut state = self.state()?;
        state.revision += 1;
        let mod_revision = state.revision;
        state.entries.insert(
            key.to_string(),
            Revisioned {
                value,
                mod_revision,
            },
        );
        Ok(mod_revision)
    }

    /// Make every following call fail as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of store calls made so far, including failed ones.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of conditional writes rejected by their precondition.
    pub fn failed_txns(&self) -> u64 {
        self.failed_txns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpamStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Revisioned>> {
        Ok(self.state()?.entries.get(key).cloned())
    }

    async fn put_if_revision(
        &self,
        key: &str,
        expected_mod_revision: i64,
        value: Vec<u8>,
    ) -> Result<bool> {
        let mut state = self.state()?;
        let current = state.entries.get(key).map_or(0, |e| e.mod_revision);
        if current != expected_mod_revision {
            self.failed_txns.fetch_add(1, Ordering::SeqCst);
            return Ok(false);
        }

        state.revision += 1;
        let mod_revision = state.revision;
        state.entries.insert(
            key.to_string(),
            Revisioned {
                value,
                mod_revision,
            },
        );
        Ok(true)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self
            .state()?
            .entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect())
    }
}
