//! Conflict-free address allocation on top of a shared key-value store.
//!
//! Each segment has one usage record in the store. An allocation reads the
//! record with its modification revision, picks the lowest free address,
//! appends it and writes the record back in a transaction conditioned on the
//! revision it read. A failed precondition means another allocator wrote the
//! record in between; all local state is dropped and the cycle restarts from
//! the read. No in-process lock is involved, so allocators on different hosts
//! coordinate purely through the store.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::backoff::{RetryPolicy, backoff};
use crate::error::{IpamError, Result};
use crate::keys::Keyspace;
use crate::record::{SegmentRecord, decode, decode_entry, encode};
use crate::scanner::{available_ip_by_segment, parse_segment};
use crate::store::IpamStore;

pub struct IpamService {
    store: Arc<dyn IpamStore>,
    keyspace: Keyspace,
    policy: RetryPolicy,
}

impl IpamService {
    pub fn new(store: Arc<dyn IpamStore>) -> Self {
        Self {
            store,
            keyspace: Keyspace::default(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_keyspace(mut self, keyspace: Keyspace) -> Self {
        self.keyspace = keyspace;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    pub fn store(&self) -> &Arc<dyn IpamStore> {
        &self.store
    }

    /// Allocate one unused address from `segment`.
    ///
    /// Under sustained contention on the same segment this keeps retrying
    /// unless the retry policy bounds it.
    pub async fn allocate_address(&self, segment: &str) -> Result<String> {
        self.allocate_address_with_cancel(segment, &CancellationToken::new())
            .await
    }

    /// Like [`allocate_address`](Self::allocate_address), giving up with
    /// [`IpamError::Cancelled`] once `timeout` has elapsed.
    pub async fn allocate_address_within(
        &self,
        segment: &str,
        timeout: Duration,
    ) -> Result<String> {
        tokio::time::timeout(timeout, self.allocate_address(segment))
            .await
            .map_err(|_| IpamError::Cancelled)?
    }

    /// Allocate one unused address from `segment`, stopping before the next
    /// attempt once `cancel` fires.
    ///
    /// A malformed segment fails before the store is contacted. Store errors
    /// are returned as they are; only lost compare-and-swap races are retried.
    pub async fn allocate_address_with_cancel(
        &self,
        segment: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        parse_segment(segment)?;
        let key = self.keyspace.segment_key(segment);
        let key = key.as_str();

        backoff(&self.policy, cancel, move |attempt| {
            self.try_allocate(segment, key, attempt)
        })
        .await
    }

    /// One read-compute-write cycle.
    async fn try_allocate(&self, segment: &str, key: &str, attempt: u64) -> Result<String> {
        let (current, mod_revision) = match self.store.get(key).await? {
            Some(entry) => (
                Some(decode::<SegmentRecord>(key, &entry.value)?),
                entry.mod_revision,
            ),
            None => (None, 0),
        };

        let (record, address) = extend_record(segment, current)?;

        if self
            .store
            .put_if_revision(key, mod_revision, encode(&record)?)
            .await?
        {
            info!("allocated {address} from {segment}, key: {key}");
            Ok(address)
        } else {
            warn!(
                "allocation on {key} conflicted with a concurrent write \
                 (revision {mod_revision}, attempt {attempt}), going to retry"
            );
            Err(IpamError::Conflict)
        }
    }

    /// Current usage record of `segment`, if any address was ever allocated.
    pub async fn segment_usage(&self, segment: &str) -> Result<Option<SegmentRecord>> {
        parse_segment(segment)?;
        let key = self.keyspace.segment_key(segment);
        let entry = self.store.get(&key).await?;
        debug!("read {key}: present={}", entry.is_some());
        decode_entry(&key, entry.as_ref().map(|e| e.value.as_slice()))
    }
}

/// Seed or extend `current` with the next free address of `segment`.
fn extend_record(
    segment: &str,
    current: Option<SegmentRecord>,
) -> Result<(SegmentRecord, String)> {
    let mut record = current.unwrap_or_else(|| SegmentRecord::new(segment));
    let address = available_ip_by_segment(segment, &record.used_addresses)?.to_string();
    record.push(address.clone());
    Ok((record, address))
}
