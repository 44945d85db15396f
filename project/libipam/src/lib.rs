//! IP address management for the CNI plugin.
//!
//! Pods get addresses from administrator defined segments (CIDR ranges). The
//! per-segment usage lives in an etcd-compatible store and every allocation is
//! a compare-and-swap on that entry, so any number of plugin invocations on
//! any number of hosts can allocate from the same segment without handing out
//! an address twice.

pub mod allocator;
pub mod backoff;
pub mod config;
pub mod error;
pub mod keys;
pub mod record;
pub mod scanner;
pub mod store;

pub use allocator::IpamService;
pub use backoff::RetryPolicy;
pub use config::IpamConfig;
pub use error::{IpamError, Result};
pub use keys::Keyspace;
pub use record::{InstanceRecord, SegmentRecord};
pub use store::{IpamStore, MemoryStore, Revisioned, StoreOptions, XlineIpamStore};
