use thiserror::Error;

/// Errors produced by the address allocator.
///
/// `Conflict` is internal to the retry driver: a lost compare-and-swap race
/// restarts the read-compute-write cycle and is never returned to callers.
#[derive(Debug, Error)]
pub enum IpamError {
    #[error("invalid segment: {0}")]
    InvalidSegment(String),

    #[error("no available IP address in segment {0}")]
    AddressSpaceExhausted(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("conflicting write, retry")]
    Conflict,

    #[error("allocation cancelled")]
    Cancelled,

    #[error("max retries exceeded")]
    MaxRetriesExceeded,

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<etcd_client::Error> for IpamError {
    fn from(e: etcd_client::Error) -> Self {
        IpamError::StoreUnavailable(e.to_string())
    }
}

impl IpamError {
    /// Whether the error ends an allocation, as opposed to restarting it.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, IpamError::Conflict)
    }
}

pub type Result<T> = std::result::Result<T, IpamError>;
