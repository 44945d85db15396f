//! Records persisted in the store, encoded as JSON.

use serde::{Deserialize, Serialize};

use crate::error::{IpamError, Result};

/// Addresses handed out from one segment, in allocation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRecord {
    #[serde(rename = "netSegment", default)]
    pub segment: String,
    #[serde(rename = "addressUsed", default)]
    pub used_addresses: Vec<String>,
}

/// Which segment and addresses an instance was given.
///
/// The layout is reserved for a lookup/release path; the allocator does not
/// write it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    #[serde(default)]
    pub instance: String,
    #[serde(rename = "netSegment", default)]
    pub segment: String,
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl SegmentRecord {
    pub fn new(segment: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            used_addresses: Vec::new(),
        }
    }

    /// Record a freshly chosen address.
    pub fn push(&mut self, address: impl Into<String>) {
        self.used_addresses.push(address.into());
    }
}

pub fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(record)?)
}

/// Decode the value stored at `key`.
///
/// An undecodable value is a malformed store response rather than a caller
/// error.
pub fn decode<T: for<'de> Deserialize<'de>>(key: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| IpamError::StoreUnavailable(format!("malformed record at {key}: {e}")))
}

/// Decode an optional entry; an absent key means no record yet.
pub fn decode_entry<T: for<'de> Deserialize<'de>>(
    key: &str,
    bytes: Option<&[u8]>,
) -> Result<Option<T>> {
    bytes.map(|b| decode(key, b)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_record_round_trip() {
        let mut record = SegmentRecord::new("10.240.0.0/24");
        let empty: SegmentRecord = decode("k", &encode(&record).unwrap()).unwrap();
        assert_eq!(empty, record);

        record.push("10.240.0.1");
        let one: SegmentRecord = decode("k", &encode(&record).unwrap()).unwrap();
        assert_eq!(one, record);

        for i in [5, 3, 200, 2] {
            record.push(format!("10.240.0.{i}"));
        }
        let many: SegmentRecord = decode("k", &encode(&record).unwrap()).unwrap();
        assert_eq!(many.used_addresses, record.used_addresses);
        assert_eq!(many, record);
    }

    #[test]
    fn test_wire_field_names() {
        let mut record = SegmentRecord::new("10.240.0.0/24");
        record.push("10.240.0.1");
        let json: serde_json::Value = serde_json::from_slice(&encode(&record).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"netSegment": "10.240.0.0/24", "addressUsed": ["10.240.0.1"]})
        );
    }

    #[test]
    fn test_decode_tolerates_omitted_list() {
        let record: SegmentRecord = decode("k", br#"{"netSegment":"10.0.0.0/8"}"#).unwrap();
        assert_eq!(record, SegmentRecord::new("10.0.0.0/8"));
    }

    #[test]
    fn test_absent_entry_is_not_an_error() {
        let record: Option<SegmentRecord> = decode_entry("k", None).unwrap();
        assert!(record.is_none());
    }

    #[test]
    fn test_malformed_value() {
        let err = decode::<SegmentRecord>("/zhongcni/ipam/x", b"ip1; ip2").unwrap_err();
        assert!(matches!(err, IpamError::StoreUnavailable(_)));
    }

    #[test]
    fn test_instance_record_round_trip() {
        let record = InstanceRecord {
            instance: "pod-a".into(),
            segment: "10.240.0.0/24".into(),
            addresses: vec!["10.240.0.7".into()],
        };
        let back: InstanceRecord = decode("k", &encode(&record).unwrap()).unwrap();
        assert_eq!(back, record);
    }
}
