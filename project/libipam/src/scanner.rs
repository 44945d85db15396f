//! Free-address search inside a CIDR segment.
//!
//! Addresses are walked upward from the masked base address as fixed-width
//! big-endian byte strings, so the same code advances IPv4 and IPv6 ranges.
//! The broadcast address is not reserved: once reached it is handed out like
//! any other address.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::IpNetwork;
use log::warn;

use crate::error::{IpamError, Result};

/// Parse a segment string such as `10.240.0.0/24`.
///
/// A bare address without a prefix length is rejected.
pub fn parse_segment(segment: &str) -> Result<IpNetwork> {
    if !segment.contains('/') {
        return Err(IpamError::InvalidSegment(format!(
            "{segment}: missing prefix length"
        )));
    }
    segment
        .parse::<IpNetwork>()
        .map_err(|e| IpamError::InvalidSegment(format!("{segment}: {e}")))
}

/// Add one to a big-endian byte string, carrying into higher bytes.
///
/// Returns `false` when the carry runs off the most significant byte.
pub(crate) fn increment(octets: &mut [u8]) -> bool {
    for b in octets.iter_mut().rev() {
        *b = b.wrapping_add(1);
        if *b != 0 {
            return true;
        }
    }
    false
}

fn successor(ip: IpAddr) -> Option<IpAddr> {
    match ip {
        IpAddr::V4(addr) => {
            let mut octets = addr.octets();
            increment(&mut octets).then(|| IpAddr::V4(Ipv4Addr::from(octets)))
        }
        IpAddr::V6(addr) => {
            let mut octets = addr.octets();
            increment(&mut octets).then(|| IpAddr::V6(Ipv6Addr::from(octets)))
        }
    }
}

/// First address of `net`, scanning up from its base, that is not in
/// `unavailable`.
///
/// The scanner has no notion of a network address; callers that want the
/// base excluded must put it in `unavailable`. Candidates match entries of
/// `unavailable` in either their own or their canonical form, so an
/// IPv4-mapped IPv6 candidate is taken when its IPv4 address is.
pub fn next_available(net: IpNetwork, unavailable: &HashSet<IpAddr>) -> Result<IpAddr> {
    let mut ip = net.network();
    while net.contains(ip) {
        if !unavailable.contains(&ip) && !unavailable.contains(&ip.to_canonical()) {
            return Ok(ip);
        }
        match successor(ip) {
            Some(next) => ip = next,
            None => break,
        }
    }
    Err(IpamError::AddressSpaceExhausted(net.to_string()))
}

/// Pick the next free address of `segment` given the addresses already in use.
///
/// The segment's network address is always treated as unavailable. Entries of
/// `used` that do not parse as addresses can never match a candidate and are
/// skipped.
pub fn available_ip_by_segment(segment: &str, used: &[String]) -> Result<IpAddr> {
    let net = parse_segment(segment)?;

    let mut unavailable = HashSet::with_capacity(used.len() + 1);
    unavailable.insert(net.network().to_canonical());
    for s in used {
        match s.parse::<IpAddr>() {
            Ok(ip) => {
                unavailable.insert(ip.to_canonical());
            }
            Err(e) => warn!("ignoring unparsable used address {s:?} in {segment}: {e}"),
        }
    }

    next_available(net, &unavailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn used(addrs: &[&str]) -> Vec<String> {
        addrs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_increment_carries() {
        let mut octets = [10, 0, 0, 255];
        assert!(increment(&mut octets));
        assert_eq!(octets, [10, 0, 1, 0]);

        let mut octets = [10, 255, 255, 255];
        assert!(increment(&mut octets));
        assert_eq!(octets, [11, 0, 0, 0]);

        let mut octets = [255; 4];
        assert!(!increment(&mut octets));
    }

    #[test]
    fn test_first_address_skips_network() {
        let ip = available_ip_by_segment("10.240.0.0/24", &[]).unwrap();
        assert_eq!(ip.to_string(), "10.240.0.1");
    }

    #[test]
    fn test_lowest_free_address_is_chosen() {
        let taken = used(&["10.240.0.1", "10.240.0.3"]);
        let ip = available_ip_by_segment("10.240.0.0/24", &taken).unwrap();
        assert_eq!(ip.to_string(), "10.240.0.2");
    }

    #[test]
    fn test_scan_crosses_byte_boundary() {
        let taken: Vec<String> = (1..=255).map(|i| format!("10.1.0.{i}")).collect();
        let ip = available_ip_by_segment("10.1.0.0/16", &taken).unwrap();
        assert_eq!(ip.to_string(), "10.1.1.0");
    }

    #[test]
    fn test_broadcast_is_allocatable() {
        let taken = used(&["10.240.0.1", "10.240.0.2"]);
        let ip = available_ip_by_segment("10.240.0.0/30", &taken).unwrap();
        assert_eq!(ip.to_string(), "10.240.0.3");
    }

    #[test]
    fn test_exhausted_segment() {
        let err = available_ip_by_segment(
            "10.240.0.0/30",
            &used(&["10.240.0.1", "10.240.0.2", "10.240.0.3"]),
        )
        .unwrap_err();
        assert!(matches!(err, IpamError::AddressSpaceExhausted(_)));

        let err = available_ip_by_segment("10.240.0.9/32", &[]).unwrap_err();
        assert!(matches!(err, IpamError::AddressSpaceExhausted(_)));
    }

    #[test]
    fn test_ipv6_segment() {
        let ip = available_ip_by_segment("fd00::/126", &used(&["fd00::1"])).unwrap();
        assert_eq!(ip.to_string(), "fd00::2");
    }

    #[test]
    fn test_ipv4_mapped_segment_advances() {
        let segment = "::ffff:10.240.0.0/126";
        let first = available_ip_by_segment(segment, &[]).unwrap();
        assert_eq!(first.to_string(), "::ffff:10.240.0.1");

        let second = available_ip_by_segment(segment, &[first.to_string()]).unwrap();
        assert_eq!(second.to_string(), "::ffff:10.240.0.2");

        // Stored in dotted-quad form, the same addresses are still taken.
        let taken = used(&["10.240.0.1", "::ffff:10.240.0.2", "10.240.0.3"]);
        let err = available_ip_by_segment(segment, &taken).unwrap_err();
        assert!(matches!(err, IpamError::AddressSpaceExhausted(_)));
    }

    #[test]
    fn test_mapped_used_entry_in_ipv4_segment() {
        let taken = used(&["::ffff:10.240.0.1"]);
        let ip = available_ip_by_segment("10.240.0.0/24", &taken).unwrap();
        assert_eq!(ip.to_string(), "10.240.0.2");
    }

    #[test]
    fn test_garbage_used_entries_are_ignored() {
        let taken = used(&["bogus", "10.240.0.1"]);
        let ip = available_ip_by_segment("10.240.0.0/29", &taken).unwrap();
        assert_eq!(ip.to_string(), "10.240.0.2");
    }

    #[test]
    fn test_invalid_segment() {
        for bad in ["not-a-cidr", "10.240.0.0", "10.240.0.0/33", ""] {
            let err = available_ip_by_segment(bad, &[]).unwrap_err();
            assert!(matches!(err, IpamError::InvalidSegment(_)), "{bad}");
        }
    }
}
