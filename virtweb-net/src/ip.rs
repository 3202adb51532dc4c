//! IPv4/IPv6 address validation and subnet arithmetic.
//!
//! All functions take string inputs as they arrive from dialog fields and
//! from configuration documents. A netmask may be supplied either as a
//! dotted quad ("255.255.255.0") or as a bare prefix length ("24"); both
//! spellings describe the same quantity and are accepted interchangeably
//! wherever a mask is expected.

use std::net::{Ipv4Addr, Ipv6Addr};

use ipnet::{Ipv4Net, Ipv6Net};

/// Check whether `address` is a well-formed dotted-quad IPv4 address.
///
/// The whole string must parse; partial matches and empty input are invalid.
pub fn is_valid_ipv4(address: &str) -> bool {
    address.parse::<Ipv4Addr>().is_ok()
}

/// Check whether `address` is a well-formed IPv6 address, including the
/// `::` compressed form.
pub fn is_valid_ipv6(address: &str) -> bool {
    address.parse::<Ipv6Addr>().is_ok()
}

/// Parse a netmask input into a prefix length.
///
/// Accepts either a contiguous dotted-quad mask (e.g. "255.255.0.0") or a
/// bare prefix length in 1..=31. Non-contiguous masks (e.g. "255.0.255.0")
/// and masks with the wrong octet count are rejected. Inputs without a dot
/// are always treated as prefix lengths, never as malformed masks.
pub fn parse_netmask_or_prefix(input: &str) -> Option<u8> {
    if input.contains('.') {
        let mask: Ipv4Addr = input.parse().ok()?;
        let bits = u32::from(mask);
        // A valid mask has all its one bits leading.
        if bits.count_ones() != bits.leading_ones() {
            return None;
        }
        Some(bits.count_ones() as u8)
    } else {
        let prefix: u8 = input.trim().parse().ok()?;
        (1..=31).contains(&prefix).then_some(prefix)
    }
}

/// Convert a prefix length into its dotted-quad netmask spelling.
///
/// Returns `None` for prefixes longer than 32.
pub fn prefix_to_netmask(prefix: u8) -> Option<String> {
    if prefix > 32 {
        return None;
    }
    let bits = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix))
    };
    Some(Ipv4Addr::from(bits).to_string())
}

/// Normalize a mask-or-prefix input to the dotted-quad spelling.
///
/// Dotted input is passed through unchanged; prefix input is converted.
pub fn normalize_netmask(input: &str) -> Option<String> {
    if input.contains('.') {
        return Some(input.to_string());
    }
    prefix_to_netmask(input.trim().parse().ok()?)
}

fn ipv4_net(address: &str, prefix_or_mask: &str) -> Option<Ipv4Net> {
    let address: Ipv4Addr = address.parse().ok()?;
    let prefix = parse_netmask_or_prefix(prefix_or_mask)?;
    Ipv4Net::new(address, prefix).ok()
}

/// Check whether `candidate` lies within the subnet given by `network` and
/// `prefix_or_mask`. Any unparseable input yields `false`.
pub fn ipv4_subnet_contains(network: &str, prefix_or_mask: &str, candidate: &str) -> bool {
    let net = match ipv4_net(network, prefix_or_mask) {
        Some(net) => net,
        None => return false,
    };
    match candidate.parse::<Ipv4Addr>() {
        Ok(addr) => net.contains(&addr),
        Err(_) => false,
    }
}

/// Check whether `address` is the network identifier (all-zero host bits)
/// of its own subnet.
pub fn ipv4_is_network_identifier(address: &str, prefix_or_mask: &str) -> bool {
    match ipv4_net(address, prefix_or_mask) {
        Some(net) => net.network() == net.addr(),
        None => false,
    }
}

/// Check whether `address` is the broadcast address (all-one host bits)
/// of its own subnet.
pub fn ipv4_is_broadcast(address: &str, prefix_or_mask: &str) -> bool {
    match ipv4_net(address, prefix_or_mask) {
        Some(net) => net.broadcast() == net.addr(),
        None => false,
    }
}

/// First usable host address of the subnet `address` falls into, i.e. the
/// network identifier plus one. Used to suggest a corrected address when
/// the user entered the identifier itself.
pub fn ipv4_first_host(address: &str, prefix_or_mask: &str) -> Option<String> {
    let net = ipv4_net(address, prefix_or_mask)?;
    let first = u32::from(net.network()).checked_add(1)?;
    Some(Ipv4Addr::from(first).to_string())
}

/// Check whether `input` is a valid IPv6 prefix length (0..=128).
pub fn ipv6_prefix_valid(input: &str) -> bool {
    matches!(input.trim().parse::<u16>(), Ok(prefix) if prefix <= 128)
}

/// Check whether `candidate` lies within the subnet given by `network` and
/// `prefix`. Comparison is done on the full 128-bit representation, so the
/// `::` compressed form expands to the right run of zero groups.
pub fn ipv6_subnet_contains(network: &str, prefix: u8, candidate: &str) -> bool {
    let network: Ipv6Addr = match network.parse() {
        Ok(addr) => addr,
        Err(_) => return false,
    };
    let candidate: Ipv6Addr = match candidate.parse() {
        Ok(addr) => addr,
        Err(_) => return false,
    };
    match Ipv6Net::new(network, prefix) {
        Ok(net) => net.contains(&candidate),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_validation() {
        assert!(is_valid_ipv4("192.168.100.1"));
        assert!(is_valid_ipv4("0.0.0.0"));
        assert!(is_valid_ipv4("255.255.255.255"));
        assert!(!is_valid_ipv4(""));
        assert!(!is_valid_ipv4("192.168.100"));
        assert!(!is_valid_ipv4("192.168.100.256"));
        assert!(!is_valid_ipv4("192.168.100.1.5"));
        assert!(!is_valid_ipv4("not an address"));
    }

    #[test]
    fn test_ipv6_validation() {
        assert!(is_valid_ipv6("fd00::1"));
        assert!(is_valid_ipv6("::"));
        assert!(is_valid_ipv6("2001:db8:0:0:0:0:0:1"));
        assert!(!is_valid_ipv6(""));
        assert!(!is_valid_ipv6("fd00::1::2"));
        assert!(!is_valid_ipv6("192.168.100.1"));
    }

    #[test]
    fn test_netmask_parsing() {
        assert_eq!(parse_netmask_or_prefix("255.255.255.0"), Some(24));
        assert_eq!(parse_netmask_or_prefix("255.255.0.0"), Some(16));
        assert_eq!(parse_netmask_or_prefix("255.254.0.0"), Some(15));
        assert_eq!(parse_netmask_or_prefix("0.0.0.0"), Some(0));
        // Non-contiguous masks are invalid.
        assert_eq!(parse_netmask_or_prefix("255.0.255.0"), None);
        assert_eq!(parse_netmask_or_prefix("0.255.255.255"), None);
        // Wrong octet counts are invalid.
        assert_eq!(parse_netmask_or_prefix("255.255.255"), None);
        assert_eq!(parse_netmask_or_prefix("255.255.255.255.0"), None);
    }

    #[test]
    fn test_prefix_parsing() {
        for prefix in 1..=31u8 {
            assert_eq!(parse_netmask_or_prefix(&prefix.to_string()), Some(prefix));
        }
        assert_eq!(parse_netmask_or_prefix("0"), None);
        assert_eq!(parse_netmask_or_prefix("32"), None);
        assert_eq!(parse_netmask_or_prefix("129"), None);
        assert_eq!(parse_netmask_or_prefix(""), None);
        assert_eq!(parse_netmask_or_prefix("abc"), None);
    }

    #[test]
    fn test_netmask_round_trip() {
        for mask in [
            "128.0.0.0",
            "255.0.0.0",
            "255.224.0.0",
            "255.255.0.0",
            "255.255.255.0",
            "255.255.255.252",
        ] {
            let prefix = parse_netmask_or_prefix(mask).unwrap();
            assert_eq!(prefix_to_netmask(prefix).unwrap(), mask);
        }
    }

    #[test]
    fn test_normalize_netmask() {
        assert_eq!(normalize_netmask("24").as_deref(), Some("255.255.255.0"));
        assert_eq!(
            normalize_netmask("255.255.0.0").as_deref(),
            Some("255.255.0.0")
        );
        assert_eq!(normalize_netmask("abc"), None);
    }

    #[test]
    fn test_ipv4_subnet_contains() {
        assert!(ipv4_subnet_contains("192.168.100.1", "24", "192.168.100.254"));
        assert!(ipv4_subnet_contains(
            "192.168.100.1",
            "255.255.255.0",
            "192.168.100.20"
        ));
        assert!(!ipv4_subnet_contains("192.168.100.1", "24", "192.168.101.1"));
        assert!(!ipv4_subnet_contains("192.168.100.1", "24", "garbage"));
        assert!(!ipv4_subnet_contains("garbage", "24", "192.168.100.1"));
    }

    #[test]
    fn test_network_identifier() {
        assert!(ipv4_is_network_identifier("192.168.100.0", "24"));
        assert!(!ipv4_is_network_identifier("192.168.100.1", "24"));
        assert!(ipv4_is_network_identifier("10.0.0.0", "255.0.0.0"));
    }

    #[test]
    fn test_broadcast() {
        assert!(ipv4_is_broadcast("192.168.100.255", "24"));
        assert!(!ipv4_is_broadcast("192.168.100.255", "16"));
        assert!(!ipv4_is_broadcast("192.168.100.254", "24"));
    }

    #[test]
    fn test_first_host() {
        assert_eq!(
            ipv4_first_host("192.168.100.0", "24").as_deref(),
            Some("192.168.100.1")
        );
        assert_eq!(
            ipv4_first_host("10.20.0.77", "16").as_deref(),
            Some("10.20.0.1")
        );
    }

    #[test]
    fn test_ipv6_prefix() {
        assert!(ipv6_prefix_valid("0"));
        assert!(ipv6_prefix_valid("64"));
        assert!(ipv6_prefix_valid("128"));
        assert!(!ipv6_prefix_valid("129"));
        assert!(!ipv6_prefix_valid(""));
        assert!(!ipv6_prefix_valid("-1"));
        assert!(!ipv6_prefix_valid("sixty-four"));
    }

    #[test]
    fn test_ipv6_subnet_contains() {
        assert!(ipv6_subnet_contains("fd00::", 64, "fd00::1"));
        assert!(!ipv6_subnet_contains("fd00::", 64, "fd01::1"));
        // The compressed form expands to the same subnet as the full form.
        assert!(ipv6_subnet_contains(
            "fd00:0:0:0:0:0:0:0",
            64,
            "fd00::ffff"
        ));
        assert!(!ipv6_subnet_contains("fd00::", 64, "garbage"));
    }
}
