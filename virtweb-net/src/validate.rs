//! Validation of the virtual network creation dialog.
//!
//! The validator is a pure function from the raw dialog fields to a
//! field-keyed error map. An empty map means the parameters are valid and
//! can be handed to the document builder. Checks that depend on an earlier
//! field being valid are skipped entirely when that field already failed,
//! so an invalid mask does not cascade into nonsensical range errors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ip;

/// Traffic forwarding mode of a virtual network.
///
/// The document format supports more modes (routed, bridged, hostdev); the
/// creation dialog only offers this subset, with `Route` reachable through
/// pre-filled parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardMode {
    Nat,
    Route,
    Open,
    None,
}

impl ForwardMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForwardMode::Nat => "nat",
            ForwardMode::Route => "route",
            ForwardMode::Open => "open",
            ForwardMode::None => "none",
        }
    }
}

/// Which address families the network carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpConfig {
    Ipv4Only,
    Ipv6Only,
    Ipv4AndIpv6,
    None,
}

impl IpConfig {
    pub fn ipv4(&self) -> bool {
        matches!(self, IpConfig::Ipv4Only | IpConfig::Ipv4AndIpv6)
    }

    pub fn ipv6(&self) -> bool {
        matches!(self, IpConfig::Ipv6Only | IpConfig::Ipv4AndIpv6)
    }
}

/// Raw fields of the network creation dialog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkCreateParams {
    pub name: String,
    pub forward_mode: ForwardMode,
    /// Physical device to bind to; `None` means "automatic".
    pub device: Option<String>,
    pub ip: IpConfig,
    pub ipv4: String,
    /// Dotted-quad netmask or prefix length, as typed.
    pub netmask: String,
    pub ipv4_dhcp_enabled: bool,
    pub ipv4_dhcp_range_start: String,
    pub ipv4_dhcp_range_end: String,
    pub ipv6: String,
    pub prefix: String,
    pub ipv6_dhcp_enabled: bool,
    pub ipv6_dhcp_range_start: String,
    pub ipv6_dhcp_range_end: String,
    /// Optional MTU for the bridge; not offered by the dialog itself.
    pub mtu: Option<u32>,
}

impl NetworkCreateParams {
    /// Parameters for an isolated network with no address blocks.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            forward_mode: ForwardMode::None,
            device: None,
            ip: IpConfig::None,
            ipv4: String::new(),
            netmask: String::new(),
            ipv4_dhcp_enabled: false,
            ipv4_dhcp_range_start: String::new(),
            ipv4_dhcp_range_end: String::new(),
            ipv6: String::new(),
            prefix: String::new(),
            ipv6_dhcp_enabled: false,
            ipv6_dhcp_range_start: String::new(),
            ipv6_dhcp_range_end: String::new(),
            mtu: None,
        }
    }
}

/// Dialog fields that can carry a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Name,
    Ipv4,
    Netmask,
    Ipv4DhcpRangeStart,
    Ipv4DhcpRangeEnd,
    Ipv6,
    Prefix,
    Ipv6DhcpRangeStart,
    Ipv6DhcpRangeEnd,
}

impl Field {
    /// Field identifier as used by the dialog markup.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Ipv4 => "ipv4",
            Field::Netmask => "netmask",
            Field::Ipv4DhcpRangeStart => "ipv4DhcpRangeStart",
            Field::Ipv4DhcpRangeEnd => "ipv4DhcpRangeEnd",
            Field::Ipv6 => "ipv6",
            Field::Prefix => "prefix",
            Field::Ipv6DhcpRangeStart => "ipv6DhcpRangeStart",
            Field::Ipv6DhcpRangeEnd => "ipv6DhcpRangeEnd",
        }
    }
}

/// Field-keyed validation error messages. Empty means valid.
pub type ValidationErrors = BTreeMap<Field, String>;

/// Validate the network creation dialog fields.
///
/// Per-family checks run only when the family is selected in the IP
/// configuration choice; the IPv4 and IPv6 blocks are independent.
pub fn validate_network_params(params: &NetworkCreateParams) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if params.name.trim().is_empty() {
        errors.insert(Field::Name, "Name should not be empty".to_string());
    }

    if params.ip.ipv4() {
        validate_ipv4_block(params, &mut errors);
    }
    if params.ip.ipv6() {
        validate_ipv6_block(params, &mut errors);
    }

    errors
}

fn validate_ipv4_block(params: &NetworkCreateParams, errors: &mut ValidationErrors) {
    // The parsed prefix is kept only when the mask passed every check; the
    // address and range checks below key off it.
    let mut mask_prefix: Option<u8> = None;

    if params.netmask.trim().is_empty() {
        errors.insert(
            Field::Netmask,
            "Mask or prefix length should not be empty".to_string(),
        );
    } else {
        match ip::parse_netmask_or_prefix(&params.netmask) {
            None => {
                errors.insert(
                    Field::Netmask,
                    "Mask or prefix length is not valid".to_string(),
                );
            }
            // Reverse DNS delegation works on octet boundaries, so network
            // creation only accepts /8, /16 and /24.
            Some(prefix) if prefix % 8 != 0 || prefix > 24 => {
                errors.insert(
                    Field::Netmask,
                    "Network prefix length must be a multiple of 8 and no longer than /24"
                        .to_string(),
                );
            }
            Some(prefix) => mask_prefix = Some(prefix),
        }
    }

    if params.ipv4.trim().is_empty() {
        errors.insert(Field::Ipv4, "IPv4 address should not be empty".to_string());
    } else if !ip::is_valid_ipv4(&params.ipv4) {
        errors.insert(Field::Ipv4, "IPv4 address is not valid".to_string());
    } else if let Some(prefix) = mask_prefix {
        let prefix = prefix.to_string();
        if ip::ipv4_is_network_identifier(&params.ipv4, &prefix) {
            let message = match ip::ipv4_first_host(&params.ipv4, &prefix) {
                Some(first_host) => format!(
                    "IPv4 address is the network identifier of this subnet; consider using {}",
                    first_host
                ),
                None => "IPv4 address is the network identifier of this subnet".to_string(),
            };
            errors.insert(Field::Ipv4, message);
        } else if ip::ipv4_is_broadcast(&params.ipv4, &prefix) {
            errors.insert(
                Field::Ipv4,
                "IPv4 address is the broadcast address of this subnet".to_string(),
            );
        }
    }

    if params.ipv4_dhcp_enabled {
        validate_ipv4_range_bound(
            params,
            errors,
            Field::Ipv4DhcpRangeStart,
            &params.ipv4_dhcp_range_start,
            "start",
            mask_prefix,
        );
        validate_ipv4_range_bound(
            params,
            errors,
            Field::Ipv4DhcpRangeEnd,
            &params.ipv4_dhcp_range_end,
            "end",
            mask_prefix,
        );
    }
}

fn validate_ipv4_range_bound(
    params: &NetworkCreateParams,
    errors: &mut ValidationErrors,
    field: Field,
    value: &str,
    which: &str,
    mask_prefix: Option<u8>,
) {
    if value.trim().is_empty() {
        errors.insert(
            field,
            format!("DHCP range {} address should not be empty", which),
        );
    } else if !ip::is_valid_ipv4(value) {
        errors.insert(field, format!("DHCP range {} address is not valid", which));
    } else if let Some(prefix) = mask_prefix {
        if !ip::ipv4_subnet_contains(&params.ipv4, &prefix.to_string(), value) {
            errors.insert(
                field,
                format!(
                    "DHCP range {} address is not within the configured subnet",
                    which
                ),
            );
        }
    }
}

fn validate_ipv6_block(params: &NetworkCreateParams, errors: &mut ValidationErrors) {
    if params.ipv6.trim().is_empty() {
        errors.insert(Field::Ipv6, "IPv6 address should not be empty".to_string());
    } else if !ip::is_valid_ipv6(&params.ipv6) {
        errors.insert(Field::Ipv6, "IPv6 address is not valid".to_string());
    }

    if params.prefix.trim().is_empty() {
        errors.insert(
            Field::Prefix,
            "Prefix length should not be empty".to_string(),
        );
    } else if !ip::ipv6_prefix_valid(&params.prefix) {
        errors.insert(Field::Prefix, "Prefix length is not valid".to_string());
    }

    if params.ipv6_dhcp_enabled {
        // Unlike IPv4, the range checks here do not key off a prefix-field
        // error; containment is simply skipped when the prefix cannot be
        // read as a number at all. See DESIGN.md.
        let prefix = params
            .prefix
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|prefix| *prefix <= 128);

        validate_ipv6_range_bound(
            params,
            errors,
            Field::Ipv6DhcpRangeStart,
            &params.ipv6_dhcp_range_start,
            "start",
            prefix,
        );
        validate_ipv6_range_bound(
            params,
            errors,
            Field::Ipv6DhcpRangeEnd,
            &params.ipv6_dhcp_range_end,
            "end",
            prefix,
        );
    }
}

fn validate_ipv6_range_bound(
    params: &NetworkCreateParams,
    errors: &mut ValidationErrors,
    field: Field,
    value: &str,
    which: &str,
    prefix: Option<u8>,
) {
    if value.trim().is_empty() {
        errors.insert(
            field,
            format!("DHCP range {} address should not be empty", which),
        );
    } else if !ip::is_valid_ipv6(value) {
        errors.insert(field, format!("DHCP range {} address is not valid", which));
    } else if let Some(prefix) = prefix {
        if !ip::ipv6_subnet_contains(&params.ipv6, prefix, value) {
            errors.insert(
                field,
                format!(
                    "DHCP range {} address is not within the configured subnet",
                    which
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_ipv4_params() -> NetworkCreateParams {
        NetworkCreateParams {
            forward_mode: ForwardMode::Nat,
            ip: IpConfig::Ipv4Only,
            ipv4: "192.168.100.1".to_string(),
            netmask: "24".to_string(),
            ..NetworkCreateParams::new("testnet")
        }
    }

    #[test]
    fn test_valid_params() {
        assert!(validate_network_params(&valid_ipv4_params()).is_empty());
    }

    #[test]
    fn test_empty_name() {
        let params = NetworkCreateParams {
            name: "  ".to_string(),
            ..valid_ipv4_params()
        };
        let errors = validate_network_params(&params);
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key(&Field::Name));
    }

    #[test]
    fn test_network_identifier_address() {
        let params = NetworkCreateParams {
            ipv4: "192.168.100.0".to_string(),
            ..valid_ipv4_params()
        };
        let errors = validate_network_params(&params);
        assert!(errors.contains_key(&Field::Ipv4));
        assert!(!errors.contains_key(&Field::Netmask));
        // The message points the user at the first usable host address.
        assert!(errors[&Field::Ipv4].contains("192.168.100.1"));
    }

    #[test]
    fn test_broadcast_address() {
        let params = NetworkCreateParams {
            ipv4: "192.168.100.255".to_string(),
            ..valid_ipv4_params()
        };
        let errors = validate_network_params(&params);
        assert!(errors[&Field::Ipv4].contains("broadcast"));
    }

    #[test]
    fn test_invalid_mask_skips_address_subnet_checks() {
        // With a bad mask the network-identifier check cannot run, so only
        // the netmask error is reported even though the address is the
        // identifier of the /24.
        let params = NetworkCreateParams {
            ipv4: "192.168.100.0".to_string(),
            netmask: "255.0.255.0".to_string(),
            ..valid_ipv4_params()
        };
        let errors = validate_network_params(&params);
        assert!(errors.contains_key(&Field::Netmask));
        assert!(!errors.contains_key(&Field::Ipv4));
    }

    #[test]
    fn test_prefix_policy() {
        for (netmask, ok) in [("8", true), ("16", true), ("24", true), ("20", false), ("30", false)]
        {
            let params = NetworkCreateParams {
                netmask: netmask.to_string(),
                ..valid_ipv4_params()
            };
            let errors = validate_network_params(&params);
            assert_eq!(!errors.contains_key(&Field::Netmask), ok, "netmask {}", netmask);
        }
    }

    #[test]
    fn test_dhcp_range_outside_subnet() {
        let params = NetworkCreateParams {
            ipv4_dhcp_enabled: true,
            ipv4_dhcp_range_start: "192.168.101.1".to_string(),
            ipv4_dhcp_range_end: "192.168.100.254".to_string(),
            ..valid_ipv4_params()
        };
        let errors = validate_network_params(&params);
        assert_eq!(errors.len(), 1);
        assert!(errors[&Field::Ipv4DhcpRangeStart].contains("not within"));
    }

    #[test]
    fn test_dhcp_range_skipped_when_mask_invalid() {
        let params = NetworkCreateParams {
            netmask: "garbage.mask".to_string(),
            ipv4_dhcp_enabled: true,
            ipv4_dhcp_range_start: "10.0.0.1".to_string(),
            ipv4_dhcp_range_end: "10.0.0.100".to_string(),
            ..valid_ipv4_params()
        };
        let errors = validate_network_params(&params);
        // Range addresses are well-formed; without a valid mask the
        // containment check is skipped, leaving only the netmask error.
        assert!(errors.contains_key(&Field::Netmask));
        assert!(!errors.contains_key(&Field::Ipv4DhcpRangeStart));
        assert!(!errors.contains_key(&Field::Ipv4DhcpRangeEnd));
    }

    #[test]
    fn test_dhcp_disabled_ignores_range_fields() {
        let params = NetworkCreateParams {
            ipv4_dhcp_range_start: "not an address".to_string(),
            ..valid_ipv4_params()
        };
        assert!(validate_network_params(&params).is_empty());
    }

    #[test]
    fn test_ipv6_block() {
        let params = NetworkCreateParams {
            ip: IpConfig::Ipv6Only,
            ipv6: "fd00::1".to_string(),
            prefix: "64".to_string(),
            ..NetworkCreateParams::new("v6net")
        };
        assert!(validate_network_params(&params).is_empty());

        let params = NetworkCreateParams {
            ipv6: "fd00::zz".to_string(),
            ..params
        };
        let errors = validate_network_params(&params);
        assert!(errors.contains_key(&Field::Ipv6));
        assert!(!errors.contains_key(&Field::Prefix));
    }

    #[test]
    fn test_ipv6_dhcp_containment() {
        let params = NetworkCreateParams {
            ip: IpConfig::Ipv6Only,
            ipv6: "fd00::1".to_string(),
            prefix: "64".to_string(),
            ipv6_dhcp_enabled: true,
            ipv6_dhcp_range_start: "fd00::100".to_string(),
            ipv6_dhcp_range_end: "fd01::200".to_string(),
            ..NetworkCreateParams::new("v6net")
        };
        let errors = validate_network_params(&params);
        assert_eq!(errors.len(), 1);
        assert!(errors[&Field::Ipv6DhcpRangeEnd].contains("not within"));
    }

    #[test]
    fn test_both_families() {
        let params = NetworkCreateParams {
            ip: IpConfig::Ipv4AndIpv6,
            ipv6: String::new(),
            prefix: "64".to_string(),
            ..valid_ipv4_params()
        };
        let errors = validate_network_params(&params);
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key(&Field::Ipv6));
    }
}
