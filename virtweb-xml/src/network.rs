//! Virtual network configuration documents.
//!
//! Covers the three jobs the console has around networks: parsing the
//! document the hypervisor hands back into a typed record, building a new
//! document from the creation dialog parameters, and surgically editing
//! the static DHCP host entries of an already-defined network.

use serde::{Deserialize, Serialize};
use tracing::warn;

use virtweb_net::ip;
use virtweb_net::{ForwardMode, NetworkCreateParams};

use crate::document::{NodeId, XmlDocument};
use crate::error::{Result, XmlError};

/// Parsed virtual network configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkDef {
    pub name: Option<String>,
    pub uuid: Option<String>,
    /// Hypervisor-assigned bridge; absent until the network is activated.
    pub bridge: Option<String>,
    pub forward_mode: Option<String>,
    pub forward_dev: Option<String>,
    pub mtu: Option<u32>,
    pub ip: Vec<NetworkIp>,
}

/// One address block of a network, at most one per family.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkIp {
    pub family: String,
    pub address: Option<String>,
    pub netmask: Option<String>,
    pub prefix: Option<String>,
    pub dhcp: NetworkDhcp,
}

/// DHCP settings nested inside an address block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkDhcp {
    pub range_start: Option<String>,
    pub range_end: Option<String>,
    pub hosts: Vec<DhcpHost>,
    pub bootp_file: Option<String>,
}

/// A static DHCP host entry, pinned by MAC address or client id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpHost {
    pub ip: Option<String>,
    pub name: Option<String>,
    pub mac: Option<String>,
    pub id: Option<String>,
}

impl NetworkDef {
    /// Parse a network document.
    ///
    /// Optional attributes stay `None`; an unexpectedly missing element is
    /// logged as a warning but never fails the whole parse. Only a document
    /// that cannot be read at all is an error.
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = XmlDocument::parse(xml)?;
        let root = doc.root();
        if doc.name(root) != "network" {
            return Err(XmlError::Structure(format!(
                "expected network document, got <{}>",
                doc.name(root)
            )));
        }

        let name = doc.find(root, "name").map(|el| doc.text(el).trim().to_string());
        let uuid = doc.find(root, "uuid").map(|el| doc.text(el).trim().to_string());
        if uuid.is_none() {
            warn!(name = name.as_deref(), "network document has no uuid element");
        }

        let bridge = doc
            .find(root, "bridge")
            .and_then(|el| doc.attr(el, "name").map(str::to_string));
        let mtu = doc
            .find(root, "mtu")
            .and_then(|el| doc.attr(el, "size"))
            .and_then(|size| size.parse().ok());

        let (forward_mode, forward_dev) = match doc.find(root, "forward") {
            Some(forward) => (
                // A forward element with no mode attribute means NAT.
                Some(doc.attr(forward, "mode").unwrap_or("nat").to_string()),
                doc.attr(forward, "dev").map(str::to_string),
            ),
            None => (None, None),
        };

        let ip = doc
            .find_all(root, "ip")
            .into_iter()
            .map(|el| parse_ip_block(&doc, el))
            .collect();

        Ok(Self {
            name,
            uuid,
            bridge,
            forward_mode,
            forward_dev,
            mtu,
            ip,
        })
    }
}

fn parse_ip_block(doc: &XmlDocument, el: NodeId) -> NetworkIp {
    let mut block = NetworkIp {
        family: doc.attr(el, "family").unwrap_or("ipv4").to_string(),
        address: doc.attr(el, "address").map(str::to_string),
        netmask: doc.attr(el, "netmask").map(str::to_string),
        prefix: doc.attr(el, "prefix").map(str::to_string),
        dhcp: NetworkDhcp::default(),
    };

    if let Some(dhcp) = doc.find(el, "dhcp") {
        if let Some(range) = doc.find(dhcp, "range") {
            block.dhcp.range_start = doc.attr(range, "start").map(str::to_string);
            block.dhcp.range_end = doc.attr(range, "end").map(str::to_string);
        }
        block.dhcp.hosts = doc
            .find_all(dhcp, "host")
            .into_iter()
            .map(|host| DhcpHost {
                ip: doc.attr(host, "ip").map(str::to_string),
                name: doc.attr(host, "name").map(str::to_string),
                mac: doc.attr(host, "mac").map(str::to_string),
                id: doc.attr(host, "id").map(str::to_string),
            })
            .collect();
        block.dhcp.bootp_file = doc
            .find(dhcp, "bootp")
            .and_then(|bootp| doc.attr(bootp, "file").map(str::to_string));
    }

    block
}

/// Build a new network document from validated creation parameters.
pub fn build_network_xml(params: &NetworkCreateParams) -> Result<String> {
    let mut doc = XmlDocument::new("network");
    let root = doc.root();

    let name = doc.append_element(root, "name");
    doc.set_text(name, params.name.trim());

    if params.forward_mode != ForwardMode::None {
        let forward = doc.append_element(root, "forward");
        doc.set_attr(forward, "mode", params.forward_mode.as_str());
        // Only NAT and routed networks bind to a specific device; "open"
        // leaves the device to the hypervisor.
        if matches!(params.forward_mode, ForwardMode::Nat | ForwardMode::Route) {
            if let Some(device) = params.device.as_deref() {
                doc.set_attr(forward, "dev", device);
            }
        }
    }

    // All modes offered here get a local DNS domain; passthrough-style
    // modes, which would not, never reach this builder.
    let domain = doc.append_element(root, "domain");
    doc.set_attr(domain, "name", params.name.trim());
    doc.set_attr(domain, "localOnly", "yes");

    if params.ip.ipv4() && !params.ipv4.is_empty() {
        // Answer "gateway" locally so guests can always resolve the host.
        let dns = doc.append_element(root, "dns");
        let dns_host = doc.append_element(dns, "host");
        doc.set_attr(dns_host, "ip", &params.ipv4);
        let hostname = doc.append_element(dns_host, "hostname");
        doc.set_text(hostname, "gateway");

        let ip = doc.append_element(root, "ip");
        doc.set_attr(ip, "address", &params.ipv4);
        let netmask =
            ip::normalize_netmask(&params.netmask).unwrap_or_else(|| params.netmask.clone());
        doc.set_attr(ip, "netmask", &netmask);
        doc.set_attr(ip, "localPtr", "yes");
        if params.ipv4_dhcp_enabled && !params.ipv4_dhcp_range_start.is_empty() {
            let dhcp = doc.append_element(ip, "dhcp");
            let range = doc.append_element(dhcp, "range");
            doc.set_attr(range, "start", &params.ipv4_dhcp_range_start);
            doc.set_attr(range, "end", &params.ipv4_dhcp_range_end);
        }
    }

    if params.ip.ipv6() && !params.ipv6.is_empty() {
        let ip = doc.append_element(root, "ip");
        doc.set_attr(ip, "family", "ipv6");
        doc.set_attr(ip, "address", &params.ipv6);
        doc.set_attr(ip, "prefix", &params.prefix);
        if params.ipv6_dhcp_enabled && !params.ipv6_dhcp_range_start.is_empty() {
            let dhcp = doc.append_element(ip, "dhcp");
            let range = doc.append_element(dhcp, "range");
            doc.set_attr(range, "start", &params.ipv6_dhcp_range_start);
            doc.set_attr(range, "end", &params.ipv6_dhcp_range_end);
        }
    }

    if let Some(mtu) = params.mtu {
        let el = doc.append_element(root, "mtu");
        doc.set_attr(el, "size", &mtu.to_string());
    }

    doc.to_xml()
}

/// Add a static DHCP host entry to the address block at `ip_index`.
///
/// The entry is appended to the live document; nothing else is touched.
/// Returns `false` when the document has no such address block.
pub fn add_dhcp_host(doc: &mut XmlDocument, ip_index: usize, host: &DhcpHost) -> bool {
    let root = doc.root();
    let Some(&ip) = doc.find_all(root, "ip").get(ip_index) else {
        return false;
    };
    let dhcp = doc.ensure_child(ip, "dhcp");
    let el = doc.append_element(dhcp, "host");
    if let Some(mac) = &host.mac {
        doc.set_attr(el, "mac", mac);
    }
    if let Some(id) = &host.id {
        doc.set_attr(el, "id", id);
    }
    if let Some(ip) = &host.ip {
        doc.set_attr(el, "ip", ip);
    }
    if let Some(name) = &host.name {
        doc.set_attr(el, "name", name);
    }
    true
}

/// Remove the static DHCP host entry matching `host` from the address
/// block at `ip_index`. Matching compares every field `host` supplies; a
/// missing entry is a no-op returning `false`.
pub fn remove_dhcp_host(doc: &mut XmlDocument, ip_index: usize, host: &DhcpHost) -> bool {
    let root = doc.root();
    let Some(&ip) = doc.find_all(root, "ip").get(ip_index) else {
        return false;
    };
    let Some(dhcp) = doc.find(ip, "dhcp") else {
        return false;
    };
    let matches = |el: NodeId| {
        let attr_matches = |key: &str, expected: &Option<String>| match expected {
            Some(expected) => doc.attr(el, key) == Some(expected.as_str()),
            None => true,
        };
        attr_matches("mac", &host.mac)
            && attr_matches("id", &host.id)
            && attr_matches("ip", &host.ip)
            && attr_matches("name", &host.name)
    };
    let Some(found) = doc.find_all(dhcp, "host").into_iter().find(|&el| matches(el)) else {
        return false;
    };
    doc.remove_child(dhcp, found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use virtweb_net::IpConfig;

    const NAT_NETWORK: &str = r#"<network>
  <name>default</name>
  <uuid>4afe4b0f-8ff5-4d3a-8f57-52b5e0672db0</uuid>
  <forward mode="nat"/>
  <bridge name="virbr0" stp="on" delay="0"/>
  <mtu size="9000"/>
  <ip address="192.168.122.1" netmask="255.255.255.0">
    <dhcp>
      <range start="192.168.122.2" end="192.168.122.254"/>
      <host mac="52:54:00:a1:b2:c3" ip="192.168.122.10" name="build"/>
      <bootp file="pxelinux.0"/>
    </dhcp>
  </ip>
  <ip family="ipv6" address="fd00:dead:beef::1" prefix="64"/>
</network>"#;

    #[test]
    fn test_parse_nat_network() {
        let net = NetworkDef::parse(NAT_NETWORK).unwrap();
        assert_eq!(net.name.as_deref(), Some("default"));
        assert_eq!(
            net.uuid.as_deref(),
            Some("4afe4b0f-8ff5-4d3a-8f57-52b5e0672db0")
        );
        assert_eq!(net.bridge.as_deref(), Some("virbr0"));
        assert_eq!(net.forward_mode.as_deref(), Some("nat"));
        assert_eq!(net.forward_dev, None);
        assert_eq!(net.mtu, Some(9000));

        assert_eq!(net.ip.len(), 2);
        let v4 = &net.ip[0];
        assert_eq!(v4.family, "ipv4");
        assert_eq!(v4.address.as_deref(), Some("192.168.122.1"));
        assert_eq!(v4.netmask.as_deref(), Some("255.255.255.0"));
        assert_eq!(v4.dhcp.range_start.as_deref(), Some("192.168.122.2"));
        assert_eq!(v4.dhcp.hosts.len(), 1);
        assert_eq!(v4.dhcp.hosts[0].mac.as_deref(), Some("52:54:00:a1:b2:c3"));
        assert_eq!(v4.dhcp.bootp_file.as_deref(), Some("pxelinux.0"));

        let v6 = &net.ip[1];
        assert_eq!(v6.family, "ipv6");
        assert_eq!(v6.prefix.as_deref(), Some("64"));
        assert!(v6.dhcp.hosts.is_empty());
    }

    #[test]
    fn test_parse_forward_mode_defaults_to_nat() {
        let net = NetworkDef::parse("<network><name>n</name><forward/></network>").unwrap();
        assert_eq!(net.forward_mode.as_deref(), Some("nat"));
    }

    #[test]
    fn test_parse_isolated_network() {
        let net = NetworkDef::parse("<network><name>n</name></network>").unwrap();
        assert_eq!(net.forward_mode, None);
        assert!(net.ip.is_empty());
    }

    #[test]
    fn test_parse_wrong_root() {
        assert!(NetworkDef::parse("<domain/>").is_err());
    }

    fn nat_params() -> NetworkCreateParams {
        NetworkCreateParams {
            forward_mode: ForwardMode::Nat,
            ip: IpConfig::Ipv4Only,
            ipv4: "192.168.100.1".to_string(),
            netmask: "24".to_string(),
            ..NetworkCreateParams::new("testnet")
        }
    }

    #[test]
    fn test_build_nat_network() {
        let xml = build_network_xml(&nat_params()).unwrap();
        assert!(xml.contains("<name>testnet</name>"));
        assert!(xml.contains(r#"<forward mode="nat"/>"#));
        // "automatic" device selection leaves out the dev attribute.
        assert!(!xml.contains("dev="));
        assert!(xml.contains(r#"<domain name="testnet" localOnly="yes"/>"#));
        assert!(xml.contains(r#"<host ip="192.168.100.1"><hostname>gateway</hostname></host>"#));
        // The prefix input is normalized to the dotted-quad spelling.
        assert!(xml.contains(r#"netmask="255.255.255.0""#));
        assert!(xml.contains(r#"localPtr="yes""#));
        assert!(!xml.contains("<dhcp"));
    }

    #[test]
    fn test_build_isolated_network_has_no_forward() {
        let params = NetworkCreateParams {
            forward_mode: ForwardMode::None,
            ..nat_params()
        };
        let xml = build_network_xml(&params).unwrap();
        assert!(!xml.contains("<forward"));
    }

    #[test]
    fn test_build_with_device_and_dhcp() {
        let params = NetworkCreateParams {
            device: Some("eth1".to_string()),
            ipv4_dhcp_enabled: true,
            ipv4_dhcp_range_start: "192.168.100.100".to_string(),
            ipv4_dhcp_range_end: "192.168.100.200".to_string(),
            ..nat_params()
        };
        let xml = build_network_xml(&params).unwrap();
        assert!(xml.contains(r#"<forward mode="nat" dev="eth1"/>"#));
        assert!(xml.contains(r#"<range start="192.168.100.100" end="192.168.100.200"/>"#));
    }

    #[test]
    fn test_build_open_network_ignores_device() {
        let params = NetworkCreateParams {
            forward_mode: ForwardMode::Open,
            device: Some("eth1".to_string()),
            ..nat_params()
        };
        let xml = build_network_xml(&params).unwrap();
        assert!(xml.contains(r#"<forward mode="open"/>"#));
        assert!(!xml.contains("dev="));
    }

    #[test]
    fn test_build_ipv6_block() {
        let params = NetworkCreateParams {
            ip: IpConfig::Ipv4AndIpv6,
            ipv6: "fd00::1".to_string(),
            prefix: "64".to_string(),
            ipv6_dhcp_enabled: true,
            ipv6_dhcp_range_start: "fd00::100".to_string(),
            ipv6_dhcp_range_end: "fd00::1ff".to_string(),
            ..nat_params()
        };
        let xml = build_network_xml(&params).unwrap();
        assert!(xml.contains(r#"<ip family="ipv6" address="fd00::1" prefix="64">"#));
        assert!(xml.contains(r#"<range start="fd00::100" end="fd00::1ff"/>"#));
        // DNS gateway entry and localPtr apply to the IPv4 block only.
        assert_eq!(xml.matches("localPtr").count(), 1);
    }

    #[test]
    fn test_build_parse_round_trip() {
        let params = NetworkCreateParams {
            ipv4_dhcp_enabled: true,
            ipv4_dhcp_range_start: "192.168.100.100".to_string(),
            ipv4_dhcp_range_end: "192.168.100.200".to_string(),
            mtu: Some(1500),
            ..nat_params()
        };
        let net = NetworkDef::parse(&build_network_xml(&params).unwrap()).unwrap();
        assert_eq!(net.name.as_deref(), Some("testnet"));
        assert_eq!(net.forward_mode.as_deref(), Some("nat"));
        assert_eq!(net.mtu, Some(1500));
        // Bridge name is hypervisor-assigned and absent until activation.
        assert_eq!(net.bridge, None);
        assert_eq!(net.ip.len(), 1);
        assert_eq!(net.ip[0].address.as_deref(), Some("192.168.100.1"));
        assert_eq!(net.ip[0].netmask.as_deref(), Some("255.255.255.0"));
        assert_eq!(net.ip[0].dhcp.range_start.as_deref(), Some("192.168.100.100"));
    }

    #[test]
    fn test_add_and_remove_dhcp_host() {
        let mut doc = XmlDocument::parse(NAT_NETWORK).unwrap();
        let host = DhcpHost {
            mac: Some("52:54:00:11:22:33".to_string()),
            ip: Some("192.168.122.20".to_string()),
            name: Some("db".to_string()),
            id: None,
        };
        assert!(add_dhcp_host(&mut doc, 0, &host));

        let net = NetworkDef::parse(&doc.to_xml().unwrap()).unwrap();
        assert_eq!(net.ip[0].dhcp.hosts.len(), 2);
        assert_eq!(net.ip[0].dhcp.hosts[1], host);
        // The untouched sibling entry is still intact.
        assert_eq!(
            net.ip[0].dhcp.hosts[0].mac.as_deref(),
            Some("52:54:00:a1:b2:c3")
        );

        assert!(remove_dhcp_host(&mut doc, 0, &host));
        let net = NetworkDef::parse(&doc.to_xml().unwrap()).unwrap();
        assert_eq!(net.ip[0].dhcp.hosts.len(), 1);

        // Removing an entry that is no longer there is a no-op.
        assert!(!remove_dhcp_host(&mut doc, 0, &host));
        // So is targeting an address block the document does not have.
        assert!(!add_dhcp_host(&mut doc, 5, &host));
    }
}
