//! Domain (virtual machine) configuration documents.
//!
//! Parsing extracts the typed record the console needs; updates operate on
//! an already-parsed [`XmlDocument`] and touch only the elements relevant
//! to the requested change. A device that cannot be found is a no-op, not
//! an error; only wholesale structural absence (no `<devices>`, no
//! `<memory>`) is fatal.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::document::{NodeId, XmlDocument};
use crate::error::{Result, XmlError};

/// Parsed domain configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainDef {
    pub name: Option<String>,
    pub uuid: Option<String>,
    pub memory_kib: Option<u64>,
    pub current_memory_kib: Option<u64>,
    pub vcpus: Option<u32>,
    /// OS-level boot device names (`<os><boot dev=../>`), in order.
    pub os_boot: Vec<String>,
    pub disks: Vec<DomainDisk>,
    pub interfaces: Vec<DomainInterface>,
    pub hostdevs: Vec<DomainHostdev>,
    pub redirdevs: Vec<DomainRedirdev>,
}

/// A disk or CD-ROM device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainDisk {
    /// Target device name (e.g. "vda"); the disk's identity for updates.
    pub target: Option<String>,
    pub bus: Option<String>,
    /// "disk" or "cdrom".
    pub device: String,
    pub source_file: Option<String>,
    pub source_dev: Option<String>,
    pub driver_type: Option<String>,
    pub cache: Option<String>,
    pub readonly: bool,
    pub shareable: bool,
    pub boot_order: Option<u32>,
}

/// A network interface, identified by its MAC address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainInterface {
    pub mac: Option<String>,
    pub interface_type: Option<String>,
    pub source_network: Option<String>,
    pub source_bridge: Option<String>,
    pub source_dev: Option<String>,
    pub model: Option<String>,
    pub boot_order: Option<u32>,
}

/// A passed-through host device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainHostdev {
    pub mode: Option<String>,
    pub identity: Option<BootOrderDevice>,
    pub boot_order: Option<u32>,
}

/// A redirected (e.g. SPICE USB) device, identified by its address port.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainRedirdev {
    pub bus: Option<String>,
    pub redir_type: Option<String>,
    pub port: Option<String>,
    pub boot_order: Option<u32>,
}

/// Identity of a bootable device, as referenced by the boot order dialog.
///
/// Each device kind carries exactly the fields that identify one concrete
/// device instance inside the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BootOrderDevice {
    Disk {
        target: String,
    },
    Interface {
        mac: String,
    },
    HostdevUsb {
        vendor: String,
        product: String,
    },
    HostdevPci {
        domain: String,
        bus: String,
        slot: String,
        function: String,
    },
    HostdevScsi {
        adapter: String,
        bus: String,
        target: String,
        unit: String,
    },
    HostdevScsiIscsi {
        name: String,
    },
    HostdevScsiHost {
        protocol: String,
        wwpn: String,
    },
    HostdevMdev {
        uuid: String,
    },
    Redirdev {
        port: String,
    },
}

impl DomainDef {
    /// Parse a domain document. Optional attributes stay `None`; unexpected
    /// structural gaps are logged and skipped.
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = XmlDocument::parse(xml)?;
        let root = doc.root();
        if doc.name(root) != "domain" {
            return Err(XmlError::Structure(format!(
                "expected domain document, got <{}>",
                doc.name(root)
            )));
        }

        let name = doc.find(root, "name").map(|el| doc.text(el).trim().to_string());
        let uuid = doc.find(root, "uuid").map(|el| doc.text(el).trim().to_string());
        let memory_kib = doc.find(root, "memory").and_then(|el| memory_kib(&doc, el));
        let current_memory_kib = doc
            .find(root, "currentMemory")
            .and_then(|el| self::memory_kib(&doc, el));
        let vcpus = doc
            .find(root, "vcpu")
            .and_then(|el| doc.text(el).trim().parse().ok());

        let os_boot = match doc.find(root, "os") {
            Some(os) => doc
                .find_all(os, "boot")
                .into_iter()
                .filter_map(|el| doc.attr(el, "dev").map(str::to_string))
                .collect(),
            None => Vec::new(),
        };

        let mut def = Self {
            name,
            uuid,
            memory_kib,
            current_memory_kib,
            vcpus,
            os_boot,
            ..Self::default()
        };

        let Some(devices) = doc.find(root, "devices") else {
            warn!(name = def.name.as_deref(), "domain document has no devices element");
            return Ok(def);
        };

        for disk in doc.find_all(devices, "disk") {
            def.disks.push(parse_disk(&doc, disk));
        }
        for iface in doc.find_all(devices, "interface") {
            def.interfaces.push(parse_interface(&doc, iface));
        }
        for hostdev in doc.find_all(devices, "hostdev") {
            def.hostdevs.push(DomainHostdev {
                mode: doc.attr(hostdev, "mode").map(str::to_string),
                identity: hostdev_identity(&doc, hostdev),
                boot_order: boot_order(&doc, hostdev),
            });
        }
        for redirdev in doc.find_all(devices, "redirdev") {
            def.redirdevs.push(DomainRedirdev {
                bus: doc.attr(redirdev, "bus").map(str::to_string),
                redir_type: doc.attr(redirdev, "type").map(str::to_string),
                port: redirdev_port(&doc, redirdev),
                boot_order: boot_order(&doc, redirdev),
            });
        }

        Ok(def)
    }
}

fn parse_disk(doc: &XmlDocument, disk: NodeId) -> DomainDisk {
    let (driver_type, cache) = match doc.find(disk, "driver") {
        Some(driver) => (
            doc.attr(driver, "type").map(str::to_string),
            doc.attr(driver, "cache").map(str::to_string),
        ),
        None => (None, None),
    };
    let (source_file, source_dev) = match doc.find(disk, "source") {
        Some(source) => (
            doc.attr(source, "file").map(str::to_string),
            doc.attr(source, "dev").map(str::to_string),
        ),
        None => (None, None),
    };
    let (target, bus) = match doc.find(disk, "target") {
        Some(target) => (
            doc.attr(target, "dev").map(str::to_string),
            doc.attr(target, "bus").map(str::to_string),
        ),
        None => {
            warn!("disk element has no target");
            (None, None)
        }
    };
    DomainDisk {
        target,
        bus,
        device: doc.attr(disk, "device").unwrap_or("disk").to_string(),
        source_file,
        source_dev,
        driver_type,
        cache,
        readonly: doc.find(disk, "readonly").is_some(),
        shareable: doc.find(disk, "shareable").is_some(),
        boot_order: boot_order(doc, disk),
    }
}

fn parse_interface(doc: &XmlDocument, iface: NodeId) -> DomainInterface {
    let (source_network, source_bridge, source_dev) = match doc.find(iface, "source") {
        Some(source) => (
            doc.attr(source, "network").map(str::to_string),
            doc.attr(source, "bridge").map(str::to_string),
            doc.attr(source, "dev").map(str::to_string),
        ),
        None => (None, None, None),
    };
    DomainInterface {
        mac: doc
            .find(iface, "mac")
            .and_then(|mac| doc.attr(mac, "address").map(str::to_string)),
        interface_type: doc.attr(iface, "type").map(str::to_string),
        source_network,
        source_bridge,
        source_dev,
        model: doc
            .find(iface, "model")
            .and_then(|model| doc.attr(model, "type").map(str::to_string)),
        boot_order: boot_order(doc, iface),
    }
}

fn boot_order(doc: &XmlDocument, device: NodeId) -> Option<u32> {
    doc.find(device, "boot")
        .and_then(|boot| doc.attr(boot, "order"))
        .and_then(|order| order.parse().ok())
}

fn redirdev_port(doc: &XmlDocument, redirdev: NodeId) -> Option<String> {
    doc.find(redirdev, "address")
        .and_then(|address| doc.attr(address, "port").map(str::to_string))
}

/// Identity of a hostdev element, derived from its type-specific source.
fn hostdev_identity(doc: &XmlDocument, hostdev: NodeId) -> Option<BootOrderDevice> {
    let kind = doc.attr(hostdev, "type")?;
    let source = doc.find(hostdev, "source")?;
    match kind {
        "usb" => {
            let vendor = doc.find(source, "vendor")?;
            let product = doc.find(source, "product")?;
            Some(BootOrderDevice::HostdevUsb {
                vendor: doc.attr(vendor, "id")?.to_string(),
                product: doc.attr(product, "id")?.to_string(),
            })
        }
        "pci" => {
            let address = doc.find(source, "address")?;
            Some(BootOrderDevice::HostdevPci {
                domain: doc.attr(address, "domain")?.to_string(),
                bus: doc.attr(address, "bus")?.to_string(),
                slot: doc.attr(address, "slot")?.to_string(),
                function: doc.attr(address, "function")?.to_string(),
            })
        }
        "scsi" => {
            if doc.attr(source, "protocol").is_some() {
                // iSCSI-backed SCSI device, identified by its target name.
                Some(BootOrderDevice::HostdevScsiIscsi {
                    name: doc.attr(source, "name")?.to_string(),
                })
            } else {
                let adapter = doc.find(source, "adapter")?;
                let address = doc.find(source, "address")?;
                Some(BootOrderDevice::HostdevScsi {
                    adapter: doc.attr(adapter, "name")?.to_string(),
                    bus: doc.attr(address, "bus")?.to_string(),
                    target: doc.attr(address, "target")?.to_string(),
                    unit: doc.attr(address, "unit")?.to_string(),
                })
            }
        }
        "scsi_host" => Some(BootOrderDevice::HostdevScsiHost {
            protocol: doc.attr(source, "protocol")?.to_string(),
            wwpn: doc.attr(source, "wwpn")?.to_string(),
        }),
        "mdev" => {
            let address = doc.find(source, "address")?;
            Some(BootOrderDevice::HostdevMdev {
                uuid: doc.attr(address, "uuid")?.to_string(),
            })
        }
        other => {
            warn!(kind = other, "unrecognized hostdev type");
            None
        }
    }
}

fn memory_kib(doc: &XmlDocument, el: NodeId) -> Option<u64> {
    let value: u64 = doc.text(el).trim().parse().ok()?;
    let unit = doc.attr(el, "unit").unwrap_or("KiB");
    let bytes_per_unit: u64 = match unit {
        "b" | "bytes" => 1,
        "KB" => 1000,
        "k" | "K" | "KiB" => 1 << 10,
        "MB" => 1_000_000,
        "M" | "MiB" => 1 << 20,
        "GB" => 1_000_000_000,
        "G" | "GiB" => 1 << 30,
        "TB" => 1_000_000_000_000,
        "T" | "TiB" => 1 << 40,
        other => {
            warn!(unit = other, "unrecognized memory unit");
            return None;
        }
    };
    Some(value.saturating_mul(bytes_per_unit) / 1024)
}

fn find_devices(doc: &XmlDocument) -> Result<NodeId> {
    doc.find(doc.root(), "devices")
        .ok_or_else(|| XmlError::Structure("domain document has no devices element".into()))
}

fn find_disk(doc: &XmlDocument, devices: NodeId, target: &str) -> Option<NodeId> {
    doc.find_all(devices, "disk").into_iter().find(|&disk| {
        doc.find(disk, "target")
            .and_then(|el| doc.attr(el, "dev"))
            .is_some_and(|dev| dev == target)
    })
}

/// Change (or eject) the media of the disk with the given target name.
///
/// Only the `<source>` element is replaced; driver, target, address and any
/// other siblings stay untouched. `None` ejects the media. Returns `false`
/// when no disk has that target.
pub fn change_disk_media(
    doc: &mut XmlDocument,
    target: &str,
    source_file: Option<&str>,
) -> Result<bool> {
    let devices = find_devices(doc)?;
    let Some(disk) = find_disk(doc, devices, target) else {
        return Ok(false);
    };
    doc.remove_children(disk, "source");
    if let Some(file) = source_file {
        let source = doc.append_element(disk, "source");
        doc.set_attr(source, "file", file);
    }
    Ok(true)
}

/// Requested attribute changes for a disk. `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct DiskAttributeUpdate<'a> {
    pub readonly: Option<bool>,
    pub shareable: Option<bool>,
    pub cache: Option<&'a str>,
    pub bus_change: Option<BusChange<'a>>,
}

/// A bus reassignment. Moving a disk to another bus invalidates its device
/// addressing, so the caller supplies the next free target name for that
/// bus and the stale `<address>` element is dropped.
#[derive(Debug, Clone)]
pub struct BusChange<'a> {
    pub bus: &'a str,
    pub target: &'a str,
}

/// Apply attribute changes to the disk with the given target name.
///
/// Marker elements (`<readonly/>`, `<shareable/>`) are added or removed to
/// match the requested flags. Returns `false` when no disk has that target.
pub fn update_disk_attributes(
    doc: &mut XmlDocument,
    target: &str,
    update: &DiskAttributeUpdate<'_>,
) -> Result<bool> {
    let devices = find_devices(doc)?;
    let Some(disk) = find_disk(doc, devices, target) else {
        return Ok(false);
    };

    if let Some(readonly) = update.readonly {
        if readonly {
            doc.ensure_child(disk, "readonly");
        } else {
            doc.remove_children(disk, "readonly");
        }
    }
    if let Some(shareable) = update.shareable {
        if shareable {
            doc.ensure_child(disk, "shareable");
        } else {
            doc.remove_children(disk, "shareable");
        }
    }
    if let Some(cache) = update.cache {
        let driver = doc.ensure_child(disk, "driver");
        doc.set_attr(driver, "cache", cache);
    }
    if let Some(change) = &update.bus_change {
        let target_el = doc.ensure_child(disk, "target");
        doc.set_attr(target_el, "bus", change.bus);
        doc.set_attr(target_el, "dev", change.target);
        doc.remove_children(disk, "address");
    }
    Ok(true)
}

/// Reconcile per-device boot markers against an ordered device list.
///
/// Every device whose identity appears in `order` gets a `<boot order=../>`
/// marker carrying its 1-based position; every other device loses any
/// marker it had. When `order` is non-empty the OS-level `<boot dev=../>`
/// entries are removed as well, since device-level ordering takes
/// precedence. Re-applying the same list is a no-op.
pub fn update_boot_order(doc: &mut XmlDocument, order: &[BootOrderDevice]) -> Result<()> {
    let devices = find_devices(doc)?;

    for disk in doc.find_all(devices, "disk") {
        let identity = doc
            .find(disk, "target")
            .and_then(|el| doc.attr(el, "dev"))
            .map(|dev| BootOrderDevice::Disk {
                target: dev.to_string(),
            });
        set_boot_marker(doc, disk, position_of(order, identity.as_ref()));
    }

    for iface in doc.find_all(devices, "interface") {
        let identity = doc
            .find(iface, "mac")
            .and_then(|el| doc.attr(el, "address"))
            .map(|mac| BootOrderDevice::Interface {
                mac: mac.to_string(),
            });
        set_boot_marker(doc, iface, position_of(order, identity.as_ref()));
    }

    for hostdev in doc.find_all(devices, "hostdev") {
        let identity = hostdev_identity(doc, hostdev);
        set_boot_marker(doc, hostdev, position_of(order, identity.as_ref()));
    }

    for redirdev in doc.find_all(devices, "redirdev") {
        let identity = redirdev_port(doc, redirdev).map(|port| BootOrderDevice::Redirdev { port });
        set_boot_marker(doc, redirdev, position_of(order, identity.as_ref()));
    }

    // Device-level and OS-level boot ordering are mutually exclusive.
    if !order.is_empty() {
        if let Some(os) = doc.find(doc.root(), "os") {
            doc.remove_children(os, "boot");
        }
    }

    Ok(())
}

fn position_of(order: &[BootOrderDevice], identity: Option<&BootOrderDevice>) -> Option<usize> {
    let identity = identity?;
    order.iter().position(|entry| match (entry, identity) {
        // MAC addresses compare case-insensitively.
        (BootOrderDevice::Interface { mac: a }, BootOrderDevice::Interface { mac: b }) => {
            a.eq_ignore_ascii_case(b)
        }
        _ => entry == identity,
    })
}

fn set_boot_marker(doc: &mut XmlDocument, device: NodeId, position: Option<usize>) {
    match position {
        Some(position) => {
            let boot = doc.ensure_child(device, "boot");
            doc.set_attr(boot, "order", &(position + 1).to_string());
        }
        None => doc.remove_children(device, "boot"),
    }
}

/// Set the maximum memory of a domain, in KiB.
///
/// `currentMemory` is clamped down when it would exceed the new maximum.
/// A domain document always carries a memory element; its absence is a
/// structural error.
pub fn update_max_memory(doc: &mut XmlDocument, memory_kib: u64) -> Result<()> {
    let root = doc.root();
    let memory = doc
        .find(root, "memory")
        .ok_or_else(|| XmlError::Structure("domain document has no memory element".into()))?;
    doc.set_attr(memory, "unit", "KiB");
    doc.set_text(memory, &memory_kib.to_string());

    if let Some(current) = doc.find(root, "currentMemory") {
        let current_kib = self::memory_kib(doc, current);
        if current_kib.is_none() || current_kib > Some(memory_kib) {
            doc.set_attr(current, "unit", "KiB");
            doc.set_text(current, &memory_kib.to_string());
        }
    }
    Ok(())
}
