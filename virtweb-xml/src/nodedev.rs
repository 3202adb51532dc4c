//! Node device documents.
//!
//! Node devices are read-only from the console's point of view; the parse
//! record exists so host devices can be offered for passthrough and matched
//! against a domain's hostdev entries.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::document::{NodeId, XmlDocument};
use crate::error::{Result, XmlError};

/// Parsed node device description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeDeviceDef {
    pub name: Option<String>,
    pub parent: Option<String>,
    pub capability: Option<NodeDeviceCapability>,
}

/// Type-specific capability payload of a node device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeDeviceCapability {
    UsbDevice {
        bus: Option<String>,
        device: Option<String>,
        vendor_id: Option<String>,
        vendor_name: Option<String>,
        product_id: Option<String>,
        product_name: Option<String>,
    },
    Pci {
        domain: Option<String>,
        bus: Option<String>,
        slot: Option<String>,
        function: Option<String>,
        vendor_name: Option<String>,
        product_name: Option<String>,
    },
    Scsi {
        host: Option<String>,
        bus: Option<String>,
        target: Option<String>,
        lun: Option<String>,
    },
    ScsiHost {
        host: Option<String>,
        unique_id: Option<String>,
    },
    Net {
        interface: Option<String>,
        address: Option<String>,
    },
    Mdev {
        mdev_type: Option<String>,
        uuid: Option<String>,
    },
    Storage {
        block: Option<String>,
        drive_type: Option<String>,
    },
}

impl NodeDeviceDef {
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = XmlDocument::parse(xml)?;
        let root = doc.root();
        if doc.name(root) != "device" {
            return Err(XmlError::Structure(format!(
                "expected device document, got <{}>",
                doc.name(root)
            )));
        }

        let capability = match doc.find(root, "capability") {
            Some(cap) => parse_capability(&doc, cap),
            None => {
                warn!("node device document has no capability element");
                None
            }
        };

        Ok(Self {
            name: doc.find(root, "name").map(|el| doc.text(el).trim().to_string()),
            parent: doc.find(root, "parent").map(|el| doc.text(el).trim().to_string()),
            capability,
        })
    }
}

fn parse_capability(doc: &XmlDocument, cap: NodeId) -> Option<NodeDeviceCapability> {
    let text_of = |name: &str| {
        doc.find(cap, name)
            .map(|el| doc.text(el).trim().to_string())
    };
    match doc.attr(cap, "type")? {
        "usb_device" => {
            let id_and_name = |name: &str| match doc.find(cap, name) {
                Some(el) => (
                    doc.attr(el, "id").map(str::to_string),
                    Some(doc.text(el).trim().to_string()).filter(|s| !s.is_empty()),
                ),
                None => (None, None),
            };
            let (vendor_id, vendor_name) = id_and_name("vendor");
            let (product_id, product_name) = id_and_name("product");
            Some(NodeDeviceCapability::UsbDevice {
                bus: text_of("bus"),
                device: text_of("device"),
                vendor_id,
                vendor_name,
                product_id,
                product_name,
            })
        }
        "pci" => Some(NodeDeviceCapability::Pci {
            domain: text_of("domain"),
            bus: text_of("bus"),
            slot: text_of("slot"),
            function: text_of("function"),
            vendor_name: doc
                .find(cap, "vendor")
                .map(|el| doc.text(el).trim().to_string()),
            product_name: doc
                .find(cap, "product")
                .map(|el| doc.text(el).trim().to_string()),
        }),
        "scsi" => Some(NodeDeviceCapability::Scsi {
            host: text_of("host"),
            bus: text_of("bus"),
            target: text_of("target"),
            lun: text_of("lun"),
        }),
        "scsi_host" => Some(NodeDeviceCapability::ScsiHost {
            host: text_of("host"),
            unique_id: text_of("unique_id"),
        }),
        "net" => Some(NodeDeviceCapability::Net {
            interface: text_of("interface"),
            address: text_of("address"),
        }),
        "mdev" => Some(NodeDeviceCapability::Mdev {
            mdev_type: doc
                .find(cap, "type")
                .and_then(|el| doc.attr(el, "id").map(str::to_string)),
            uuid: text_of("uuid"),
        }),
        "storage" => Some(NodeDeviceCapability::Storage {
            block: text_of("block"),
            drive_type: text_of("drive_type"),
        }),
        other => {
            warn!(capability = other, "unrecognized node device capability");
            None
        }
    }
}
