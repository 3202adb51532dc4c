//! Storage pool configuration documents.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::document::XmlDocument;
use crate::error::{Result, XmlError};

/// Parsed storage pool configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoragePoolDef {
    pub name: Option<String>,
    pub uuid: Option<String>,
    /// Pool type ("dir", "netfs", "logical", "iscsi", ...).
    pub pool_type: Option<String>,
    pub capacity: Option<u64>,
    pub allocation: Option<u64>,
    pub available: Option<u64>,
    pub target_path: Option<String>,
    pub source: StoragePoolSource,
}

/// Source description of a pool; which fields apply depends on the type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoragePoolSource {
    pub host: Option<String>,
    pub dir: Option<String>,
    pub device: Option<String>,
    pub name: Option<String>,
    pub format: Option<String>,
}

impl StoragePoolDef {
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = XmlDocument::parse(xml)?;
        let root = doc.root();
        if doc.name(root) != "pool" {
            return Err(XmlError::Structure(format!(
                "expected pool document, got <{}>",
                doc.name(root)
            )));
        }

        let name = doc.find(root, "name").map(|el| doc.text(el).trim().to_string());
        if name.is_none() {
            warn!("pool document has no name element");
        }

        let size = |element: &str| {
            doc.find(root, element)
                .and_then(|el| doc.text(el).trim().parse().ok())
        };

        let source = match doc.find(root, "source") {
            Some(source) => StoragePoolSource {
                host: doc
                    .find(source, "host")
                    .and_then(|el| doc.attr(el, "name").map(str::to_string)),
                dir: doc
                    .find(source, "dir")
                    .and_then(|el| doc.attr(el, "path").map(str::to_string)),
                device: doc
                    .find(source, "device")
                    .and_then(|el| doc.attr(el, "path").map(str::to_string)),
                name: doc.find(source, "name").map(|el| doc.text(el).trim().to_string()),
                format: doc
                    .find(source, "format")
                    .and_then(|el| doc.attr(el, "type").map(str::to_string)),
            },
            None => StoragePoolSource::default(),
        };

        Ok(Self {
            name,
            uuid: doc.find(root, "uuid").map(|el| doc.text(el).trim().to_string()),
            pool_type: doc.attr(root, "type").map(str::to_string),
            capacity: size("capacity"),
            allocation: size("allocation"),
            available: size("available"),
            target_path: doc
                .find(root, "target")
                .and_then(|target| doc.find(target, "path"))
                .map(|el| doc.text(el).trim().to_string()),
            source,
        })
    }
}
