//! Storage volume configuration documents.

use serde::{Deserialize, Serialize};

use crate::document::XmlDocument;
use crate::error::{Result, XmlError};

/// Parsed storage volume configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageVolumeDef {
    pub name: Option<String>,
    pub key: Option<String>,
    pub capacity: Option<u64>,
    pub allocation: Option<u64>,
    /// Volume format ("qcow2", "raw", ...).
    pub format: Option<String>,
    pub target_path: Option<String>,
}

impl StorageVolumeDef {
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = XmlDocument::parse(xml)?;
        let root = doc.root();
        if doc.name(root) != "volume" {
            return Err(XmlError::Structure(format!(
                "expected volume document, got <{}>",
                doc.name(root)
            )));
        }

        let target = doc.find(root, "target");

        Ok(Self {
            name: doc.find(root, "name").map(|el| doc.text(el).trim().to_string()),
            key: doc.find(root, "key").map(|el| doc.text(el).trim().to_string()),
            capacity: doc
                .find(root, "capacity")
                .and_then(|el| doc.text(el).trim().parse().ok()),
            allocation: doc
                .find(root, "allocation")
                .and_then(|el| doc.text(el).trim().parse().ok()),
            format: target
                .and_then(|target| doc.find(target, "format"))
                .and_then(|el| doc.attr(el, "type").map(str::to_string)),
            target_path: target
                .and_then(|target| doc.find(target, "path"))
                .map(|el| doc.text(el).trim().to_string()),
        })
    }
}
