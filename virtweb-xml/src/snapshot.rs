//! Domain snapshot documents.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::document::XmlDocument;
use crate::error::{Result, XmlError};

/// Parsed domain snapshot description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotDef {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Domain state at snapshot time ("running", "shutoff", ...).
    pub state: Option<String>,
    pub parent: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
    /// Whether the snapshot includes guest memory.
    pub memory_snapshot: bool,
}

impl SnapshotDef {
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = XmlDocument::parse(xml)?;
        let root = doc.root();
        if doc.name(root) != "domainsnapshot" {
            return Err(XmlError::Structure(format!(
                "expected domainsnapshot document, got <{}>",
                doc.name(root)
            )));
        }

        let creation_time = doc.find(root, "creationTime").and_then(|el| {
            let text = doc.text(el);
            let seconds: i64 = match text.trim().parse() {
                Ok(seconds) => seconds,
                Err(_) => {
                    warn!(value = text.trim(), "unparseable snapshot creation time");
                    return None;
                }
            };
            Utc.timestamp_opt(seconds, 0).single()
        });

        let memory_snapshot = doc
            .find(root, "memory")
            .and_then(|el| doc.attr(el, "snapshot"))
            .map(|snapshot| snapshot != "no")
            .unwrap_or(false);

        Ok(Self {
            name: doc.find(root, "name").map(|el| doc.text(el).trim().to_string()),
            description: doc
                .find(root, "description")
                .map(|el| doc.text(el).trim().to_string()),
            state: doc.find(root, "state").map(|el| doc.text(el).trim().to_string()),
            parent: doc
                .find(root, "parent")
                .and_then(|parent| doc.find(parent, "name"))
                .map(|el| doc.text(el).trim().to_string()),
            creation_time,
            memory_snapshot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_snapshot() {
        let xml = r#"<domainsnapshot>
  <name>pre-upgrade</name>
  <description>before OS upgrade</description>
  <state>running</state>
  <parent>
    <name>clean-install</name>
  </parent>
  <creationTime>1756500000</creationTime>
  <memory snapshot="internal"/>
</domainsnapshot>"#;
        let snap = SnapshotDef::parse(xml).unwrap();
        assert_eq!(snap.name.as_deref(), Some("pre-upgrade"));
        assert_eq!(snap.description.as_deref(), Some("before OS upgrade"));
        assert_eq!(snap.state.as_deref(), Some("running"));
        assert_eq!(snap.parent.as_deref(), Some("clean-install"));
        assert_eq!(
            snap.creation_time,
            Utc.timestamp_opt(1756500000, 0).single()
        );
        assert!(snap.memory_snapshot);
    }

    #[test]
    fn test_parse_diskless_snapshot() {
        let xml = "<domainsnapshot><name>s1</name><memory snapshot=\"no\"/></domainsnapshot>";
        let snap = SnapshotDef::parse(xml).unwrap();
        assert!(!snap.memory_snapshot);
        assert_eq!(snap.parent, None);
        assert_eq!(snap.creation_time, None);
    }
}
