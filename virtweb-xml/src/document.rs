//! Owned XML tree with surgical mutation.
//!
//! Configuration documents are edited in place: an update touches only the
//! elements it is responsible for and everything else round-trips verbatim.
//! The tree is arena-style: `XmlDocument` owns every node and callers hold
//! `NodeId` indices into it, so there is never shared ownership of a
//! subtree. Serialization is a pure function from the tree to a string.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Result, XmlError};

/// Index of a node inside its owning [`XmlDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum Node {
    Element {
        name: String,
        attrs: Vec<(String, String)>,
        children: Vec<NodeId>,
    },
    Text(String),
    Comment(String),
}

/// An owned XML document tree.
#[derive(Debug, Clone)]
pub struct XmlDocument {
    nodes: Vec<Node>,
    root: NodeId,
}

impl XmlDocument {
    /// Create an empty document with a single root element.
    pub fn new(root_name: &str) -> Self {
        Self {
            nodes: vec![Node::Element {
                name: root_name.to_string(),
                attrs: Vec::new(),
                children: Vec::new(),
            }],
            root: NodeId(0),
        }
    }

    /// Parse a document from its string form.
    ///
    /// Whitespace, comments and elements this crate does not manage are all
    /// kept in the tree, so `parse` followed by [`XmlDocument::to_xml`]
    /// loses nothing. Declarations and processing instructions are dropped;
    /// the hypervisor never emits them for configuration documents.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut nodes: Vec<Node> = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut root: Option<NodeId> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| XmlError::Parse(e.to_string()))?;
            match event {
                Event::Start(ref e) => {
                    let id = push_element(&mut nodes, e)?;
                    attach(&mut nodes, &stack, &mut root, id)?;
                    stack.push(id);
                }
                Event::Empty(ref e) => {
                    let id = push_element(&mut nodes, e)?;
                    attach(&mut nodes, &stack, &mut root, id)?;
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map_err(|e| XmlError::Parse(e.to_string()))?
                        .into_owned();
                    // Text outside the root element carries no content.
                    if let Some(&parent) = stack.last() {
                        let id = NodeId(nodes.len());
                        nodes.push(Node::Text(text));
                        children_mut(&mut nodes, parent).push(id);
                    }
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    if let Some(&parent) = stack.last() {
                        let id = NodeId(nodes.len());
                        nodes.push(Node::Text(text));
                        children_mut(&mut nodes, parent).push(id);
                    }
                }
                Event::Comment(e) => {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    if let Some(&parent) = stack.last() {
                        let id = NodeId(nodes.len());
                        nodes.push(Node::Comment(text));
                        children_mut(&mut nodes, parent).push(id);
                    }
                }
                Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
                Event::Eof => break,
            }
        }

        let root = root.ok_or_else(|| XmlError::Parse("document has no root element".into()))?;
        Ok(Self { nodes, root })
    }

    /// The root element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Element name. Empty for non-element nodes, which the element-walking
    /// accessors never hand out.
    pub fn name(&self, id: NodeId) -> &str {
        match &self.nodes[id.0] {
            Node::Element { name, .. } => name,
            _ => "",
        }
    }

    /// Attribute value, if present.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id.0] {
            Node::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    /// Set (or add) an attribute, keeping existing attribute order.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Node::Element { attrs, .. } = &mut self.nodes[id.0] {
            if let Some(entry) = attrs.iter_mut().find(|(key, _)| key == name) {
                entry.1 = value.to_string();
            } else {
                attrs.push((name.to_string(), value.to_string()));
            }
        }
    }

    /// Remove an attribute if present.
    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Node::Element { attrs, .. } = &mut self.nodes[id.0] {
            attrs.retain(|(key, _)| key != name);
        }
    }

    /// Child elements, in document order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match &self.nodes[id.0] {
            Node::Element { children, .. } => children
                .iter()
                .copied()
                .filter(|child| matches!(self.nodes[child.0], Node::Element { .. }))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// First child element with the given name.
    pub fn find(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children(id)
            .into_iter()
            .find(|&child| self.name(child) == name)
    }

    /// All child elements with the given name, in document order.
    pub fn find_all(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        self.children(id)
            .into_iter()
            .filter(|&child| self.name(child) == name)
            .collect()
    }

    /// Concatenated text content of an element's direct text children.
    pub fn text(&self, id: NodeId) -> String {
        match &self.nodes[id.0] {
            Node::Element { children, .. } => children
                .iter()
                .filter_map(|child| match &self.nodes[child.0] {
                    Node::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
            _ => String::new(),
        }
    }

    /// Replace an element's content with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        let text_id = NodeId(self.nodes.len());
        self.nodes.push(Node::Text(text.to_string()));
        if let Node::Element { children, .. } = &mut self.nodes[id.0] {
            children.clear();
            children.push(text_id);
        }
    }

    /// Append a new child element and return its id.
    pub fn append_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::Element {
            name: name.to_string(),
            attrs: Vec::new(),
            children: Vec::new(),
        });
        if let Node::Element { children, .. } = &mut self.nodes[parent.0] {
            children.push(id);
        }
        id
    }

    /// First child element with the given name, created if absent.
    pub fn ensure_child(&mut self, parent: NodeId, name: &str) -> NodeId {
        match self.find(parent, name) {
            Some(id) => id,
            None => self.append_element(parent, name),
        }
    }

    /// Detach a child node from its parent. Returns whether it was present.
    ///
    /// The node stays allocated in the arena but is no longer reachable and
    /// will not be serialized.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if let Node::Element { children, .. } = &mut self.nodes[parent.0] {
            let before = children.len();
            children.retain(|&c| c != child);
            return children.len() != before;
        }
        false
    }

    /// Detach every child element with the given name.
    pub fn remove_children(&mut self, parent: NodeId, name: &str) {
        let stale = self.find_all(parent, name);
        if stale.is_empty() {
            return;
        }
        if let Node::Element { children, .. } = &mut self.nodes[parent.0] {
            children.retain(|child| !stale.contains(child));
        }
    }

    /// Serialize the tree back to a string.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_node(&mut writer, self.root)?;
        String::from_utf8(writer.into_inner()).map_err(|e| XmlError::Serialize(e.to_string()))
    }

    fn write_node(&self, writer: &mut Writer<Vec<u8>>, id: NodeId) -> Result<()> {
        match &self.nodes[id.0] {
            Node::Element {
                name,
                attrs,
                children,
            } => {
                let mut start = BytesStart::new(name.as_str());
                for (key, value) in attrs {
                    start.push_attribute((key.as_str(), value.as_str()));
                }
                if children.is_empty() {
                    writer
                        .write_event(Event::Empty(start))
                        .map_err(|e| XmlError::Serialize(e.to_string()))?;
                } else {
                    writer
                        .write_event(Event::Start(start))
                        .map_err(|e| XmlError::Serialize(e.to_string()))?;
                    for &child in children {
                        self.write_node(writer, child)?;
                    }
                    writer
                        .write_event(Event::End(BytesEnd::new(name.as_str())))
                        .map_err(|e| XmlError::Serialize(e.to_string()))?;
                }
            }
            Node::Text(text) => {
                writer
                    .write_event(Event::Text(BytesText::new(text)))
                    .map_err(|e| XmlError::Serialize(e.to_string()))?;
            }
            Node::Comment(text) => {
                writer
                    .write_event(Event::Comment(BytesText::from_escaped(text.as_str())))
                    .map_err(|e| XmlError::Serialize(e.to_string()))?;
            }
        }
        Ok(())
    }
}

fn push_element(nodes: &mut Vec<Node>, start: &BytesStart<'_>) -> Result<NodeId> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Parse(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Parse(e.to_string()))?
            .into_owned();
        attrs.push((key, value));
    }
    let id = NodeId(nodes.len());
    nodes.push(Node::Element {
        name,
        attrs,
        children: Vec::new(),
    });
    Ok(id)
}

fn attach(
    nodes: &mut [Node],
    stack: &[NodeId],
    root: &mut Option<NodeId>,
    id: NodeId,
) -> Result<()> {
    match stack.last() {
        Some(&parent) => {
            children_mut(nodes, parent).push(id);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(id);
            Ok(())
        }
        None => Err(XmlError::Parse(
            "document has more than one root element".into(),
        )),
    }
}

fn children_mut(nodes: &mut [Node], parent: NodeId) -> &mut Vec<NodeId> {
    match &mut nodes[parent.0] {
        Node::Element { children, .. } => children,
        // Parents always come off the element stack.
        _ => unreachable!("text node on element stack"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_navigate() {
        let doc = XmlDocument::parse(
            "<network><name>default</name><ip address='10.0.0.1' netmask='255.255.255.0'/></network>",
        )
        .unwrap();
        let root = doc.root();
        assert_eq!(doc.name(root), "network");
        let name = doc.find(root, "name").unwrap();
        assert_eq!(doc.text(name), "default");
        let ip = doc.find(root, "ip").unwrap();
        assert_eq!(doc.attr(ip, "address"), Some("10.0.0.1"));
        assert_eq!(doc.attr(ip, "missing"), None);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(XmlDocument::parse("").is_err());
        assert!(XmlDocument::parse("<a><b></a>").is_err());
        assert!(XmlDocument::parse("no markup at all").is_err());
    }

    #[test]
    fn test_round_trip_preserves_unmanaged_content() {
        let xml = "<network connections=\"1\">\n  <name>default</name>\n  \
                   <!-- assigned by the hypervisor -->\n  <bandwidth><inbound average=\"1000\"/></bandwidth>\n\
                   </network>";
        let doc = XmlDocument::parse(xml).unwrap();
        assert_eq!(doc.to_xml().unwrap(), xml);
    }

    #[test]
    fn test_mutation_is_surgical() {
        let xml = r#"<network><name>old</name><bridge name="virbr0"/></network>"#;
        let mut doc = XmlDocument::parse(xml).unwrap();
        let name = doc.find(doc.root(), "name").unwrap();
        doc.set_text(name, "new");
        assert_eq!(
            doc.to_xml().unwrap(),
            r#"<network><name>new</name><bridge name="virbr0"/></network>"#
        );
    }

    #[test]
    fn test_attr_updates() {
        let mut doc = XmlDocument::parse("<ip address='10.0.0.1' family='ipv4'/>").unwrap();
        let root = doc.root();
        doc.set_attr(root, "address", "10.0.0.2");
        doc.set_attr(root, "prefix", "24");
        doc.remove_attr(root, "family");
        let out = doc.to_xml().unwrap();
        assert_eq!(out, r#"<ip address="10.0.0.2" prefix="24"/>"#);
    }

    #[test]
    fn test_append_and_remove() {
        let mut doc = XmlDocument::new("domain");
        let root = doc.root();
        let devices = doc.append_element(root, "devices");
        let disk = doc.append_element(devices, "disk");
        doc.set_attr(disk, "device", "cdrom");
        assert_eq!(doc.to_xml().unwrap(), r#"<domain><devices><disk device="cdrom"/></devices></domain>"#);

        assert!(doc.remove_child(devices, disk));
        assert!(!doc.remove_child(devices, disk));
        assert_eq!(doc.to_xml().unwrap(), "<domain><devices/></domain>");
    }

    #[test]
    fn test_ensure_child() {
        let mut doc = XmlDocument::new("disk");
        let root = doc.root();
        let first = doc.ensure_child(root, "boot");
        let second = doc.ensure_child(root, "boot");
        assert_eq!(first, second);
        assert_eq!(doc.find_all(root, "boot").len(), 1);
    }

    #[test]
    fn test_escaping_round_trip() {
        let mut doc = XmlDocument::new("network");
        let root = doc.root();
        let name = doc.append_element(root, "name");
        doc.set_text(name, "a<b>&c");
        let out = doc.to_xml().unwrap();
        assert!(out.contains("a&lt;b&gt;&amp;c"));
        let parsed = XmlDocument::parse(&out).unwrap();
        let name = parsed.find(parsed.root(), "name").unwrap();
        assert_eq!(parsed.text(name), "a<b>&c");
    }
}
