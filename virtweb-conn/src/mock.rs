//! In-memory mock connection for testing and development.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use virtweb_xml::{DomainDef, NetworkDef, XmlDocument};

use crate::error::{ConnectionError, Result};
use crate::traits::{Connection, Lifecycle, ResourceEvent, ResourceKind};

/// Mock hypervisor connection.
///
/// Holds configuration documents in memory and emits the same lifecycle
/// events a real connection would, so the validate → build → define →
/// read-back loop can be exercised without a hypervisor. Submitted
/// documents are parsed before being accepted, mirroring the validation
/// the hypervisor performs.
pub struct MockConnection {
    networks: RwLock<HashMap<String, MockNetwork>>,
    domains: RwLock<HashMap<String, String>>,
    events: broadcast::Sender<ResourceEvent>,
}

struct MockNetwork {
    xml: String,
    autostart: bool,
}

impl MockConnection {
    pub fn new() -> Self {
        info!("Creating mock hypervisor connection");
        let (events, _) = broadcast::channel(64);
        Self {
            networks: RwLock::new(HashMap::new()),
            domains: RwLock::new(HashMap::new()),
            events,
        }
    }

    fn emit(&self, kind: ResourceKind, lifecycle: Lifecycle, name: &str) {
        // Nobody listening is fine; events are best-effort notifications.
        let _ = self.events.send(ResourceEvent {
            kind,
            lifecycle,
            name: name.to_string(),
        });
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn list_networks(&self) -> Result<Vec<String>> {
        let networks = self
            .networks
            .read()
            .map_err(|_| ConnectionError::Internal("Lock poisoned".to_string()))?;
        let mut names: Vec<String> = networks.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn network_xml(&self, name: &str) -> Result<String> {
        let networks = self
            .networks
            .read()
            .map_err(|_| ConnectionError::Internal("Lock poisoned".to_string()))?;
        networks
            .get(name)
            .map(|network| network.xml.clone())
            .ok_or_else(|| ConnectionError::NotFound(name.to_string()))
    }

    async fn define_network(&self, xml: &str) -> Result<String> {
        // Reject documents the hypervisor would reject, and assign a UUID
        // when the submitted document carries none.
        let def = NetworkDef::parse(xml)
            .map_err(|e| ConnectionError::InvalidDocument(e.to_string()))?;
        let name = def
            .name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ConnectionError::InvalidDocument("network has no name".to_string()))?;

        let xml = if def.uuid.is_none() {
            let mut doc = XmlDocument::parse(xml)
                .map_err(|e| ConnectionError::InvalidDocument(e.to_string()))?;
            let uuid = doc.append_element(doc.root(), "uuid");
            doc.set_text(uuid, &Uuid::new_v4().to_string());
            doc.to_xml()
                .map_err(|e| ConnectionError::Internal(e.to_string()))?
        } else {
            xml.to_string()
        };

        let mut networks = self
            .networks
            .write()
            .map_err(|_| ConnectionError::Internal("Lock poisoned".to_string()))?;
        debug!(network = %name, "Defining mock network");
        networks.insert(
            name.clone(),
            MockNetwork {
                xml,
                autostart: false,
            },
        );
        drop(networks);

        self.emit(ResourceKind::Network, Lifecycle::Defined, &name);
        Ok(name)
    }

    async fn undefine_network(&self, name: &str) -> Result<()> {
        let mut networks = self
            .networks
            .write()
            .map_err(|_| ConnectionError::Internal("Lock poisoned".to_string()))?;
        if networks.remove(name).is_none() {
            return Err(ConnectionError::NotFound(name.to_string()));
        }
        drop(networks);

        self.emit(ResourceKind::Network, Lifecycle::Undefined, name);
        Ok(())
    }

    async fn network_autostart(&self, name: &str) -> Result<bool> {
        let networks = self
            .networks
            .read()
            .map_err(|_| ConnectionError::Internal("Lock poisoned".to_string()))?;
        networks
            .get(name)
            .map(|network| network.autostart)
            .ok_or_else(|| ConnectionError::NotFound(name.to_string()))
    }

    async fn set_network_autostart(&self, name: &str, autostart: bool) -> Result<()> {
        let mut networks = self
            .networks
            .write()
            .map_err(|_| ConnectionError::Internal("Lock poisoned".to_string()))?;
        let network = networks
            .get_mut(name)
            .ok_or_else(|| ConnectionError::NotFound(name.to_string()))?;
        network.autostart = autostart;
        Ok(())
    }

    async fn domain_xml(&self, name: &str) -> Result<String> {
        let domains = self
            .domains
            .read()
            .map_err(|_| ConnectionError::Internal("Lock poisoned".to_string()))?;
        domains
            .get(name)
            .cloned()
            .ok_or_else(|| ConnectionError::NotFound(name.to_string()))
    }

    async fn define_domain(&self, xml: &str) -> Result<String> {
        let def = DomainDef::parse(xml)
            .map_err(|e| ConnectionError::InvalidDocument(e.to_string()))?;
        let name = def
            .name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ConnectionError::InvalidDocument("domain has no name".to_string()))?;

        let mut domains = self
            .domains
            .write()
            .map_err(|_| ConnectionError::Internal("Lock poisoned".to_string()))?;
        debug!(domain = %name, "Defining mock domain");
        domains.insert(name.clone(), xml.to_string());
        drop(domains);

        self.emit(ResourceKind::Domain, Lifecycle::Defined, &name);
        Ok(name)
    }

    fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.events.subscribe()
    }
}
