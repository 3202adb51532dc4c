//! Hypervisor connection abstraction.
//!
//! The console never talks to the hypervisor directly; it goes through
//! this trait. The real implementation lives in the host application (a
//! D-Bus client); this crate ships an in-memory mock for tests and
//! development.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::Result;

/// Which resource a lifecycle event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Network,
    StoragePool,
    Domain,
}

/// What happened to the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Defined,
    Undefined,
    Started,
    Stopped,
}

/// A hypervisor-emitted lifecycle notification.
///
/// Events may arrive in any order relative to the calls that caused them;
/// consumers re-fetch the named resource and reconcile, and reconciliation
/// must be idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEvent {
    pub kind: ResourceKind,
    pub lifecycle: Lifecycle,
    pub name: String,
}

/// Asynchronous hypervisor connection.
///
/// Every call is non-blocking from the caller's perspective; failures
/// surface as [`crate::ConnectionError`] values carrying a message. All
/// configuration payloads are document strings: this boundary neither
/// parses nor builds them.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Names of all networks defined on this connection.
    async fn list_networks(&self) -> Result<Vec<String>>;

    /// Configuration document of the named network.
    async fn network_xml(&self, name: &str) -> Result<String>;

    /// Define a network from a configuration document.
    ///
    /// Returns the network's name as the hypervisor recorded it.
    async fn define_network(&self, xml: &str) -> Result<String>;

    /// Undefine (remove) the named network.
    async fn undefine_network(&self, name: &str) -> Result<()>;

    /// Whether the named network starts automatically with the host.
    async fn network_autostart(&self, name: &str) -> Result<bool>;

    /// Set the named network's autostart flag.
    async fn set_network_autostart(&self, name: &str, autostart: bool) -> Result<()>;

    /// Configuration document of the named domain.
    async fn domain_xml(&self, name: &str) -> Result<String>;

    /// Define (or redefine) a domain from a configuration document.
    ///
    /// Returns the domain's name.
    async fn define_domain(&self, xml: &str) -> Result<String>;

    /// Subscribe to lifecycle events emitted by this connection.
    fn subscribe(&self) -> broadcast::Receiver<ResourceEvent>;
}
