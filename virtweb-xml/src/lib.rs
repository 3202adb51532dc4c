//! # virtweb XML
//!
//! The configuration document model behind the console: parse hypervisor
//! configuration documents into typed records, build new documents from
//! validated dialog parameters, and apply targeted edits to live documents
//! without disturbing anything else in them.
//!
//! ## Architecture
//!
//! ```text
//! dialog fields ──validate (virtweb-net)──▶ NetworkCreateParams
//!                                                │
//!                                          build_network_xml
//!                                                ▼
//!                                         document string ──▶ remote API
//!                                                ▲
//! XmlDocument ◀──parse── response ───────────────┘
//!      │
//!      └─ targeted updates (media, disk attributes, boot order, memory)
//! ```
//!
//! All functions take and return plain data; the surrounding application
//! owns state, subscriptions and the remote transport. Within one update
//! call the document is owned exclusively; callers re-fetch the
//! authoritative document before each mutation rather than holding a tree
//! across an asynchronous boundary.

pub mod document;
pub mod domain;
pub mod error;
pub mod network;
pub mod nodedev;
pub mod pool;
pub mod snapshot;
pub mod volume;

pub use document::{NodeId, XmlDocument};
pub use domain::{
    change_disk_media,
    update_boot_order,
    update_disk_attributes,
    update_max_memory,
    BootOrderDevice,
    BusChange,
    DiskAttributeUpdate,
    DomainDef,
    DomainDisk,
    DomainHostdev,
    DomainInterface,
    DomainRedirdev,
};
pub use error::XmlError;
pub use network::{
    add_dhcp_host,
    build_network_xml,
    remove_dhcp_host,
    DhcpHost,
    NetworkDef,
    NetworkDhcp,
    NetworkIp,
};
pub use nodedev::{NodeDeviceCapability, NodeDeviceDef};
pub use pool::{StoragePoolDef, StoragePoolSource};
pub use snapshot::SnapshotDef;
pub use volume::StorageVolumeDef;
