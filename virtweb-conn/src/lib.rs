//! # virtweb Conn
//!
//! The remote API boundary of the console: an async trait over the
//! hypervisor connection, the lifecycle event type consumers reconcile
//! against, and an in-memory mock implementation for tests and
//! development without a hypervisor.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use virtweb_conn::{Connection, MockConnection};
//!
//! #[tokio::main]
//! async fn main() {
//!     let conn = MockConnection::new();
//!     let name = conn
//!         .define_network("<network><name>lan0</name></network>")
//!         .await
//!         .unwrap();
//!     let xml = conn.network_xml(&name).await.unwrap();
//! }
//! ```

pub mod error;
pub mod mock;
pub mod traits;

pub use error::ConnectionError;
pub use mock::MockConnection;
pub use traits::{Connection, Lifecycle, ResourceEvent, ResourceKind};
