//! # virtweb Common
//!
//! Shared utilities for the virtweb console components.
//!
//! Currently this only covers logging initialization; every other concern
//! lives in the crate that owns it.

pub mod logging;

pub use logging::{init_logging, init_logging_json};
