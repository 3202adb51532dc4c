//! # virtweb Net
//!
//! IPv4/IPv6 address arithmetic and virtual network dialog validation.
//!
//! Everything in this crate is a pure function over plain data: the
//! surrounding application owns state and re-runs validation as often as
//! it likes (typically once per submit attempt).
//!
//! ## Usage
//!
//! ```rust
//! use virtweb_net::{ip, validate_network_params, NetworkCreateParams};
//!
//! assert!(ip::is_valid_ipv4("192.168.100.1"));
//!
//! let params = NetworkCreateParams::new("lan0");
//! let errors = validate_network_params(&params);
//! assert!(errors.is_empty());
//! ```

pub mod ip;
pub mod validate;

pub use validate::{
    validate_network_params,
    Field,
    ForwardMode,
    IpConfig,
    NetworkCreateParams,
    ValidationErrors,
};
