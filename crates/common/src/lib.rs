//! Vultr Provider Common Library
//!
//! Shared types, errors and codecs for the Vultr block storage and firewall
//! rule resources.

pub mod error;
pub mod network;
pub mod ports;
pub mod types;

// Re-export commonly used types
pub use error::{ApiError, ApiResultExt, Error, Result, Step};
pub use network::{network_from_parts, parse_network};
pub use ports::{decode_ports, encode_ports, requires_ports};
pub use types::*;

/// Provider version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
