//! Firewall rule port-range codec
//!
//! Rules are created with a `from:to` port string and listed back by the API
//! as `from - to`. Decoding accepts either separator.

use crate::error::{Error, Result};

/// Protocols that must carry at least a `from_port`
pub const PORT_PROTOCOLS: &[&str] = &["tcp", "udp"];

pub fn requires_ports(protocol: &str) -> bool {
    PORT_PROTOCOLS.contains(&protocol)
}

/// Build the port string sent when creating a rule.
///
/// Protocols outside [`PORT_PROTOCOLS`] never carry a port.
pub fn encode_ports(protocol: &str, from: Option<u16>, to: Option<u16>) -> Result<String> {
    if !requires_ports(protocol) {
        return Ok(String::new());
    }

    match (from, to) {
        (Some(from), Some(to)) => Ok(format!("{}:{}", from, to)),
        (Some(from), None) => Ok(from.to_string()),
        (None, _) => Err(Error::Validation(format!(
            "{:?} requires at least from_port or from_port and to_port",
            protocol
        ))),
    }
}

/// Split a port field into `(from, to)`.
///
/// `(0, 0)` means no ports. A single port decodes to `(port, 0)`. Shapes with
/// more than one separator are not understood and also decode to `(0, 0)`.
pub fn decode_ports(raw: &str) -> Result<(u16, u16)> {
    let trimmed = raw.trim();
    if raw.is_empty() || trimmed == "-" || trimmed == ":" {
        return Ok((0, 0));
    }

    let parts: Vec<&str> = raw.split(|c| c == '-' || c == ':').collect();
    match parts.as_slice() {
        [port] => Ok((parse_port(port)?, 0)),
        [from, to] => Ok((parse_port(from)?, parse_port(to)?)),
        _ => Ok((0, 0)),
    }
}

fn parse_port(raw: &str) -> Result<u16> {
    let raw = raw.trim();
    raw.parse::<u16>()
        .map_err(|e| Error::Parse(format!("invalid port {:?}: {}", raw, e)))
}
