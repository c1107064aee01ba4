//! CIDR parsing for firewall rule networks

use ipnetwork::IpNetwork;

use crate::error::{Error, Result};

/// Parse a CIDR block and normalise it to its network address.
///
/// A prefix length is mandatory: `"10.0.0.1"` is rejected rather than read
/// as a /32.
pub fn parse_network(raw: &str) -> Result<IpNetwork> {
    if !raw.contains('/') {
        return Err(Error::Parse(format!(
            "error parsing {:?} as a CIDR block: missing prefix length",
            raw
        )));
    }

    let net: IpNetwork = raw
        .parse()
        .map_err(|e| Error::Parse(format!("error parsing {:?} as a CIDR block: {}", raw, e)))?;

    IpNetwork::new(net.network(), net.prefix())
        .map_err(|e| Error::Parse(format!("error parsing {:?} as a CIDR block: {}", raw, e)))
}

/// Rebuild a network from the API's split `subnet` / `subnet_size` fields.
///
/// The API leaves `subnet` empty for rules that match any address.
pub fn network_from_parts(subnet: &str, size: u8, v6: bool) -> Result<IpNetwork> {
    if subnet.is_empty() {
        let any = if v6 { "::/0" } else { "0.0.0.0/0" };
        return parse_network(any);
    }
    parse_network(&format!("{}/{}", subnet, size))
}
