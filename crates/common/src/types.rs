//! Core types for Vultr block storage and firewall rules

use std::fmt;
use std::str::FromStr;

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Status reported by the API once a volume can be attached
pub const VOLUME_STATUS_ACTIVE: &str = "active";

/// Block storage volume as reported by the API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockVolume {
    pub id: String,
    pub size_gb: u64,
    pub region_id: u32,
    pub date_created: String,
    pub cost_per_month: String,
    pub status: String,
    /// Instance the volume is attached to, if any
    pub attached_id: Option<String>,
    pub label: String,
}

impl BlockVolume {
    pub fn is_active(&self) -> bool {
        self.status == VOLUME_STATUS_ACTIVE
    }

    pub fn is_attached(&self) -> bool {
        self.attached_id.as_deref().is_some_and(|id| !id.is_empty())
    }
}

/// Address family of a firewall rule's network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpType {
    V4,
    V6,
}

impl IpType {
    /// Family of a network. IPv4-mapped IPv6 networks count as v4.
    pub fn of(network: &IpNetwork) -> Self {
        match network {
            IpNetwork::V4(_) => IpType::V4,
            IpNetwork::V6(net) if net.ip().to_ipv4_mapped().is_some() => IpType::V4,
            IpNetwork::V6(_) => IpType::V6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IpType::V4 => "v4",
            IpType::V6 => "v6",
        }
    }
}

impl fmt::Display for IpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IpType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v4" => Ok(IpType::V4),
            "v6" => Ok(IpType::V6),
            other => Err(Error::Parse(format!("unknown ip type {:?}", other))),
        }
    }
}

/// Firewall rule as listed by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallRule {
    pub rule_number: u32,
    pub protocol: String,
    /// Raw port field, e.g. "22", "8000 - 9000" or ""
    pub port: String,
    pub network: IpNetwork,
    pub notes: String,
}

impl FirewallRule {
    pub fn ip_type(&self) -> IpType {
        IpType::of(&self.network)
    }
}

/// Parameters for creating a firewall rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallRuleSpec {
    pub protocol: String,
    pub port: String,
    pub network: IpNetwork,
    pub notes: String,
}

impl FirewallRuleSpec {
    pub fn ip_type(&self) -> IpType {
        IpType::of(&self.network)
    }
}
