//! Switch port numbers and tenant network types.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OpenFlow port number of a bridge port (`ofport`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortNumber(u32);

impl PortNumber {
    pub const fn new(ofport: u32) -> Self {
        PortNumber(ofport)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PortNumber {
    fn from(ofport: u32) -> Self {
        PortNumber(ofport)
    }
}

/// Tenant network type of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Vxlan,
    Gre,
    Geneve,
    Vlan,
    Flat,
    Local,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Vxlan => "vxlan",
            NetworkType::Gre => "gre",
            NetworkType::Geneve => "geneve",
            NetworkType::Vlan => "vlan",
            NetworkType::Flat => "flat",
            NetworkType::Local => "local",
        }
    }

    /// Overlay types carried over tunnel ports.
    pub fn is_tunnel(&self) -> bool {
        matches!(self, NetworkType::Vxlan | NetworkType::Gre | NetworkType::Geneve)
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vxlan" => Ok(NetworkType::Vxlan),
            "gre" => Ok(NetworkType::Gre),
            "geneve" => Ok(NetworkType::Geneve),
            "vlan" => Ok(NetworkType::Vlan),
            "flat" => Ok(NetworkType::Flat),
            "local" => Ok(NetworkType::Local),
            _ => Err(ParseError::InvalidNetworkType(s.to_string())),
        }
    }
}
