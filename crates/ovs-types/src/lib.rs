//! Network primitives for programming an Open vSwitch integration bridge.
//!
//! - [`MacAddress`]: 48-bit Ethernet addresses
//! - [`VlanVid`]: VLAN field values with the tag-presence encoding
//! - [`PortNumber`]: OpenFlow port numbers
//! - [`NetworkType`]: tenant segment types (vxlan, vlan, flat, ...)
//! - [`proto`]: ethertype, IP protocol and ICMPv6 constants

mod ip;
mod mac;
mod port;
pub mod proto;
mod vlan;

pub use ip::{parse_ipv4_host, parse_ipv6_host};
pub use mac::MacAddress;
pub use port::{NetworkType, PortNumber};
pub use vlan::{VlanVid, MAX_VID, OFPVID_NONE, OFPVID_PRESENT};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid VLAN ID: {0} (must be 0-4095)")]
    InvalidVlanId(u16),

    #[error("invalid host address: {0}")]
    InvalidHostAddress(String),

    #[error("invalid network type: {0}")]
    InvalidNetworkType(String),
}
