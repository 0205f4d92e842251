//! Protocol numbers used in flow matches.

/// EtherType values.
pub mod ether_types {
    pub const ETH_TYPE_IP: u16 = 0x0800;
    pub const ETH_TYPE_ARP: u16 = 0x0806;
    pub const ETH_TYPE_IPV6: u16 = 0x86dd;
}

/// IP protocol numbers.
pub mod in_proto {
    pub const IPPROTO_UDP: u8 = 17;
    pub const IPPROTO_ICMPV6: u8 = 58;
}

/// ICMPv6 message types.
pub mod icmpv6 {
    pub const ND_NEIGHBOR_ADVERT: u8 = 136;
}

/// Well-known UDP ports.
pub mod udp_ports {
    pub const DHCP_SERVER: u16 = 67;
    pub const DHCP_CLIENT: u16 = 68;
    pub const DHCPV6_CLIENT: u16 = 546;
    pub const DHCPV6_SERVER: u16 = 547;
}
