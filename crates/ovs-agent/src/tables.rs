//! Integration bridge table layout and rule priorities.
//!
//! Packets enter at [`LOCAL_SWITCHING`] and only ever move forward through
//! goto-table instructions; [`validate_goto`] enforces that.

use crate::error::{AgentError, AgentResult};
use ovs_bridge::{Priority, TableId};
use std::fmt;

/// Classification of every packet entering the bridge.
pub const LOCAL_SWITCHING: TableId = TableId::new(0);
/// Source-MAC rewrite for distributed routing over tunnels.
pub const DVR_TO_SRC_MAC: TableId = TableId::new(1);
/// Source-MAC rewrite for distributed routing over vlan/flat networks.
pub const DVR_TO_SRC_MAC_PHYSICAL: TableId = TableId::new(2);
/// Placeholder for security groups; its drop rule doubles as a canary.
pub const CANARY_TABLE: TableId = TableId::new(23);
pub const ARP_SPOOF_TABLE: TableId = TableId::new(24);
pub const MAC_SPOOF_TABLE: TableId = TableId::new(25);
/// Normal L2 forwarding.
pub const TRANSIENT_TABLE: TableId = TableId::new(60);
pub const TRANSIENT_EGRESS_TABLE: TableId = TableId::new(62);
pub const DHCP_IPV4_TABLE: TableId = TableId::new(77);
pub const DHCP_IPV6_TABLE: TableId = TableId::new(78);

/// All pipeline tables in pipeline order.
pub const PIPELINE: [TableId; 10] = [
    LOCAL_SWITCHING,
    DVR_TO_SRC_MAC,
    DVR_TO_SRC_MAC_PHYSICAL,
    CANARY_TABLE,
    ARP_SPOOF_TABLE,
    MAC_SPOOF_TABLE,
    TRANSIENT_TABLE,
    TRANSIENT_EGRESS_TABLE,
    DHCP_IPV4_TABLE,
    DHCP_IPV6_TABLE,
];

pub mod priority {
    use ovs_bridge::Priority;

    pub const TABLE_MISS: Priority = 0;
    pub const DVR_TUNNEL_MAC: Priority = 2;
    pub const ANTI_SPOOF_ALLOW: Priority = 2;
    pub const LOCAL_VLAN: Priority = 3;
    pub const NORMAL_FORWARDING: Priority = 3;
    pub const DVR_PHYSICAL_MAC: Priority = 4;
    pub const DVR_DST_MAC_FOR_ARP: Priority = 5;
    pub const ANTI_SPOOF_DIVERT: Priority = 10;
    pub const DVR_TO_SRC_MAC: Priority = 20;
    pub const DHCP_INTERCEPT: Priority = 101;
    pub const DEAD_VLAN: Priority = 65535;
    pub const DSCP_MARKING: Priority = 65535;
}

/// Role of a pipeline table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableRole {
    Classification,
    DvrTunnel,
    DvrPhysical,
    SecurityGroupPlaceholder,
    AntiSpoof,
    AntiSpoofContinuation,
    Forwarding,
    TransientEgress,
    DhcpV4,
    DhcpV6,
}

impl TableRole {
    pub fn of(table: TableId) -> Option<Self> {
        let role = match table {
            LOCAL_SWITCHING => TableRole::Classification,
            DVR_TO_SRC_MAC => TableRole::DvrTunnel,
            DVR_TO_SRC_MAC_PHYSICAL => TableRole::DvrPhysical,
            CANARY_TABLE => TableRole::SecurityGroupPlaceholder,
            ARP_SPOOF_TABLE => TableRole::AntiSpoof,
            MAC_SPOOF_TABLE => TableRole::AntiSpoofContinuation,
            TRANSIENT_TABLE => TableRole::Forwarding,
            TRANSIENT_EGRESS_TABLE => TableRole::TransientEgress,
            DHCP_IPV4_TABLE => TableRole::DhcpV4,
            DHCP_IPV6_TABLE => TableRole::DhcpV6,
            _ => return None,
        };
        Some(role)
    }

    pub fn table(&self) -> TableId {
        match self {
            TableRole::Classification => LOCAL_SWITCHING,
            TableRole::DvrTunnel => DVR_TO_SRC_MAC,
            TableRole::DvrPhysical => DVR_TO_SRC_MAC_PHYSICAL,
            TableRole::SecurityGroupPlaceholder => CANARY_TABLE,
            TableRole::AntiSpoof => ARP_SPOOF_TABLE,
            TableRole::AntiSpoofContinuation => MAC_SPOOF_TABLE,
            TableRole::Forwarding => TRANSIENT_TABLE,
            TableRole::TransientEgress => TRANSIENT_EGRESS_TABLE,
            TableRole::DhcpV4 => DHCP_IPV4_TABLE,
            TableRole::DhcpV6 => DHCP_IPV6_TABLE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TableRole::Classification => "classification",
            TableRole::DvrTunnel => "dvr-tunnel",
            TableRole::DvrPhysical => "dvr-physical",
            TableRole::SecurityGroupPlaceholder => "security-group-placeholder",
            TableRole::AntiSpoof => "anti-spoof",
            TableRole::AntiSpoofContinuation => "anti-spoof-continuation",
            TableRole::Forwarding => "forwarding",
            TableRole::TransientEgress => "transient-egress",
            TableRole::DhcpV4 => "dhcpv4",
            TableRole::DhcpV6 => "dhcpv6",
        }
    }
}

impl fmt::Display for TableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A goto from `from` must land on a known, later table.
pub fn validate_goto(from: TableId, to: TableId) -> AgentResult<()> {
    if to > from && TableRole::of(to).is_some() {
        Ok(())
    } else {
        Err(AgentError::InvalidGoto { from, to })
    }
}

/// Highest priority a rule may carry.
pub const MAX_PRIORITY: Priority = Priority::MAX;
