//! Pipeline skeleton: table-miss behaviour, DHCP interception, dead VLAN.

use super::IntegrationBridge;
use crate::error::AgentResult;
use crate::tables::{self, priority};
use ovs_bridge::{Action, Bridge, FlowFilter, FlowMatch};
use ovs_types::proto::{ether_types, in_proto, udp_ports};
use ovs_types::VlanVid;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};
use tracing::info;

/// All-DHCPv6-servers-and-relays multicast group.
const DHCPV6_SERVERS: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0x1, 0x2);

/// Which optional pipeline branches to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultTableOptions {
    /// Divert DHCPv4 discovery to [`tables::DHCP_IPV4_TABLE`].
    pub enable_openflow_dhcp: bool,
    /// Divert DHCPv6 solicits to [`tables::DHCP_IPV6_TABLE`].
    pub enable_dhcpv6: bool,
}

impl Default for DefaultTableOptions {
    fn default() -> Self {
        Self {
            enable_openflow_dhcp: true,
            enable_dhcpv6: true,
        }
    }
}

fn dhcpv4_match() -> FlowMatch {
    FlowMatch::new()
        .eth_type(ether_types::ETH_TYPE_IP)
        .ip_proto(in_proto::IPPROTO_UDP)
        .ipv4_dst(Ipv4Addr::BROADCAST)
        .udp_dst(udp_ports::DHCP_SERVER)
        .udp_src(udp_ports::DHCP_CLIENT)
}

fn dhcpv6_match() -> FlowMatch {
    FlowMatch::new()
        .eth_type(ether_types::ETH_TYPE_IPV6)
        .ip_proto(in_proto::IPPROTO_UDP)
        .ipv6_dst(DHCPV6_SERVERS)
        .udp_dst(udp_ports::DHCPV6_SERVER)
        .udp_src(udp_ports::DHCPV6_CLIENT)
}

impl<B: Bridge> IntegrationBridge<B> {
    /// Installs the base rules every other program builds on.
    pub fn setup_default_table(&mut self, options: DefaultTableOptions) -> AgentResult<()> {
        let canary = self.flow(tables::CANARY_TABLE, priority::TABLE_MISS, FlowMatch::new());
        self.install(canary)?;

        let to_forwarding = self
            .flow(tables::LOCAL_SWITCHING, priority::TABLE_MISS, FlowMatch::new())
            .goto_table(tables::TRANSIENT_TABLE);
        self.install(to_forwarding)?;

        let normal = self
            .flow(tables::TRANSIENT_TABLE, priority::NORMAL_FORWARDING, FlowMatch::new())
            .apply_actions(vec![Action::normal()]);
        self.install(normal)?;

        if options.enable_openflow_dhcp {
            let divert = self
                .flow(tables::TRANSIENT_TABLE, priority::DHCP_INTERCEPT, dhcpv4_match())
                .goto_table(tables::DHCP_IPV4_TABLE);
            self.install(divert)?;
            let miss = self.flow(tables::DHCP_IPV4_TABLE, priority::TABLE_MISS, FlowMatch::new());
            self.install(miss)?;
        }

        if options.enable_dhcpv6 {
            let divert = self
                .flow(tables::TRANSIENT_TABLE, priority::DHCP_INTERCEPT, dhcpv6_match())
                .goto_table(tables::DHCP_IPV6_TABLE);
            self.install(divert)?;
            let miss = self.flow(tables::DHCP_IPV6_TABLE, priority::TABLE_MISS, FlowMatch::new());
            self.install(miss)?;
        }

        let spoof_miss = self.flow(tables::ARP_SPOOF_TABLE, priority::TABLE_MISS, FlowMatch::new());
        self.install(spoof_miss)?;

        let dead_vlan = self.flow(
            tables::LOCAL_SWITCHING,
            priority::DEAD_VLAN,
            FlowMatch::new().vlan_vid(VlanVid::DEAD),
        );
        self.install(dead_vlan)?;

        let egress_normal = self
            .flow(
                tables::TRANSIENT_EGRESS_TABLE,
                priority::NORMAL_FORWARDING,
                FlowMatch::new(),
            )
            .apply_actions(vec![Action::normal()]);
        self.install(egress_normal)
    }

    /// Drops every rule carrying the agent cookie and rebuilds the skeleton.
    pub fn reset_pipeline(&mut self, options: DefaultTableOptions) -> AgentResult<()> {
        let cookie = self.bridge.default_cookie();
        info!(bridge = self.bridge.bridge_name(), %cookie, "resetting pipeline");
        self.uninstall(FlowFilter::by_cookie(cookie))?;
        self.setup_default_table(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovs_agent_test::{BridgeCall, FlowVerifier, RecordingBridge, TEST_COOKIE};
    use ovs_bridge::{Flow, FlowApi, TableId};
    use pretty_assertions::assert_eq;

    fn installed(recorder: &RecordingBridge) -> Vec<(TableId, u16)> {
        recorder
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                BridgeCall::InstallFlow(flow) => Some((flow.table, flow.priority)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_full_default_table_order() {
        let recorder = RecordingBridge::new();
        let mut br = IntegrationBridge::new(recorder.clone());

        br.setup_default_table(DefaultTableOptions::default()).unwrap();

        assert_eq!(
            installed(&recorder),
            vec![
                (tables::CANARY_TABLE, 0),
                (tables::LOCAL_SWITCHING, 0),
                (tables::TRANSIENT_TABLE, 3),
                (tables::TRANSIENT_TABLE, 101),
                (tables::DHCP_IPV4_TABLE, 0),
                (tables::TRANSIENT_TABLE, 101),
                (tables::DHCP_IPV6_TABLE, 0),
                (tables::ARP_SPOOF_TABLE, 0),
                (tables::LOCAL_SWITCHING, 65535),
                (tables::TRANSIENT_EGRESS_TABLE, 3),
            ]
        );
    }

    #[test]
    fn test_dhcp_branches_follow_options() {
        let recorder = RecordingBridge::new();
        let mut br = IntegrationBridge::new(recorder.clone());

        br.setup_default_table(DefaultTableOptions {
            enable_openflow_dhcp: false,
            enable_dhcpv6: true,
        })
        .unwrap();

        let flows = recorder.flows();
        let verifier = FlowVerifier::new(&flows);
        verifier.assert_table_count(tables::DHCP_IPV4_TABLE, 0).unwrap();
        verifier.assert_table_count(tables::DHCP_IPV6_TABLE, 1).unwrap();
        let divert = verifier
            .assert_flow(tables::TRANSIENT_TABLE, 101, &dhcpv6_match())
            .unwrap();
        assert_eq!(divert.goto_target(), Some(tables::DHCP_IPV6_TABLE));
    }

    #[test]
    fn test_dhcpv4_divert_match() {
        let recorder = RecordingBridge::new();
        let mut br = IntegrationBridge::new(recorder.clone());
        br.setup_default_table(DefaultTableOptions::default()).unwrap();

        let expected = FlowMatch {
            eth_type: Some(0x0800),
            ip_proto: Some(17),
            ipv4_dst: Some(Ipv4Addr::new(255, 255, 255, 255)),
            udp_dst: Some(67),
            udp_src: Some(68),
            ..FlowMatch::default()
        };
        let flows = recorder.flows();
        let divert = FlowVerifier::new(&flows)
            .assert_flow(tables::TRANSIENT_TABLE, 101, &expected)
            .unwrap();
        assert_eq!(divert.goto_target(), Some(tables::DHCP_IPV4_TABLE));
    }

    #[test]
    fn test_dead_vlan_drop() {
        let recorder = RecordingBridge::new();
        let mut br = IntegrationBridge::new(recorder.clone());
        br.setup_default_table(DefaultTableOptions::default()).unwrap();

        let flows = recorder.flows();
        let dead = FlowVerifier::new(&flows)
            .assert_flow(
                tables::LOCAL_SWITCHING,
                65535,
                &FlowMatch::new().vlan_vid(VlanVid::tagged(4095).unwrap()),
            )
            .unwrap();
        assert!(dead.is_drop());
        assert_eq!(dead.cookie, TEST_COOKIE);
    }

    #[test]
    fn test_reset_removes_only_agent_rules() {
        let recorder = RecordingBridge::new();
        let mut foreign = recorder.clone();
        foreign
            .install_flow(Flow::new(
                ovs_bridge::Cookie::new(1),
                tables::MAC_SPOOF_TABLE,
                7,
                FlowMatch::new(),
            ))
            .unwrap();

        let mut br = IntegrationBridge::new(recorder.clone());
        br.setup_default_table(DefaultTableOptions::default()).unwrap();
        let stale = br
            .flow(tables::ARP_SPOOF_TABLE, 2, FlowMatch::new().arp_spa(Ipv4Addr::LOCALHOST))
            .goto_table(tables::MAC_SPOOF_TABLE);
        br.install(stale).unwrap();

        br.reset_pipeline(DefaultTableOptions::default()).unwrap();

        let flows = recorder.flows();
        let verifier = FlowVerifier::new(&flows);
        verifier.assert_table_count(tables::ARP_SPOOF_TABLE, 1).unwrap();
        verifier.assert_table_count(tables::MAC_SPOOF_TABLE, 1).unwrap();
        assert_eq!(flows.len(), 11);
    }
}
