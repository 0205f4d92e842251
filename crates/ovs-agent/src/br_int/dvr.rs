//! Distributed virtual routing: rewrite the source MAC of routed traffic to
//! the subnet gateway and steer it to the destination port.

use super::IntegrationBridge;
use crate::error::AgentResult;
use crate::tables::{self, priority};
use ovs_bridge::{Action, Bridge, FlowFilter, FlowMatch, SetField, TableId};
use ovs_types::{MacAddress, NetworkType, PortNumber, VlanVid};

/// Tunnel networks rewrite in one table, vlan/flat networks in another.
pub fn dvr_table_for(network_type: NetworkType) -> TableId {
    if network_type.is_tunnel() {
        tables::DVR_TO_SRC_MAC
    } else {
        tables::DVR_TO_SRC_MAC_PHYSICAL
    }
}

fn dvr_dst_match(vlan_tag: Option<u16>, dst_mac: MacAddress) -> AgentResult<FlowMatch> {
    Ok(FlowMatch::new()
        .eth_dst(dst_mac)
        .vlan_vid(VlanVid::from_segment(vlan_tag)?))
}

impl<B: Bridge> IntegrationBridge<B> {
    pub fn install_dvr_to_src_mac(
        &mut self,
        network_type: NetworkType,
        vlan_tag: Option<u16>,
        gateway_mac: MacAddress,
        dst_mac: MacAddress,
        dst_port: PortNumber,
    ) -> AgentResult<()> {
        let match_fields = dvr_dst_match(vlan_tag, dst_mac)?;

        let rewrite = self
            .flow(
                dvr_table_for(network_type),
                priority::DVR_TO_SRC_MAC,
                match_fields.clone(),
            )
            .apply_actions(vec![Action::set_field(SetField::EthSrc(gateway_mac))])
            .goto_table(tables::TRANSIENT_TABLE);
        self.install(rewrite)?;

        let mut actions = Vec::with_capacity(2);
        if vlan_tag.is_some() {
            actions.push(Action::PopVlan);
        }
        actions.push(Action::output(dst_port));
        let deliver = self
            .flow(tables::TRANSIENT_TABLE, priority::DVR_TO_SRC_MAC, match_fields)
            .apply_actions(actions);
        self.install(deliver)
    }

    pub fn delete_dvr_to_src_mac(
        &mut self,
        network_type: NetworkType,
        vlan_tag: Option<u16>,
        dst_mac: MacAddress,
    ) -> AgentResult<()> {
        let match_fields = dvr_dst_match(vlan_tag, dst_mac)?;
        for table in [dvr_table_for(network_type), tables::TRANSIENT_TABLE] {
            self.uninstall(FlowFilter::strict(
                table,
                priority::DVR_TO_SRC_MAC,
                match_fields.clone(),
            ))?;
        }
        Ok(())
    }

    /// Traffic from a remote DVR MAC on a physical port continues in the
    /// physical rewrite table.
    pub fn add_dvr_mac_physical(&mut self, mac: MacAddress, port: PortNumber) -> AgentResult<()> {
        let flow = self
            .flow(
                tables::LOCAL_SWITCHING,
                priority::DVR_PHYSICAL_MAC,
                FlowMatch::new().eth_src(mac).in_port(port),
            )
            .goto_table(tables::DVR_TO_SRC_MAC_PHYSICAL);
        self.install(flow)
    }

    pub fn remove_dvr_mac_vlan(&mut self, mac: MacAddress) -> AgentResult<()> {
        self.uninstall(
            FlowFilter::matching(FlowMatch::new().eth_src(mac)).in_table(tables::LOCAL_SWITCHING),
        )
    }

    pub fn add_dvr_mac_tun(&mut self, mac: MacAddress, port: PortNumber) -> AgentResult<()> {
        let flow = self
            .flow(
                tables::LOCAL_SWITCHING,
                priority::DVR_TUNNEL_MAC,
                FlowMatch::new().eth_src(mac).in_port(port),
            )
            .goto_table(tables::DVR_TO_SRC_MAC);
        self.install(flow)
    }

    pub fn remove_dvr_mac_tun(&mut self, mac: MacAddress, port: PortNumber) -> AgentResult<()> {
        self.uninstall(
            FlowFilter::matching(FlowMatch::new().eth_src(mac).in_port(port))
                .in_table(tables::LOCAL_SWITCHING),
        )
    }

    /// Removes the rule that answered ARP for `dvr_mac` on a router port.
    pub fn delete_dvr_dst_mac_for_arp(
        &mut self,
        network_type: NetworkType,
        vlan_tag: Option<u16>,
        gateway_mac: MacAddress,
        dvr_mac: MacAddress,
        rtr_port: PortNumber,
    ) -> AgentResult<()> {
        tracing::debug!(%gateway_mac, %rtr_port, %dvr_mac, "deleting dvr dst mac for arp");
        self.uninstall(FlowFilter::strict(
            dvr_table_for(network_type),
            priority::DVR_DST_MAC_FOR_ARP,
            dvr_dst_match(vlan_tag, dvr_mac)?,
        ))
    }
}
