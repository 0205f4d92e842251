//! DSCP marking.
//!
//! The marking rule sets `reg2 = 1`, rewrites DSCP and resubmits the packet
//! through the pipeline as if it arrived on the same port. The `reg2 = 0`
//! match keeps the resubmitted packet from hitting the marking rule again.

use super::IntegrationBridge;
use crate::error::AgentResult;
use crate::tables::{self, priority};
use ovs_bridge::{Action, Bridge, FlowFilter, FlowMatch, SetField};
use ovs_types::proto::ether_types;
use ovs_types::PortNumber;

/// Largest value of the 6-bit DSCP field.
pub const MAX_DSCP: u8 = 63;

const UNMARKED: u32 = 0;
const MARKED: u32 = 1;

fn dscp_match(port: PortNumber) -> FlowMatch {
    FlowMatch::new().in_port(port).reg2(UNMARKED)
}

impl<B: Bridge> IntegrationBridge<B> {
    pub fn install_dscp_marking_rule(&mut self, port: PortNumber, dscp_mark: u8) -> AgentResult<()> {
        for eth_type in [ether_types::ETH_TYPE_IP, ether_types::ETH_TYPE_IPV6] {
            let flow = self
                .flow(
                    tables::LOCAL_SWITCHING,
                    priority::DSCP_MARKING,
                    dscp_match(port).eth_type(eth_type),
                )
                .apply_actions(vec![
                    Action::set_field(SetField::Reg2(MARKED)),
                    Action::set_field(SetField::IpDscp(dscp_mark)),
                    Action::Resubmit { in_port: port },
                ]);
            self.install(flow)?;
        }
        Ok(())
    }

    /// Removes the IPv4 and IPv6 marking rules of `port`.
    pub fn delete_dscp_marking_rule(&mut self, port: PortNumber) -> AgentResult<()> {
        self.uninstall(FlowFilter::matching(dscp_match(port)).in_table(tables::LOCAL_SWITCHING))
    }
}
