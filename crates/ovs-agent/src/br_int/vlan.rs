//! Local VLAN translation for ports on physical networks.

use super::IntegrationBridge;
use crate::error::AgentResult;
use crate::tables::{self, priority};
use ovs_bridge::{Action, Bridge, FlowFilter, FlowMatch, SetField};
use ovs_types::{PortNumber, VlanVid};

/// Traffic arriving on `port` with the segment's VLAN, or untagged when the
/// segment has none.
fn local_vlan_match(port: PortNumber, segmentation_id: Option<u16>) -> AgentResult<FlowMatch> {
    Ok(FlowMatch::new()
        .in_port(port)
        .vlan_vid(VlanVid::from_segment(segmentation_id)?))
}

impl<B: Bridge> IntegrationBridge<B> {
    /// Rewrites the segment VLAN on `port` to the bridge-local `lvid`.
    pub fn provision_local_vlan(
        &mut self,
        port: PortNumber,
        lvid: u16,
        segmentation_id: Option<u16>,
    ) -> AgentResult<()> {
        let match_fields = local_vlan_match(port, segmentation_id)?;
        let mut actions = Vec::with_capacity(2);
        if segmentation_id.is_none() {
            actions.push(Action::PushVlan);
        }
        actions.push(Action::set_field(SetField::VlanVid(VlanVid::tagged(lvid)?)));

        let flow = self
            .flow(tables::LOCAL_SWITCHING, priority::LOCAL_VLAN, match_fields)
            .apply_actions(actions)
            .goto_table(tables::TRANSIENT_TABLE);
        self.install(flow)
    }

    pub fn reclaim_local_vlan(
        &mut self,
        port: PortNumber,
        segmentation_id: Option<u16>,
    ) -> AgentResult<()> {
        self.uninstall(FlowFilter::matching(local_vlan_match(port, segmentation_id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use ovs_agent_test::{BridgeCall, FlowVerifier, RecordingBridge};
    use ovs_types::ParseError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_provision_tagged_segment() {
        let recorder = RecordingBridge::new();
        let mut br = IntegrationBridge::new(recorder.clone());

        br.provision_local_vlan(PortNumber::new(999), 888, Some(777)).unwrap();

        let flows = recorder.flows();
        let flow = FlowVerifier::new(&flows)
            .assert_flow(
                tables::LOCAL_SWITCHING,
                3,
                &FlowMatch::new()
                    .in_port(PortNumber::new(999))
                    .vlan_vid(VlanVid::tagged(777).unwrap()),
            )
            .unwrap();
        assert_eq!(flow.match_fields.vlan_vid.unwrap().raw(), 777 | 0x1000);
        assert_eq!(
            flow.actions(),
            &[Action::set_field(SetField::VlanVid(VlanVid::tagged(888).unwrap()))]
        );
        assert_eq!(flow.goto_target(), Some(tables::TRANSIENT_TABLE));
    }

    #[test]
    fn test_provision_untagged_segment_pushes_tag() {
        let recorder = RecordingBridge::new();
        let mut br = IntegrationBridge::new(recorder.clone());

        br.provision_local_vlan(PortNumber::new(999), 888, None).unwrap();

        let flows = recorder.flows();
        let flow = &flows[0];
        assert_eq!(flow.match_fields.vlan_vid, Some(VlanVid::UNTAGGED));
        assert_eq!(
            flow.actions(),
            &[
                Action::PushVlan,
                Action::set_field(SetField::VlanVid(VlanVid::tagged(888).unwrap())),
            ]
        );
    }

    #[test]
    fn test_reclaim_uses_provisioning_match() {
        let recorder = RecordingBridge::new();
        let mut br = IntegrationBridge::new(recorder.clone());

        br.provision_local_vlan(PortNumber::new(999), 888, Some(777)).unwrap();
        br.reclaim_local_vlan(PortNumber::new(999), Some(777)).unwrap();

        let flows = recorder.flows();
        FlowVerifier::new(&flows)
            .assert_no_flows_for_port(tables::LOCAL_SWITCHING, PortNumber::new(999))
            .unwrap();
        assert_eq!(
            recorder.calls().last(),
            Some(&BridgeCall::UninstallFlows(FlowFilter::matching(
                FlowMatch::new()
                    .in_port(PortNumber::new(999))
                    .vlan_vid(VlanVid::tagged(777).unwrap())
            )))
        );
    }

    #[test]
    fn test_reclaim_leaves_other_segments() {
        let recorder = RecordingBridge::new();
        let mut br = IntegrationBridge::new(recorder.clone());

        br.provision_local_vlan(PortNumber::new(1), 10, Some(100)).unwrap();
        br.provision_local_vlan(PortNumber::new(1), 11, Some(101)).unwrap();
        br.reclaim_local_vlan(PortNumber::new(1), Some(100)).unwrap();

        let flows = recorder.flows();
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].match_fields.vlan_vid, Some(VlanVid::tagged(101).unwrap()));
    }

    #[test]
    fn test_out_of_range_vlan_makes_no_call() {
        let recorder = RecordingBridge::new();
        let mut br = IntegrationBridge::new(recorder.clone());

        let result = br.provision_local_vlan(PortNumber::new(1), 5000, Some(10));

        assert_eq!(result, Err(AgentError::Parse(ParseError::InvalidVlanId(5000))));
        assert!(recorder.calls().is_empty());
    }
}
