//! Flow-table semantics of the recording bridge.

use ovs_agent_test::{BridgeCall, FlowVerifier, RecordingBridge, RecordingUplink, TEST_COOKIE};
use ovs_bridge::{
    BridgeError, Cookie, Flow, FlowApi, FlowFilter, FlowMatch, PortApi, QosApi, TableId, UplinkApi,
};
use ovs_types::PortNumber;
use pretty_assertions::assert_eq;

fn rule(table: u8, priority: u16, m: FlowMatch) -> Flow {
    Flow::new(TEST_COOKIE, TableId::new(table), priority, m)
}

#[test]
fn test_same_key_replaces() {
    let mut bridge = RecordingBridge::new();
    let m = FlowMatch::new().in_port(PortNumber::new(1));

    bridge.install_flow(rule(0, 3, m.clone())).unwrap();
    bridge
        .install_flow(rule(0, 3, m.clone()).goto_table(TableId::new(60)))
        .unwrap();
    bridge.install_flow(rule(0, 4, m)).unwrap();

    let flows = bridge.flows();
    assert_eq!(flows.len(), 2);
    assert_eq!(flows[0].goto_target(), Some(TableId::new(60)));
}

#[test]
fn test_strict_and_non_strict_delete() {
    let mut bridge = RecordingBridge::new();
    let port = PortNumber::new(7);
    let narrow = FlowMatch::new().in_port(port).eth_type(0x0806);
    bridge.install_flow(rule(0, 10, narrow.clone())).unwrap();
    bridge
        .install_flow(rule(0, 3, FlowMatch::new().in_port(port)))
        .unwrap();
    bridge
        .install_flow(rule(24, 2, FlowMatch::new().in_port(port)))
        .unwrap();

    bridge
        .uninstall_flows(&FlowFilter::strict(TableId::new(0), 3, narrow.clone()))
        .unwrap();
    assert_eq!(bridge.flows().len(), 3);

    bridge
        .uninstall_flows(&FlowFilter::matching(FlowMatch::new().in_port(port)).in_table(TableId::new(0)))
        .unwrap();
    let flows = bridge.flows();
    let verifier = FlowVerifier::new(&flows);
    verifier
        .assert_no_flows_for_port(TableId::new(0), port)
        .unwrap();
    verifier.assert_table_count(TableId::new(24), 1).unwrap();
}

#[test]
fn test_cookie_delete_spares_foreign_rules() {
    let mut bridge = RecordingBridge::new();
    bridge.install_flow(rule(0, 0, FlowMatch::new())).unwrap();
    bridge
        .install_flow(Flow::new(Cookie::new(1), TableId::new(0), 1, FlowMatch::new()))
        .unwrap();

    bridge
        .uninstall_flows(&FlowFilter::by_cookie(TEST_COOKIE))
        .unwrap();

    let flows = bridge.flows();
    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].cookie, Cookie::new(1));
}

#[test]
fn test_injected_failure_is_recorded_then_returned() {
    let mut bridge = RecordingBridge::new();
    bridge.add_port("tap1", 4);
    bridge.fail_with(BridgeError::timeout("br-int"));

    assert_eq!(
        bridge.create_egress_bw_limit_for_port("tap1", 10, 8),
        Err(BridgeError::timeout("br-int"))
    );
    assert!(bridge.get_port_ofport("tap1").is_err());
    assert_eq!(bridge.egress_limit("tap1"), None);
    assert_eq!(bridge.calls().len(), 2);
    assert_eq!(bridge.mutating_calls().len(), 1);

    bridge.clear_failure();
    assert_eq!(bridge.get_port_ofport("tap1"), Ok(Some(PortNumber::new(4))));
    assert_eq!(
        bridge.calls().last(),
        Some(&BridgeCall::GetPortOfport("tap1".to_string()))
    );
}

#[test]
fn test_uplink_records_queue_requests() {
    let mut uplink = RecordingUplink::new("br-phys", &["eth0"]);
    assert_eq!(uplink.get_bridge_ports().unwrap(), vec!["eth0".to_string()]);

    uplink.set_queue_for_minimum_bandwidth(3).unwrap();
    uplink.fail_queue_setup(true);
    assert!(uplink.set_queue_for_minimum_bandwidth(4).is_err());
    uplink.fail_port_listing(true);
    assert!(uplink.get_bridge_ports().is_err());

    assert_eq!(uplink.queue_requests(), vec![3, 4]);
}
