//! Shared fixtures for the agent integration tests.

#![allow(dead_code)]

use ovs_agent::qos::{
    BandwidthLimitRule, Direction, DscpMarkingRule, MinimumBandwidthRule, PortInfo,
};
use ovs_agent::{DefaultTableOptions, QosDriver};
use ovs_agent_test::{RecordingBridge, RecordingUplink};

pub const PORT_ID: &str = "7a3c1e2f-port";
pub const PORT_NAME: &str = "tap7a3c1e2f";
pub const OFPORT: u32 = 12;

pub fn bound_port() -> PortInfo {
    PortInfo::bound(PORT_ID, PORT_NAME, OFPORT)
}

pub fn unbound_port() -> PortInfo {
    PortInfo::unbound(PORT_ID)
}

pub fn bandwidth_limit(direction: Direction, max_kbps: u64, burst: Option<u64>) -> BandwidthLimitRule {
    BandwidthLimitRule {
        id: format!("bw-{}", direction),
        direction,
        max_kbps: Some(max_kbps),
        max_burst_kbps: burst,
    }
}

pub fn dscp_marking(dscp_mark: u8) -> DscpMarkingRule {
    DscpMarkingRule {
        id: "dscp-1".to_string(),
        dscp_mark,
    }
}

pub fn minimum_bandwidth(direction: Direction, min_kbps: u64) -> MinimumBandwidthRule {
    MinimumBandwidthRule {
        id: format!("minbw-{}", direction),
        direction,
        min_kbps,
    }
}

/// A driver over a recording br-int with [`PORT_NAME`] attached.
pub fn driver() -> (QosDriver<RecordingBridge>, RecordingBridge) {
    let recorder = RecordingBridge::new();
    recorder.add_port(PORT_NAME, OFPORT);
    let driver = QosDriver::new(recorder.clone(), DefaultTableOptions::default());
    (driver, recorder)
}

/// Like [`driver`], with one recording physical bridge per entry of `uplinks`.
pub fn driver_with_uplinks(
    uplinks: &[(&str, &[&str])],
) -> (QosDriver<RecordingBridge>, RecordingBridge, Vec<RecordingUplink>) {
    let (mut driver, recorder) = driver();
    let handles: Vec<RecordingUplink> = uplinks
        .iter()
        .map(|(name, ports)| RecordingUplink::new(*name, ports))
        .collect();
    for uplink in &handles {
        driver.add_uplink(Box::new(uplink.clone()));
    }
    (driver, recorder, handles)
}
