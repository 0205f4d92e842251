//! Recording bridges.
//!
//! [`RecordingBridge`] and [`RecordingUplink`] implement the bridge traits in
//! memory. Every call is appended to a log, the flow table is simulated with
//! the switch's replace/strict/non-strict semantics, and failures can be
//! injected. Clones share state, so a test keeps one handle and gives another
//! to the code under test.

use ovs_bridge::{
    BridgeError, BridgeResult, Cookie, Flow, FlowApi, FlowFilter, PortApi, QosApi, TableId,
    UplinkApi,
};
use ovs_types::PortNumber;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cookie used by [`RecordingBridge::new`].
pub const TEST_COOKIE: Cookie = Cookie::new(0x5eed_c0de);

/// One call made against a [`RecordingBridge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCall {
    InstallFlow(Flow),
    UninstallFlows(FlowFilter),
    GetPortOfport(String),
    CreateEgressBwLimit {
        port_name: String,
        max_kbps: u64,
        max_burst_kbps: u64,
    },
    DeleteEgressBwLimit {
        port_name: String,
    },
    UpdateIngressBwLimit {
        port_name: String,
        max_kbps: u64,
        max_burst_kbps: u64,
    },
    DeleteIngressBwLimit {
        port_name: String,
    },
    CreateOrUpdateQueue {
        port_id: String,
        queue_num: u32,
        min_kbps: u64,
        egress_ports: Vec<String>,
    },
    DeleteQueue {
        port_id: String,
    },
    ClearBandwidthQos,
    SetQueueForIngressBandwidthLimit,
}

impl BridgeCall {
    /// False only for read-only lookups.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, BridgeCall::GetPortOfport(_))
    }
}

/// Minimum-bandwidth queue as last configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRecord {
    pub queue_num: u32,
    pub min_kbps: u64,
    pub egress_ports: Vec<String>,
}

#[derive(Debug, Default)]
struct BridgeState {
    calls: Vec<BridgeCall>,
    flows: Vec<Flow>,
    ports: BTreeMap<String, PortNumber>,
    egress_limits: BTreeMap<String, (u64, u64)>,
    ingress_limits: BTreeMap<String, (u64, u64)>,
    queues: BTreeMap<String, QueueRecord>,
    failure: Option<BridgeError>,
}

/// In-memory integration bridge that records every call.
#[derive(Debug, Clone)]
pub struct RecordingBridge {
    name: String,
    cookie: Cookie,
    state: Arc<Mutex<BridgeState>>,
}

impl Default for RecordingBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::named("br-int", TEST_COOKIE)
    }

    pub fn named(name: impl Into<String>, cookie: Cookie) -> Self {
        Self {
            name: name.into(),
            cookie,
            state: Arc::new(Mutex::new(BridgeState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a port so that `get_port_ofport` resolves it.
    pub fn add_port(&self, name: impl Into<String>, ofport: u32) -> &Self {
        self.state().ports.insert(name.into(), PortNumber::new(ofport));
        self
    }

    pub fn remove_port(&self, name: &str) {
        self.state().ports.remove(name);
    }

    /// Make every following call fail with `error`.
    pub fn fail_with(&self, error: BridgeError) {
        self.state().failure = Some(error);
    }

    pub fn clear_failure(&self) {
        self.state().failure = None;
    }

    pub fn calls(&self) -> Vec<BridgeCall> {
        self.state().calls.clone()
    }

    pub fn mutating_calls(&self) -> Vec<BridgeCall> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Current simulated flow table, in install order.
    pub fn flows(&self) -> Vec<Flow> {
        self.state().flows.clone()
    }

    pub fn flows_in_table(&self, table: TableId) -> Vec<Flow> {
        self.state()
            .flows
            .iter()
            .filter(|flow| flow.table == table)
            .cloned()
            .collect()
    }

    pub fn egress_limit(&self, port_name: &str) -> Option<(u64, u64)> {
        self.state().egress_limits.get(port_name).copied()
    }

    pub fn ingress_limit(&self, port_name: &str) -> Option<(u64, u64)> {
        self.state().ingress_limits.get(port_name).copied()
    }

    pub fn queue(&self, port_id: &str) -> Option<QueueRecord> {
        self.state().queues.get(port_id).cloned()
    }

    pub fn queue_count(&self) -> usize {
        self.state().queues.len()
    }

    /// Records `call`, then fails it if a failure is injected.
    fn record(&self, call: BridgeCall) -> BridgeResult<MutexGuard<'_, BridgeState>> {
        let mut state = self.state();
        state.calls.push(call);
        match state.failure.clone() {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }
}

impl FlowApi for RecordingBridge {
    fn bridge_name(&self) -> &str {
        &self.name
    }

    fn default_cookie(&self) -> Cookie {
        self.cookie
    }

    fn install_flow(&mut self, flow: Flow) -> BridgeResult<()> {
        let mut state = self.record(BridgeCall::InstallFlow(flow.clone()))?;
        state.flows.retain(|existing| existing.key() != flow.key());
        state.flows.push(flow);
        Ok(())
    }

    fn uninstall_flows(&mut self, filter: &FlowFilter) -> BridgeResult<()> {
        let mut state = self.record(BridgeCall::UninstallFlows(filter.clone()))?;
        state.flows.retain(|flow| !filter.selects(flow));
        Ok(())
    }
}

impl PortApi for RecordingBridge {
    fn get_port_ofport(&self, port_name: &str) -> BridgeResult<Option<PortNumber>> {
        let state = self.record(BridgeCall::GetPortOfport(port_name.to_string()))?;
        Ok(state.ports.get(port_name).copied())
    }
}

impl QosApi for RecordingBridge {
    fn create_egress_bw_limit_for_port(
        &mut self,
        port_name: &str,
        max_kbps: u64,
        max_burst_kbps: u64,
    ) -> BridgeResult<()> {
        let mut state = self.record(BridgeCall::CreateEgressBwLimit {
            port_name: port_name.to_string(),
            max_kbps,
            max_burst_kbps,
        })?;
        state
            .egress_limits
            .insert(port_name.to_string(), (max_kbps, max_burst_kbps));
        Ok(())
    }

    fn delete_egress_bw_limit_for_port(&mut self, port_name: &str) -> BridgeResult<()> {
        let mut state = self.record(BridgeCall::DeleteEgressBwLimit {
            port_name: port_name.to_string(),
        })?;
        state.egress_limits.remove(port_name);
        Ok(())
    }

    fn update_ingress_bw_limit_for_port(
        &mut self,
        port_name: &str,
        max_kbps: u64,
        max_burst_kbps: u64,
    ) -> BridgeResult<()> {
        let mut state = self.record(BridgeCall::UpdateIngressBwLimit {
            port_name: port_name.to_string(),
            max_kbps,
            max_burst_kbps,
        })?;
        state
            .ingress_limits
            .insert(port_name.to_string(), (max_kbps, max_burst_kbps));
        Ok(())
    }

    fn delete_ingress_bw_limit_for_port(&mut self, port_name: &str) -> BridgeResult<()> {
        let mut state = self.record(BridgeCall::DeleteIngressBwLimit {
            port_name: port_name.to_string(),
        })?;
        state.ingress_limits.remove(port_name);
        Ok(())
    }

    fn create_or_update_queue(
        &mut self,
        port_id: &str,
        queue_num: u32,
        min_kbps: u64,
        egress_ports: &[String],
    ) -> BridgeResult<String> {
        let mut state = self.record(BridgeCall::CreateOrUpdateQueue {
            port_id: port_id.to_string(),
            queue_num,
            min_kbps,
            egress_ports: egress_ports.to_vec(),
        })?;
        state.queues.insert(
            port_id.to_string(),
            QueueRecord {
                queue_num,
                min_kbps,
                egress_ports: egress_ports.to_vec(),
            },
        );
        Ok(format!("qos-{}", self.name))
    }

    fn delete_queue(&mut self, port_id: &str) -> BridgeResult<()> {
        let mut state = self.record(BridgeCall::DeleteQueue {
            port_id: port_id.to_string(),
        })?;
        state.queues.remove(port_id);
        Ok(())
    }

    fn clear_bandwidth_qos(&mut self) -> BridgeResult<()> {
        let mut state = self.record(BridgeCall::ClearBandwidthQos)?;
        state.egress_limits.clear();
        state.ingress_limits.clear();
        state.queues.clear();
        Ok(())
    }

    fn set_queue_for_ingress_bandwidth_limit(&mut self) -> BridgeResult<()> {
        self.record(BridgeCall::SetQueueForIngressBandwidthLimit)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct UplinkState {
    ports: Vec<String>,
    queue_requests: Vec<u32>,
    fail_port_listing: bool,
    fail_queue_setup: bool,
}

/// In-memory physical bridge that records queue steering requests.
#[derive(Debug, Clone)]
pub struct RecordingUplink {
    name: String,
    state: Arc<Mutex<UplinkState>>,
}

impl RecordingUplink {
    pub fn new(name: impl Into<String>, ports: &[&str]) -> Self {
        let state = UplinkState {
            ports: ports.iter().map(|port| port.to_string()).collect(),
            ..UplinkState::default()
        };
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, UplinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue numbers passed to `set_queue_for_minimum_bandwidth`, in order.
    pub fn queue_requests(&self) -> Vec<u32> {
        self.state().queue_requests.clone()
    }

    pub fn fail_port_listing(&self, fail: bool) {
        self.state().fail_port_listing = fail;
    }

    pub fn fail_queue_setup(&self, fail: bool) {
        self.state().fail_queue_setup = fail;
    }
}

impl UplinkApi for RecordingUplink {
    fn bridge_name(&self) -> &str {
        &self.name
    }

    fn get_bridge_ports(&self) -> BridgeResult<Vec<String>> {
        let state = self.state();
        if state.fail_port_listing {
            return Err(BridgeError::transport(&self.name, "list-ports failed"));
        }
        Ok(state.ports.clone())
    }

    fn set_queue_for_minimum_bandwidth(&mut self, queue_num: u32) -> BridgeResult<()> {
        let mut state = self.state();
        state.queue_requests.push(queue_num);
        if state.fail_queue_setup {
            return Err(BridgeError::transport(&self.name, "queue setup failed"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovs_bridge::FlowMatch;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clones_share_state() {
        let bridge = RecordingBridge::new();
        let mut handle = bridge.clone();
        handle
            .install_flow(Flow::new(TEST_COOKIE, TableId::new(0), 0, FlowMatch::new()))
            .unwrap();
        assert_eq!(bridge.flows().len(), 1);
        assert_eq!(bridge.calls().len(), 1);
    }

    #[test]
    fn test_injected_failure_is_recorded_and_returned() {
        let bridge = RecordingBridge::new();
        let mut handle = bridge.clone();
        bridge.fail_with(BridgeError::transport("br-int", "down"));

        let result = handle.delete_queue("p1");

        assert!(result.is_err());
        assert_eq!(
            bridge.calls(),
            vec![BridgeCall::DeleteQueue {
                port_id: "p1".to_string()
            }]
        );
    }

    #[test]
    fn test_port_lookup_is_not_a_mutation() {
        let bridge = RecordingBridge::new();
        bridge.add_port("tap1", 3);
        assert_eq!(bridge.get_port_ofport("tap1").unwrap(), Some(PortNumber::new(3)));
        assert!(bridge.mutating_calls().is_empty());
    }

    #[test]
    fn test_uplink_failure_flags() {
        let uplink = RecordingUplink::new("br-phys", &["eth1"]);
        let mut handle = uplink.clone();
        uplink.fail_queue_setup(true);
        assert!(handle.set_queue_for_minimum_bandwidth(4).is_err());
        assert_eq!(uplink.queue_requests(), vec![4]);
        uplink.fail_port_listing(true);
        assert!(uplink.get_bridge_ports().is_err());
    }
}
