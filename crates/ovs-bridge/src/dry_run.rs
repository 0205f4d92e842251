//! Bridges that log what would be programmed instead of talking to a switch.
//!
//! The agent binary runs against these when no switch connection is
//! configured. They keep enough state (rules, port map, queues) for the
//! agent's read-back paths to behave as on a real bridge.

use crate::api::{FlowApi, PortApi, QosApi, UplinkApi};
use crate::error::BridgeResult;
use crate::flow::{Cookie, Flow, FlowFilter};
use ovs_types::PortNumber;
use std::collections::BTreeMap;
use tracing::info;

/// In-memory integration bridge.
#[derive(Debug, Clone)]
pub struct DryRunBridge {
    name: String,
    cookie: Cookie,
    ports: BTreeMap<String, PortNumber>,
    flows: Vec<Flow>,
    queues: BTreeMap<String, u32>,
}

impl DryRunBridge {
    pub fn new(name: impl Into<String>, cookie: Cookie) -> Self {
        Self {
            name: name.into(),
            cookie,
            ports: BTreeMap::new(),
            flows: Vec::new(),
            queues: BTreeMap::new(),
        }
    }

    /// Attach a port so that name lookups resolve.
    pub fn with_port(mut self, name: impl Into<String>, ofport: PortNumber) -> Self {
        self.ports.insert(name.into(), ofport);
        self
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }
}

impl FlowApi for DryRunBridge {
    fn bridge_name(&self) -> &str {
        &self.name
    }

    fn default_cookie(&self) -> Cookie {
        self.cookie
    }

    fn install_flow(&mut self, flow: Flow) -> BridgeResult<()> {
        info!(bridge = %self.name, "add-flow {}", flow);
        self.flows.retain(|existing| existing.key() != flow.key());
        self.flows.push(flow);
        Ok(())
    }

    fn uninstall_flows(&mut self, filter: &FlowFilter) -> BridgeResult<()> {
        let before = self.flows.len();
        self.flows.retain(|flow| !filter.selects(flow));
        info!(
            bridge = %self.name,
            removed = before - self.flows.len(),
            "del-flows {}",
            filter
        );
        Ok(())
    }
}

impl PortApi for DryRunBridge {
    fn get_port_ofport(&self, port_name: &str) -> BridgeResult<Option<PortNumber>> {
        Ok(self.ports.get(port_name).copied())
    }
}

impl QosApi for DryRunBridge {
    fn create_egress_bw_limit_for_port(
        &mut self,
        port_name: &str,
        max_kbps: u64,
        max_burst_kbps: u64,
    ) -> BridgeResult<()> {
        info!(bridge = %self.name, port_name, max_kbps, max_burst_kbps, "set egress bandwidth limit");
        Ok(())
    }

    fn delete_egress_bw_limit_for_port(&mut self, port_name: &str) -> BridgeResult<()> {
        info!(bridge = %self.name, port_name, "clear egress bandwidth limit");
        Ok(())
    }

    fn update_ingress_bw_limit_for_port(
        &mut self,
        port_name: &str,
        max_kbps: u64,
        max_burst_kbps: u64,
    ) -> BridgeResult<()> {
        info!(bridge = %self.name, port_name, max_kbps, max_burst_kbps, "set ingress bandwidth limit");
        Ok(())
    }

    fn delete_ingress_bw_limit_for_port(&mut self, port_name: &str) -> BridgeResult<()> {
        info!(bridge = %self.name, port_name, "clear ingress bandwidth limit");
        Ok(())
    }

    fn create_or_update_queue(
        &mut self,
        port_id: &str,
        queue_num: u32,
        min_kbps: u64,
        egress_ports: &[String],
    ) -> BridgeResult<String> {
        info!(
            bridge = %self.name,
            port_id,
            queue_num,
            min_kbps,
            egress_ports = ?egress_ports,
            "set minimum bandwidth queue"
        );
        self.queues.insert(port_id.to_string(), queue_num);
        Ok(format!("qos-{}", self.name))
    }

    fn delete_queue(&mut self, port_id: &str) -> BridgeResult<()> {
        info!(bridge = %self.name, port_id, "delete minimum bandwidth queue");
        self.queues.remove(port_id);
        Ok(())
    }

    fn clear_bandwidth_qos(&mut self) -> BridgeResult<()> {
        info!(bridge = %self.name, "clear bandwidth QoS");
        self.queues.clear();
        Ok(())
    }

    fn set_queue_for_ingress_bandwidth_limit(&mut self) -> BridgeResult<()> {
        info!(bridge = %self.name, "set ingress bandwidth limit queue");
        Ok(())
    }
}

/// In-memory physical bridge.
#[derive(Debug, Clone)]
pub struct DryRunUplink {
    name: String,
    ports: Vec<String>,
}

impl DryRunUplink {
    pub fn new(name: impl Into<String>, ports: Vec<String>) -> Self {
        Self {
            name: name.into(),
            ports,
        }
    }
}

impl UplinkApi for DryRunUplink {
    fn bridge_name(&self) -> &str {
        &self.name
    }

    fn get_bridge_ports(&self) -> BridgeResult<Vec<String>> {
        Ok(self.ports.clone())
    }

    fn set_queue_for_minimum_bandwidth(&mut self, queue_num: u32) -> BridgeResult<()> {
        info!(bridge = %self.name, queue_num, "steer minimum bandwidth queue");
        Ok(())
    }
}
