//! QoS configuration below the flow layer.
//!
//! Rate limiting and queue objects live in the switch database rather than in
//! flow tables. These calls are opaque to the agent: it only decides which one
//! to make and with which numbers.

use crate::error::BridgeResult;

/// Bandwidth limits and queues on the integration bridge.
pub trait QosApi {
    /// Shape traffic leaving the VM (entering the switch) on `port_name`.
    fn create_egress_bw_limit_for_port(
        &mut self,
        port_name: &str,
        max_kbps: u64,
        max_burst_kbps: u64,
    ) -> BridgeResult<()>;

    fn delete_egress_bw_limit_for_port(&mut self, port_name: &str) -> BridgeResult<()>;

    /// Shape traffic towards the VM on `port_name`.
    fn update_ingress_bw_limit_for_port(
        &mut self,
        port_name: &str,
        max_kbps: u64,
        max_burst_kbps: u64,
    ) -> BridgeResult<()>;

    fn delete_ingress_bw_limit_for_port(&mut self, port_name: &str) -> BridgeResult<()>;

    /// Reserve `min_kbps` on queue `queue_num` across `egress_ports` for the
    /// traffic of `port_id`. Returns the id of the QoS object holding the queue.
    fn create_or_update_queue(
        &mut self,
        port_id: &str,
        queue_num: u32,
        min_kbps: u64,
        egress_ports: &[String],
    ) -> BridgeResult<String>;

    fn delete_queue(&mut self, port_id: &str) -> BridgeResult<()>;

    /// Remove every bandwidth QoS object owned by the agent.
    fn clear_bandwidth_qos(&mut self) -> BridgeResult<()>;

    /// Recreate the queue layout ingress limits are attached to.
    fn set_queue_for_ingress_bandwidth_limit(&mut self) -> BridgeResult<()>;
}
