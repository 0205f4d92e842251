//! Physical (provider) bridges carrying traffic off the host.

use crate::error::BridgeResult;

pub trait UplinkApi {
    fn bridge_name(&self) -> &str;

    /// Names of the ports attached to this bridge.
    fn get_bridge_ports(&self) -> BridgeResult<Vec<String>>;

    /// Steer traffic marked for `queue_num` into that queue on egress.
    fn set_queue_for_minimum_bandwidth(&mut self, queue_num: u32) -> BridgeResult<()>;
}
