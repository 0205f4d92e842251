//! Port lookup.

use crate::error::BridgeResult;
use ovs_types::PortNumber;

pub trait PortApi {
    /// OpenFlow port number of `port_name`, or `None` when the port is not
    /// (or no longer) attached to the bridge.
    fn get_port_ofport(&self, port_name: &str) -> BridgeResult<Option<PortNumber>>;
}
