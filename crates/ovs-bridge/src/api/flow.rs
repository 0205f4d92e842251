//! Flow-table programming.

use crate::error::BridgeResult;
use crate::flow::{Cookie, Flow, FlowFilter};

/// Install and remove rules on one bridge.
///
/// Installing a rule whose `(table, priority, match)` key already exists
/// replaces it. Deleting with a filter that selects nothing succeeds.
pub trait FlowApi {
    /// Name of the bridge, for logging.
    fn bridge_name(&self) -> &str;

    /// Cookie stamped on every rule this agent installs.
    fn default_cookie(&self) -> Cookie;

    fn install_flow(&mut self, flow: Flow) -> BridgeResult<()>;

    fn uninstall_flows(&mut self, filter: &FlowFilter) -> BridgeResult<()>;
}
