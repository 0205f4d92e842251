//! Pipeline programs for the integration bridge.
//!
//! [`IntegrationBridge`] owns the bridge handle and turns high-level intents
//! (provision a local VLAN, protect a port against ARP spoofing, mark DSCP)
//! into rule installs and deletes. Each program builds its match predicates
//! in one place and uses them for both directions, so a delete always names
//! exactly what the matching install wrote.
//!
//! - [`default_table`]: pipeline skeleton and reset
//! - [`vlan`]: local VLAN translation
//! - [`dvr`]: distributed routing MAC rewrite
//! - [`spoofing`]: ARP / neighbour advertisement anti-spoofing
//! - [`dscp`]: DSCP marking

pub mod default_table;
pub mod dscp;
pub mod dvr;
pub mod spoofing;
pub mod vlan;

pub use default_table::DefaultTableOptions;

use crate::error::AgentResult;
use crate::tables;
use ovs_bridge::{Bridge, Flow, FlowFilter, FlowMatch, Priority, TableId};
use tracing::debug;

/// Programs the integration bridge `B`.
#[derive(Debug)]
pub struct IntegrationBridge<B> {
    bridge: B,
}

impl<B: Bridge> IntegrationBridge<B> {
    pub fn new(bridge: B) -> Self {
        Self { bridge }
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut B {
        &mut self.bridge
    }

    /// A drop rule stamped with the bridge cookie; add instructions with the
    /// [`Flow`] builders.
    fn flow(&self, table: TableId, priority: Priority, match_fields: FlowMatch) -> Flow {
        Flow::new(self.bridge.default_cookie(), table, priority, match_fields)
    }

    /// Validates the goto target, then installs.
    fn install(&mut self, flow: Flow) -> AgentResult<()> {
        if let Some(target) = flow.goto_target() {
            tables::validate_goto(flow.table, target)?;
        }
        debug!(bridge = self.bridge.bridge_name(), "install {}", flow);
        self.bridge.install_flow(flow)?;
        Ok(())
    }

    fn uninstall(&mut self, filter: FlowFilter) -> AgentResult<()> {
        debug!(bridge = self.bridge.bridge_name(), "uninstall {}", filter);
        self.bridge.uninstall_flows(&filter)?;
        Ok(())
    }
}
