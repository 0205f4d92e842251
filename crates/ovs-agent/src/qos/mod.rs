//! Per-port QoS policy.
//!
//! - [`types`]: rules, port bindings and upstream events
//! - [`driver`]: the reconciler applying events to the bridges
//! - [`index`]: policies currently applied
//! - [`queue`]: minimum-bandwidth queue bookkeeping

pub mod driver;
pub mod index;
pub mod queue;
pub mod types;

pub use driver::{QosDriver, QosDriverStats};
pub use index::{AppliedPolicyIndex, PolicyKey};
pub use queue::{QueueAllocation, QueueAllocator};
pub use types::{
    BandwidthLimitRule, Direction, DscpMarkingRule, MinimumBandwidthRule, PortInfo, QosEvent,
    QosRule, RuleKind, VifPort, DEFAULT_BURST_PERCENT,
};

use crate::daemon::AgentExtension;
use crate::error::AgentResult;
use async_trait::async_trait;
use ovs_bridge::Bridge;

/// Runs a [`QosDriver`] inside the agent daemon.
pub struct QosExtension<B: Bridge> {
    driver: QosDriver<B>,
}

impl<B: Bridge> QosExtension<B> {
    pub fn new(driver: QosDriver<B>) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &QosDriver<B> {
        &self.driver
    }
}

#[async_trait]
impl<B: Bridge + Send> AgentExtension for QosExtension<B> {
    fn name(&self) -> &str {
        "qos"
    }

    async fn initialize(&mut self) -> AgentResult<()> {
        self.driver.initialize()
    }

    async fn handle_event(&mut self, event: &QosEvent) -> AgentResult<()> {
        self.driver.handle_event(event)
    }

    fn dump(&self) -> Vec<String> {
        let stats = self.driver.stats();
        let mut lines = vec![format!(
            "applied={} removed={} stale={} uplink_failures={}",
            stats.policies_applied,
            stats.policies_removed,
            stats.stale_events,
            stats.uplink_failures
        )];
        for port_id in self.driver.index().ports() {
            let policies: Vec<String> = self
                .driver
                .index()
                .policies_for(port_id)
                .iter()
                .map(|key| format!("{}/{}", key.kind, key.direction))
                .collect();
            lines.push(format!("{}: {}", port_id, policies.join(", ")));
        }
        lines
    }
}
