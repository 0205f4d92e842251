//! Per-port QoS reconciler.
//!
//! [`QosDriver`] turns policy events into bridge calls. Each (port, rule kind,
//! direction) is either absent or applied; the applied state remembers the
//! port binding it was programmed with so a later delete can undo it even
//! after the port has left the bridge.
//!
//! Events for ports without a switch binding are stale and are dropped
//! without touching the bridge. Bridge failures propagate unchanged and leave
//! the index as it was.

use super::index::{AppliedPolicyIndex, PolicyKey};
use super::queue::QueueAllocator;
use super::types::{
    BandwidthLimitRule, Direction, DscpMarkingRule, MinimumBandwidthRule, PortInfo, QosEvent,
    QosRule, RuleKind, VifPort,
};
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::br_int::{DefaultTableOptions, IntegrationBridge};
use crate::error::{AgentError, AgentResult};
use ovs_bridge::{Bridge, UplinkApi};
use tracing::{debug, info, instrument, warn};

const SOURCE: &str = "QosDriver";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QosDriverStats {
    pub policies_applied: u64,
    pub policies_removed: u64,
    /// Events dropped because the port had no switch binding.
    pub stale_events: u64,
    /// Deletes for policies that were never applied.
    pub missing_deletes: u64,
    pub uplink_failures: u64,
}

fn audit_failure(action: &str, key: &PolicyKey, err: &AgentError) {
    audit_log!(AuditRecord::new(AuditCategory::ErrorCondition, SOURCE, action)
        .with_object_id(&key.port_id)
        .with_object_type(key.kind.as_str())
        .with_details(serde_json::json!({ "direction": key.direction.as_str() }))
        .with_error(err.to_string()));
}

/// Reconciles QoS policy for the ports of one integration bridge.
pub struct QosDriver<B: Bridge> {
    br_int: IntegrationBridge<B>,
    uplinks: Vec<Box<dyn UplinkApi + Send>>,
    index: AppliedPolicyIndex,
    queues: QueueAllocator,
    options: DefaultTableOptions,
    stats: QosDriverStats,
}

impl<B: Bridge> QosDriver<B> {
    pub fn new(bridge: B, options: DefaultTableOptions) -> Self {
        Self {
            br_int: IntegrationBridge::new(bridge),
            uplinks: Vec::new(),
            index: AppliedPolicyIndex::new(),
            queues: QueueAllocator::new(),
            options,
            stats: QosDriverStats::default(),
        }
    }

    /// Adds a physical bridge that carries minimum-bandwidth queues.
    pub fn with_uplink(mut self, uplink: impl UplinkApi + Send + 'static) -> Self {
        self.add_uplink(Box::new(uplink));
        self
    }

    pub fn add_uplink(&mut self, uplink: Box<dyn UplinkApi + Send>) {
        debug!(bridge = uplink.bridge_name(), "registered physical bridge");
        self.uplinks.push(uplink);
    }

    pub fn br_int(&self) -> &IntegrationBridge<B> {
        &self.br_int
    }

    pub fn br_int_mut(&mut self) -> &mut IntegrationBridge<B> {
        &mut self.br_int
    }

    pub fn index(&self) -> &AppliedPolicyIndex {
        &self.index
    }

    pub fn queues(&self) -> &QueueAllocator {
        &self.queues
    }

    pub fn stats(&self) -> &QosDriverStats {
        &self.stats
    }

    /// Resets the pipeline and bandwidth QoS on the integration bridge and
    /// forgets every applied policy.
    #[instrument(skip(self))]
    pub fn initialize(&mut self) -> AgentResult<()> {
        let result = self.reset_bridge();
        match &result {
            Ok(()) => {
                self.index.clear();
                self.queues.clear();
                audit_log!(
                    AuditRecord::new(AuditCategory::SystemLifecycle, SOURCE, "initialize")
                        .with_outcome(AuditOutcome::Success)
                        .with_object_id(self.br_int.bridge().bridge_name())
                        .with_object_type("bridge")
                );
            }
            Err(err) => {
                audit_log!(
                    AuditRecord::new(AuditCategory::SystemLifecycle, SOURCE, "initialize")
                        .with_object_id(self.br_int.bridge().bridge_name())
                        .with_object_type("bridge")
                        .with_error(err.to_string())
                );
            }
        }
        result
    }

    fn reset_bridge(&mut self) -> AgentResult<()> {
        self.br_int.reset_pipeline(self.options)?;
        let bridge = self.br_int.bridge_mut();
        bridge.clear_bandwidth_qos()?;
        bridge.set_queue_for_ingress_bandwidth_limit()?;
        Ok(())
    }

    /// Routes an upstream event to the matching operation.
    pub fn handle_event(&mut self, event: &QosEvent) -> AgentResult<()> {
        debug!(op = event.op(), port_id = %event.port().port_id, "qos event");
        match event {
            QosEvent::Create { port, rule } | QosEvent::Update { port, rule } => {
                self.apply_rule(port, rule)
            }
            QosEvent::Delete {
                port,
                kind,
                direction,
            } => self.delete(port, *kind, *direction),
        }
    }

    pub fn apply_rule(&mut self, port: &PortInfo, rule: &QosRule) -> AgentResult<()> {
        match rule {
            QosRule::BandwidthLimit(rule) => self.update_bandwidth_limit(port, rule),
            QosRule::DscpMarking(rule) => self.update_dscp_marking(port, rule),
            QosRule::MinimumBandwidth(rule) => self.update_minimum_bandwidth(port, rule),
        }
    }

    pub fn create_bandwidth_limit(
        &mut self,
        port: &PortInfo,
        rule: &BandwidthLimitRule,
    ) -> AgentResult<()> {
        self.update_bandwidth_limit(port, rule)
    }

    #[instrument(skip_all, fields(port_id = %port.port_id, rule_id = %rule.id, direction = %rule.direction))]
    pub fn update_bandwidth_limit(
        &mut self,
        port: &PortInfo,
        rule: &BandwidthLimitRule,
    ) -> AgentResult<()> {
        let key = PolicyKey::new(&port.port_id, RuleKind::BandwidthLimit, rule.direction);
        self.apply_bandwidth_limit(port, rule, &key)
            .inspect_err(|err| audit_failure("apply_policy", &key, err))
    }

    fn apply_bandwidth_limit(
        &mut self,
        port: &PortInfo,
        rule: &BandwidthLimitRule,
        key: &PolicyKey,
    ) -> AgentResult<()> {
        let egress_max_kbps = match rule.direction {
            Direction::Egress => Some(rule.max_kbps.ok_or_else(|| {
                AgentError::invalid_rule(&rule.id, "egress bandwidth limit requires max_kbps")
            })?),
            Direction::Ingress => None,
        };
        let Some(vif) = self.binding(port, key) else {
            return Ok(());
        };

        let bridge = self.br_int.bridge_mut();
        match egress_max_kbps {
            Some(max_kbps) => {
                let burst_kbps = rule.egress_burst_kbps(max_kbps);
                bridge.create_egress_bw_limit_for_port(&vif.port_name, max_kbps, burst_kbps)?;
            }
            None => {
                bridge.update_ingress_bw_limit_for_port(
                    &vif.port_name,
                    rule.max_kbps.unwrap_or(0),
                    rule.max_burst_kbps.unwrap_or(0),
                )?;
            }
        }
        self.applied(key.clone(), port.clone(), &rule.id);
        Ok(())
    }

    pub fn create_dscp_marking(&mut self, port: &PortInfo, rule: &DscpMarkingRule) -> AgentResult<()> {
        self.update_dscp_marking(port, rule)
    }

    #[instrument(skip_all, fields(port_id = %port.port_id, rule_id = %rule.id, dscp_mark = rule.dscp_mark))]
    pub fn update_dscp_marking(&mut self, port: &PortInfo, rule: &DscpMarkingRule) -> AgentResult<()> {
        let key = PolicyKey::new(&port.port_id, RuleKind::DscpMarking, Direction::Egress);
        self.apply_dscp_marking(port, rule, &key)
            .inspect_err(|err| audit_failure("apply_policy", &key, err))
    }

    fn apply_dscp_marking(
        &mut self,
        port: &PortInfo,
        rule: &DscpMarkingRule,
        key: &PolicyKey,
    ) -> AgentResult<()> {
        rule.validate()?;
        let Some(vif) = self.binding(port, key) else {
            return Ok(());
        };
        let Some(ofport) = self.br_int.bridge().get_port_ofport(&vif.port_name)? else {
            debug!(port_name = %vif.port_name, "port not on bridge, dropping dscp rule");
            self.stats.stale_events = self.stats.stale_events.saturating_add(1);
            return Ok(());
        };

        // The rules are keyed by port number; drop those of a previous binding.
        let previous = self
            .index
            .get(key)
            .and_then(|snapshot| snapshot.vif_port.as_ref())
            .map(|old| old.ofport)
            .filter(|old| *old != ofport);
        if let Some(old) = previous {
            self.br_int.delete_dscp_marking_rule(old)?;
        }

        self.br_int.install_dscp_marking_rule(ofport, rule.dscp_mark)?;
        let snapshot = PortInfo {
            port_id: port.port_id.clone(),
            vif_port: Some(VifPort {
                port_name: vif.port_name,
                ofport,
            }),
        };
        self.applied(key.clone(), snapshot, &rule.id);
        Ok(())
    }

    pub fn create_minimum_bandwidth(
        &mut self,
        port: &PortInfo,
        rule: &MinimumBandwidthRule,
    ) -> AgentResult<()> {
        self.update_minimum_bandwidth(port, rule)
    }

    #[instrument(skip_all, fields(port_id = %port.port_id, rule_id = %rule.id, direction = %rule.direction))]
    pub fn update_minimum_bandwidth(
        &mut self,
        port: &PortInfo,
        rule: &MinimumBandwidthRule,
    ) -> AgentResult<()> {
        let key = PolicyKey::new(&port.port_id, RuleKind::MinimumBandwidth, rule.direction);
        self.apply_minimum_bandwidth(port, rule, &key)
            .inspect_err(|err| audit_failure("apply_policy", &key, err))
    }

    fn apply_minimum_bandwidth(
        &mut self,
        port: &PortInfo,
        rule: &MinimumBandwidthRule,
        key: &PolicyKey,
    ) -> AgentResult<()> {
        let Some(vif) = self.binding(port, key) else {
            return Ok(());
        };
        if rule.direction == Direction::Ingress {
            debug!("ingress minimum bandwidth is recorded only");
            self.applied(key.clone(), port.clone(), &rule.id);
            return Ok(());
        }

        let egress_ports = self.uplink_ports();
        let queue_num = vif.ofport.as_u32();
        self.queues.provision(
            self.br_int.bridge_mut(),
            &port.port_id,
            queue_num,
            rule.min_kbps,
            egress_ports,
        )?;

        for uplink in &mut self.uplinks {
            if let Err(err) = uplink.set_queue_for_minimum_bandwidth(queue_num) {
                warn!(
                    bridge = uplink.bridge_name(),
                    queue_num,
                    error = %err,
                    "failed to steer queue on physical bridge"
                );
                self.stats.uplink_failures = self.stats.uplink_failures.saturating_add(1);
            }
        }

        self.applied(key.clone(), port.clone(), &rule.id);
        Ok(())
    }

    pub fn delete_bandwidth_limit(&mut self, port: &PortInfo) -> AgentResult<()> {
        self.delete(port, RuleKind::BandwidthLimit, Direction::Egress)
    }

    pub fn delete_bandwidth_limit_ingress(&mut self, port: &PortInfo) -> AgentResult<()> {
        self.delete(port, RuleKind::BandwidthLimit, Direction::Ingress)
    }

    pub fn delete_dscp_marking(&mut self, port: &PortInfo) -> AgentResult<()> {
        self.delete(port, RuleKind::DscpMarking, Direction::Egress)
    }

    pub fn delete_minimum_bandwidth(&mut self, port: &PortInfo) -> AgentResult<()> {
        self.delete(port, RuleKind::MinimumBandwidth, Direction::Egress)
    }

    pub fn delete_minimum_bandwidth_ingress(&mut self, port: &PortInfo) -> AgentResult<()> {
        self.delete(port, RuleKind::MinimumBandwidth, Direction::Ingress)
    }

    /// Undoes the policy applied for `(port, kind, direction)`.
    ///
    /// Uses the event's binding when present, else the binding the policy was
    /// applied with. A policy that was never applied is a no-op.
    #[instrument(skip(self, port), fields(port_id = %port.port_id))]
    pub fn delete(&mut self, port: &PortInfo, kind: RuleKind, direction: Direction) -> AgentResult<()> {
        let key = PolicyKey::new(&port.port_id, kind, direction);
        self.remove_policy(port, &key)
            .inspect_err(|err| audit_failure("remove_policy", &key, err))
    }

    fn remove_policy(&mut self, port: &PortInfo, key: &PolicyKey) -> AgentResult<()> {
        let Some(snapshot) = self.index.get(key) else {
            debug!(policy = %key, "no applied policy to delete");
            self.stats.missing_deletes = self.stats.missing_deletes.saturating_add(1);
            return Ok(());
        };
        let vif = port
            .vif_port
            .clone()
            .or_else(|| snapshot.vif_port.clone());

        if let Some(vif) = vif {
            let bridge = self.br_int.bridge_mut();
            match (key.kind, key.direction) {
                (RuleKind::BandwidthLimit, Direction::Egress) => {
                    bridge.delete_egress_bw_limit_for_port(&vif.port_name)?;
                }
                (RuleKind::BandwidthLimit, Direction::Ingress) => {
                    bridge.delete_ingress_bw_limit_for_port(&vif.port_name)?;
                }
                (RuleKind::DscpMarking, _) => {
                    self.br_int.delete_dscp_marking_rule(vif.ofport)?;
                }
                (RuleKind::MinimumBandwidth, Direction::Egress) => {
                    self.queues.release(bridge, &key.port_id)?;
                }
                (RuleKind::MinimumBandwidth, Direction::Ingress) => {}
            }
        }

        self.index.remove(key);
        self.stats.policies_removed = self.stats.policies_removed.saturating_add(1);
        info!(policy = %key, "qos policy removed");
        audit_log!(
            AuditRecord::new(AuditCategory::ResourceDelete, SOURCE, "remove_policy")
                .with_outcome(AuditOutcome::Success)
                .with_object_id(&key.port_id)
                .with_object_type(key.kind.as_str())
                .with_details(serde_json::json!({ "direction": key.direction.as_str() }))
        );
        Ok(())
    }

    /// The switch binding of `port`, or `None` (logged and counted) when the
    /// event is stale.
    fn binding(&mut self, port: &PortInfo, key: &PolicyKey) -> Option<VifPort> {
        match &port.vif_port {
            Some(vif) => Some(vif.clone()),
            None => {
                debug!(policy = %key, "port has no switch binding, ignoring stale event");
                self.stats.stale_events = self.stats.stale_events.saturating_add(1);
                audit_log!(
                    AuditRecord::new(AuditCategory::ResourceModify, SOURCE, "apply_policy")
                        .with_outcome(AuditOutcome::Skipped)
                        .with_object_id(&key.port_id)
                        .with_object_type(key.kind.as_str())
                );
                None
            }
        }
    }

    fn applied(&mut self, key: PolicyKey, snapshot: PortInfo, rule_id: &str) {
        let category = if self.index.contains(&key) {
            AuditCategory::ResourceModify
        } else {
            AuditCategory::ResourceCreate
        };
        info!(policy = %key, rule_id, "qos policy applied");
        audit_log!(
            AuditRecord::new(category, SOURCE, "apply_policy")
                .with_outcome(AuditOutcome::Success)
                .with_object_id(&key.port_id)
                .with_object_type(key.kind.as_str())
                .with_details(serde_json::json!({
                    "direction": key.direction.as_str(),
                    "rule_id": rule_id,
                }))
        );
        self.index.insert(key, snapshot);
        self.stats.policies_applied = self.stats.policies_applied.saturating_add(1);
    }

    /// Ports of every physical bridge. Empty bridges and listing failures are
    /// logged and skipped.
    fn uplink_ports(&mut self) -> Vec<String> {
        let mut ports = Vec::new();
        for uplink in &self.uplinks {
            match uplink.get_bridge_ports() {
                Ok(found) if found.is_empty() => {
                    warn!(bridge = uplink.bridge_name(), "physical bridge has no ports");
                }
                Ok(found) => ports.extend(found),
                Err(err) => {
                    warn!(bridge = uplink.bridge_name(), error = %err, "failed to list physical bridge ports");
                    self.stats.uplink_failures = self.stats.uplink_failures.saturating_add(1);
                }
            }
        }
        ports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovs_agent_test::{BridgeCall, RecordingBridge, RecordingUplink};
    use ovs_bridge::BridgeError;
    use pretty_assertions::assert_eq;

    fn driver() -> (QosDriver<RecordingBridge>, RecordingBridge) {
        let recorder = RecordingBridge::new();
        let driver = QosDriver::new(recorder.clone(), DefaultTableOptions::default());
        (driver, recorder)
    }

    fn egress_limit(max_kbps: Option<u64>, burst: Option<u64>) -> BandwidthLimitRule {
        BandwidthLimitRule {
            id: "bw-1".to_string(),
            direction: Direction::Egress,
            max_kbps,
            max_burst_kbps: burst,
        }
    }

    #[test]
    fn test_egress_limit_uses_default_burst() {
        let (mut driver, recorder) = driver();
        let port = PortInfo::bound("p1", "tap1", 3);

        driver
            .update_bandwidth_limit(&port, &egress_limit(Some(1000), None))
            .unwrap();

        assert_eq!(recorder.egress_limit("tap1"), Some((1000, 800)));
        assert_eq!(driver.stats().policies_applied, 1);
    }

    #[test]
    fn test_egress_limit_requires_rate() {
        let (mut driver, recorder) = driver();
        let port = PortInfo::bound("p1", "tap1", 3);

        let result = driver.update_bandwidth_limit(&port, &egress_limit(None, Some(10)));

        assert!(matches!(result, Err(AgentError::InvalidRule { .. })));
        assert!(recorder.calls().is_empty());
        assert!(driver.index().is_empty());
    }

    #[test]
    fn test_dscp_unknown_port_is_stale() {
        let (mut driver, recorder) = driver();
        let port = PortInfo::bound("p1", "tap1", 3);
        let rule = DscpMarkingRule {
            id: "d".to_string(),
            dscp_mark: 16,
        };

        driver.update_dscp_marking(&port, &rule).unwrap();

        assert_eq!(recorder.calls(), vec![BridgeCall::GetPortOfport("tap1".to_string())]);
        assert!(recorder.mutating_calls().is_empty());
        assert!(driver.index().is_empty());
        assert_eq!(driver.stats().stale_events, 1);
    }

    #[test]
    fn test_dscp_moved_port_drops_old_rules() {
        let (mut driver, recorder) = driver();
        let port = PortInfo::bound("p1", "tap1", 3);
        let rule = DscpMarkingRule {
            id: "d".to_string(),
            dscp_mark: 16,
        };
        recorder.add_port("tap1", 3);
        driver.update_dscp_marking(&port, &rule).unwrap();

        recorder.remove_port("tap1");
        recorder.add_port("tap1", 9);
        driver.update_dscp_marking(&port, &rule).unwrap();

        let flows = recorder.flows();
        assert_eq!(flows.len(), 2);
        assert!(flows
            .iter()
            .all(|flow| flow.match_fields.in_port == Some(ovs_types::PortNumber::new(9))));
    }

    #[test]
    fn test_uplink_listing_failure_is_not_fatal() {
        let (driver, recorder) = driver();
        let broken = RecordingUplink::new("br-phys", &["eth0"]);
        broken.fail_port_listing(true);
        let mut driver = driver
            .with_uplink(broken.clone())
            .with_uplink(RecordingUplink::new("br-ex", &["eth1"]));
        let port = PortInfo::bound("p1", "tap1", 3);
        let rule = MinimumBandwidthRule {
            id: "m".to_string(),
            direction: Direction::Egress,
            min_kbps: 1000,
        };

        driver.update_minimum_bandwidth(&port, &rule).unwrap();

        assert_eq!(recorder.queue("p1").unwrap().egress_ports, vec!["eth1".to_string()]);
        assert_eq!(broken.queue_requests(), vec![3]);
        assert_eq!(driver.stats().uplink_failures, 1);
    }

    #[test]
    fn test_failed_delete_keeps_snapshot() {
        let (mut driver, recorder) = driver();
        let port = PortInfo::bound("p1", "tap1", 3);
        driver
            .update_bandwidth_limit(&port, &egress_limit(Some(1000), None))
            .unwrap();

        recorder.fail_with(BridgeError::transport("br-int", "connection reset"));
        let result = driver.delete_bandwidth_limit(&port);

        assert!(matches!(result, Err(AgentError::Bridge(_))));
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(driver.index().len(), 1);
    }

    #[test]
    fn test_initialize_failure_keeps_state() {
        let (mut driver, recorder) = driver();
        let port = PortInfo::bound("p1", "tap1", 3);
        driver
            .update_bandwidth_limit(&port, &egress_limit(Some(1000), None))
            .unwrap();

        recorder.fail_with(BridgeError::timeout("br-int"));
        assert!(driver.initialize().is_err());
        assert_eq!(driver.index().len(), 1);
    }
}
