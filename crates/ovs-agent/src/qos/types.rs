//! QoS policy rules, port bindings and upstream events.

use crate::error::{AgentError, AgentResult};
use ovs_types::PortNumber;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Share of `max_kbps` used as burst when a rule leaves burst unset.
pub const DEFAULT_BURST_PERCENT: u64 = 80;

/// Traffic direction as seen from the VM.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Egress,
    Ingress,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Egress => "egress",
            Direction::Ingress => "ingress",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "egress" => Ok(Direction::Egress),
            "ingress" => Ok(Direction::Ingress),
            _ => Err(AgentError::invalid_rule(s, "unknown direction")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    BandwidthLimit,
    DscpMarking,
    MinimumBandwidth,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::BandwidthLimit => "bandwidth_limit",
            RuleKind::DscpMarking => "dscp_marking",
            RuleKind::MinimumBandwidth => "minimum_bandwidth",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Switch-side binding of an orchestration port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VifPort {
    pub port_name: String,
    pub ofport: PortNumber,
}

/// An orchestration port as carried by a policy event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    pub port_id: String,
    /// `None` when the port is not (or no longer) plugged into the bridge.
    #[serde(default)]
    pub vif_port: Option<VifPort>,
}

impl PortInfo {
    pub fn bound(port_id: impl Into<String>, port_name: impl Into<String>, ofport: u32) -> Self {
        Self {
            port_id: port_id.into(),
            vif_port: Some(VifPort {
                port_name: port_name.into(),
                ofport: PortNumber::new(ofport),
            }),
        }
    }

    pub fn unbound(port_id: impl Into<String>) -> Self {
        Self {
            port_id: port_id.into(),
            vif_port: None,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.vif_port.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthLimitRule {
    pub id: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub max_kbps: Option<u64>,
    #[serde(default)]
    pub max_burst_kbps: Option<u64>,
}

impl BandwidthLimitRule {
    /// Burst for egress shaping: the configured value, or
    /// [`DEFAULT_BURST_PERCENT`] of the rate when unset or zero.
    pub fn egress_burst_kbps(&self, max_kbps: u64) -> u64 {
        match self.max_burst_kbps {
            Some(burst) if burst > 0 => burst,
            _ => max_kbps.saturating_mul(DEFAULT_BURST_PERCENT) / 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DscpMarkingRule {
    pub id: String,
    pub dscp_mark: u8,
}

impl DscpMarkingRule {
    pub fn validate(&self) -> AgentResult<()> {
        if self.dscp_mark > crate::br_int::dscp::MAX_DSCP {
            return Err(AgentError::invalid_rule(
                &self.id,
                format!("dscp mark {} out of range 0-63", self.dscp_mark),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimumBandwidthRule {
    pub id: String,
    #[serde(default)]
    pub direction: Direction,
    pub min_kbps: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QosRule {
    BandwidthLimit(BandwidthLimitRule),
    DscpMarking(DscpMarkingRule),
    MinimumBandwidth(MinimumBandwidthRule),
}

impl QosRule {
    pub fn kind(&self) -> RuleKind {
        match self {
            QosRule::BandwidthLimit(_) => RuleKind::BandwidthLimit,
            QosRule::DscpMarking(_) => RuleKind::DscpMarking,
            QosRule::MinimumBandwidth(_) => RuleKind::MinimumBandwidth,
        }
    }

    /// DSCP marking only applies to egress.
    pub fn direction(&self) -> Direction {
        match self {
            QosRule::BandwidthLimit(rule) => rule.direction,
            QosRule::DscpMarking(_) => Direction::Egress,
            QosRule::MinimumBandwidth(rule) => rule.direction,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            QosRule::BandwidthLimit(rule) => &rule.id,
            QosRule::DscpMarking(rule) => &rule.id,
            QosRule::MinimumBandwidth(rule) => &rule.id,
        }
    }
}

/// Policy change delivered by the orchestration layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum QosEvent {
    Create {
        port: PortInfo,
        rule: QosRule,
    },
    Update {
        port: PortInfo,
        rule: QosRule,
    },
    Delete {
        port: PortInfo,
        kind: RuleKind,
        #[serde(default)]
        direction: Direction,
    },
}

impl QosEvent {
    pub fn port(&self) -> &PortInfo {
        match self {
            QosEvent::Create { port, .. }
            | QosEvent::Update { port, .. }
            | QosEvent::Delete { port, .. } => port,
        }
    }

    pub fn op(&self) -> &'static str {
        match self {
            QosEvent::Create { .. } => "create",
            QosEvent::Update { .. } => "update",
            QosEvent::Delete { .. } => "delete",
        }
    }
}
