//! OVS QoS Agent - integration bridge pipeline and per-port QoS
//!
//! Programs the multi-table OpenFlow pipeline of an Open vSwitch integration
//! bridge and reconciles per-port QoS policy (bandwidth limits, DSCP marking,
//! minimum-bandwidth queues) against it.
//!
//! # Architecture
//!
//! ```text
//! [policy events] ──> [AgentDaemon] ──> [QosExtension] ──> [QosDriver]
//!                                                             │
//!                          ┌──────────────────────────────────┤
//!                          ↓                                  ↓
//!                 [IntegrationBridge] ──> [br-int]      [physical bridges]
//! ```
//!
//! # Key Components
//!
//! - [`tables`]: table ids, priorities and goto validation
//! - [`br_int`]: pipeline programs (default tables, VLAN, DVR, anti-spoofing, DSCP)
//! - [`qos`]: policy types, the reconciler and its bookkeeping
//! - [`daemon`]: event loop hosting the extensions
//! - [`config`]: YAML configuration
//! - [`audit`]: audit records and logging setup

pub mod audit;
pub mod br_int;
pub mod config;
pub mod daemon;
pub mod error;
pub mod qos;
pub mod tables;

pub use br_int::{DefaultTableOptions, IntegrationBridge};
pub use config::{AgentConfig, LogFormat, PhysicalBridgeConfig};
pub use daemon::{AgentDaemon, AgentExtension, DaemonStats};
pub use error::{AgentError, AgentResult};
pub use qos::{QosDriver, QosEvent, QosExtension};
