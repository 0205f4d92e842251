//! Test infrastructure for the OVS QoS agent
//!
//! Provides:
//! - In-memory recording bridges with a simulated flow table
//! - Fault injection for transport and uplink failures
//! - Flow-table verification helpers

mod recording;
mod verification;

pub use recording::{BridgeCall, QueueRecord, RecordingBridge, RecordingUplink, TEST_COOKIE};
pub use verification::{FlowVerifier, VerificationError, VerifyResult};
