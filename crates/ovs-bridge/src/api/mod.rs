//! Bridge capabilities consumed by the agent.
//!
//! - [`flow`]: rule install/delete and the agent cookie
//! - [`port`]: port-name to port-number lookup
//! - [`qos`]: bandwidth limits and queues
//! - [`uplink`]: physical bridges used for minimum-bandwidth queues

pub mod flow;
pub mod port;
pub mod qos;
pub mod uplink;

pub use flow::FlowApi;
pub use port::PortApi;
pub use qos::QosApi;
pub use uplink::UplinkApi;

/// The integration bridge: everything the pipeline programs and the QoS
/// driver need from a single bridge.
pub trait Bridge: FlowApi + PortApi + QosApi {}

impl<T> Bridge for T where T: FlowApi + PortApi + QosApi {}
