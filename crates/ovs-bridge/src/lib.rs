//! Abstract Open vSwitch bridge interface.
//!
//! The agent never talks to a switch directly. It programs rules and QoS
//! objects through the traits in [`api`], which a transport (OpenFlow channel
//! plus switch database client) implements.
//!
//! - [`flow`]: rule, match and action types
//! - [`api`]: the capabilities a bridge exposes
//! - [`error`]: [`BridgeError`] and [`BridgeResult`]
//! - [`dry_run`]: logging bridges for running without a switch
//!
//! ```
//! use ovs_bridge::{Action, Cookie, Flow, FlowMatch, TableId};
//!
//! let flow = Flow::new(Cookie::new(1), TableId::new(60), 3, FlowMatch::new())
//!     .apply_actions(vec![Action::normal()]);
//! assert_eq!(flow.actions(), &[Action::normal()]);
//! ```

pub mod api;
pub mod dry_run;
pub mod error;
pub mod flow;

pub use api::{Bridge, FlowApi, PortApi, QosApi, UplinkApi};
pub use dry_run::{DryRunBridge, DryRunUplink};
pub use error::{BridgeError, BridgeResult};
pub use flow::{
    Action, Cookie, Flow, FlowFilter, FlowMatch, Instruction, OutputPort, Priority, SetField,
    TableId,
};
