//! Event loop hosting the agent extensions.

mod agentdaemon;
mod events;
mod extension;

pub use agentdaemon::{AgentDaemon, DaemonStats};
pub use events::read_events;
pub use extension::AgentExtension;
