use crate::error::AgentResult;
use crate::qos::QosEvent;
use async_trait::async_trait;

/// A feature plugged into the [`AgentDaemon`](super::AgentDaemon).
#[async_trait]
pub trait AgentExtension: Send {
    fn name(&self) -> &str;

    /// Lower values are initialized and receive events first.
    fn priority(&self) -> i32 {
        0
    }

    /// Brings the managed bridges to a known state. Called once before the
    /// first event.
    async fn initialize(&mut self) -> AgentResult<()>;

    async fn handle_event(&mut self, event: &QosEvent) -> AgentResult<()>;

    /// One line per piece of state worth showing when debugging.
    fn dump(&self) -> Vec<String> {
        Vec::new()
    }
}
