//! AgentDaemon implementation.
//!
//! The daemon owns every registered extension and applies policy events to
//! them one at a time, in arrival order. Extensions are visited in priority
//! order for each event.

use super::AgentExtension;
use crate::audit::{AuditCategory, AuditOutcome, AuditRecord};
use crate::audit_log;
use crate::error::AgentResult;
use crate::qos::QosEvent;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonStats {
    pub events_processed: u64,
    pub events_failed: u64,
    /// Failures a replay of the event might fix.
    pub retryable_failures: u64,
}

pub struct AgentDaemon {
    extensions: BTreeMap<i32, Vec<Box<dyn AgentExtension>>>,
    stop: Arc<Notify>,
    running: bool,
    stats: DaemonStats,
}

impl Default for AgentDaemon {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentDaemon {
    pub fn new() -> Self {
        Self {
            extensions: BTreeMap::new(),
            stop: Arc::new(Notify::new()),
            running: false,
            stats: DaemonStats::default(),
        }
    }

    pub fn register_extension(&mut self, extension: Box<dyn AgentExtension>) {
        let priority = extension.priority();
        let name = extension.name().to_string();
        info!("Registering {} with priority {}", name, priority);

        audit_log!(AuditRecord::new(
            AuditCategory::ResourceCreate,
            "AgentDaemon",
            "register_extension",
        )
        .with_outcome(AuditOutcome::Success)
        .with_object_id(&name)
        .with_object_type("extension")
        .with_details(serde_json::json!({ "priority": priority })));

        self.extensions.entry(priority).or_default().push(extension);
    }

    pub fn extension_count(&self) -> usize {
        self.extensions.values().map(Vec::len).sum()
    }

    pub fn stats(&self) -> &DaemonStats {
        &self.stats
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Handle that ends [`run`](Self::run) when notified.
    pub fn stop_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.stop)
    }

    /// Initializes every extension in priority order, stopping at the first
    /// failure.
    pub async fn init(&mut self) -> AgentResult<()> {
        info!("Initializing {} extensions", self.extension_count());
        for extension in self.extensions.values_mut().flatten() {
            if let Err(err) = extension.initialize().await {
                audit_log!(AuditRecord::new(
                    AuditCategory::SystemLifecycle,
                    "AgentDaemon",
                    "initialize",
                )
                .with_object_id(extension.name())
                .with_error(err.to_string()));
                return Err(err);
            }
        }

        audit_log!(
            AuditRecord::new(AuditCategory::SystemLifecycle, "AgentDaemon", "initialize")
                .with_outcome(AuditOutcome::Success)
                .with_details(serde_json::json!({ "extensions": self.extension_count() }))
        );
        Ok(())
    }

    /// Applies events from `events` until the channel closes or the stop
    /// handle is notified.
    ///
    /// A failed event is logged and counted; later events are still applied.
    pub async fn run(&mut self, mut events: mpsc::Receiver<QosEvent>) -> DaemonStats {
        info!("Starting event loop");
        self.running = true;
        audit_log!(
            AuditRecord::new(AuditCategory::SystemLifecycle, "AgentDaemon", "event_loop_started")
                .with_outcome(AuditOutcome::Success)
        );

        let stop = Arc::clone(&self.stop);
        loop {
            let event = tokio::select! {
                event = events.recv() => event,
                _ = stop.notified() => {
                    debug!("stop requested");
                    None
                }
            };
            let Some(event) = event else {
                break;
            };
            self.dispatch(&event).await;
        }

        self.running = false;
        info!(
            processed = self.stats.events_processed,
            failed = self.stats.events_failed,
            "Event loop stopped"
        );
        audit_log!(
            AuditRecord::new(AuditCategory::SystemLifecycle, "AgentDaemon", "event_loop_stopped")
                .with_outcome(AuditOutcome::Success)
                .with_details(serde_json::json!({
                    "events_processed": self.stats.events_processed,
                    "events_failed": self.stats.events_failed,
                }))
        );
        self.stats.clone()
    }

    async fn dispatch(&mut self, event: &QosEvent) {
        let mut failed = false;
        for extension in self.extensions.values_mut().flatten() {
            if let Err(err) = extension.handle_event(event).await {
                warn!(
                    extension = extension.name(),
                    op = event.op(),
                    port_id = %event.port().port_id,
                    retryable = err.is_retryable(),
                    error = %err,
                    "event failed"
                );
                if err.is_retryable() {
                    self.stats.retryable_failures = self.stats.retryable_failures.saturating_add(1);
                }
                failed = true;
            }
        }
        self.stats.events_processed = self.stats.events_processed.saturating_add(1);
        if failed {
            self.stats.events_failed = self.stats.events_failed.saturating_add(1);
        }
    }

    /// Requests the event loop to stop after the current event.
    pub fn stop(&self) {
        info!("Stopping AgentDaemon");
        self.stop.notify_one();
    }

    pub fn dump(&self) -> Vec<String> {
        let mut lines = vec![format!("AgentDaemon running: {}", self.running)];
        for (priority, extensions) in &self.extensions {
            for extension in extensions {
                lines.push(format!("  [{:3}] {}", priority, extension.name()));
                lines.extend(extension.dump().into_iter().map(|line| format!("        {}", line)));
            }
        }
        lines
    }
}
