//! Minimum-bandwidth queue bookkeeping.
//!
//! Each port holding a minimum-bandwidth guarantee owns one queue number on
//! the integration bridge. Queue 0 is the default queue and is never handed
//! out. Queue numbers follow switch port numbers, so a number still held by
//! another port belongs to a port that left without a delete and is taken
//! over.

use crate::error::{AgentError, AgentResult};
use ovs_bridge::QosApi;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, warn};

/// A queue as last programmed for a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueAllocation {
    pub queue_num: u32,
    pub min_kbps: u64,
    pub egress_ports: Vec<String>,
    /// QoS object the queue was attached to.
    pub qos_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct QueueAllocator {
    by_port: HashMap<String, QueueAllocation>,
}

impl QueueAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, port_id: &str) -> Option<&QueueAllocation> {
        self.by_port.get(port_id)
    }

    pub fn len(&self) -> usize {
        self.by_port.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_port.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_port.clear();
    }

    fn other_owner_of(&self, queue_num: u32, port_id: &str) -> Option<String> {
        self.by_port
            .iter()
            .find(|(owner, alloc)| alloc.queue_num == queue_num && owner.as_str() != port_id)
            .map(|(owner, _)| owner.clone())
    }

    /// Creates or updates the queue of `port_id`.
    ///
    /// Fails without touching the bridge when `queue_num` is 0. A queue held
    /// by another port is deleted from the bridge and reassigned.
    pub fn provision<B: QosApi + ?Sized>(
        &mut self,
        bridge: &mut B,
        port_id: &str,
        queue_num: u32,
        min_kbps: u64,
        egress_ports: Vec<String>,
    ) -> AgentResult<&QueueAllocation> {
        if queue_num == 0 {
            return Err(AgentError::invalid_rule(
                port_id,
                "queue 0 is reserved for the default queue",
            ));
        }
        if let Some(stale) = self.other_owner_of(queue_num, port_id) {
            warn!(
                port_id,
                stale_port_id = %stale,
                queue_num,
                "queue held by a departed port, taking it over"
            );
            bridge.delete_queue(&stale)?;
            self.by_port.remove(&stale);
        }

        let qos_id = bridge.create_or_update_queue(port_id, queue_num, min_kbps, &egress_ports)?;
        debug!(port_id, queue_num, min_kbps, %qos_id, "queue provisioned");

        let alloc = QueueAllocation {
            queue_num,
            min_kbps,
            egress_ports,
            qos_id,
        };
        Ok(match self.by_port.entry(port_id.to_string()) {
            Entry::Occupied(mut slot) => {
                slot.insert(alloc);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(alloc),
        })
    }

    /// Deletes the queue of `port_id`. Returns false, without a bridge call,
    /// when the port holds no queue.
    pub fn release<B: QosApi + ?Sized>(&mut self, bridge: &mut B, port_id: &str) -> AgentResult<bool> {
        if !self.by_port.contains_key(port_id) {
            return Ok(false);
        }
        bridge.delete_queue(port_id)?;
        self.by_port.remove(port_id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovs_agent_test::{BridgeCall, QueueRecord, RecordingBridge};
    use ovs_bridge::BridgeError;
    use pretty_assertions::assert_eq;

    fn ports(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_provision_and_update_in_place() {
        let mut bridge = RecordingBridge::new();
        let mut queues = QueueAllocator::new();

        queues
            .provision(&mut bridge, "p1", 5, 1000, ports(&["eth0"]))
            .unwrap();
        let alloc = queues
            .provision(&mut bridge, "p1", 5, 2000, ports(&["eth0", "eth1"]))
            .unwrap();

        assert_eq!(alloc.min_kbps, 2000);
        assert_eq!(alloc.qos_id, "qos-br-int");
        assert_eq!(queues.len(), 1);
        assert_eq!(
            bridge.queue("p1"),
            Some(QueueRecord {
                queue_num: 5,
                min_kbps: 2000,
                egress_ports: ports(&["eth0", "eth1"]),
            })
        );
    }

    #[test]
    fn test_queue_zero_is_rejected() {
        let mut bridge = RecordingBridge::new();
        let mut queues = QueueAllocator::new();

        let result = queues.provision(&mut bridge, "p1", 0, 1000, vec![]);

        assert!(matches!(result, Err(AgentError::InvalidRule { .. })));
        assert!(bridge.calls().is_empty());
        assert!(queues.is_empty());
    }

    #[test]
    fn test_reused_queue_number_is_taken_over() {
        let mut bridge = RecordingBridge::new();
        let mut queues = QueueAllocator::new();
        queues.provision(&mut bridge, "p1", 5, 1000, vec![]).unwrap();
        bridge.clear_calls();

        let alloc = queues
            .provision(&mut bridge, "p2", 5, 3000, ports(&["eth0"]))
            .unwrap();

        assert_eq!(alloc.queue_num, 5);
        assert_eq!(
            bridge.calls(),
            vec![
                BridgeCall::DeleteQueue {
                    port_id: "p1".to_string()
                },
                BridgeCall::CreateOrUpdateQueue {
                    port_id: "p2".to_string(),
                    queue_num: 5,
                    min_kbps: 3000,
                    egress_ports: ports(&["eth0"]),
                },
            ]
        );
        assert!(queues.get("p1").is_none());
        assert_eq!(queues.len(), 1);
        assert_eq!(bridge.queue("p1"), None);
    }

    #[test]
    fn test_failed_takeover_keeps_previous_owner() {
        let mut bridge = RecordingBridge::new();
        let mut queues = QueueAllocator::new();
        queues.provision(&mut bridge, "p1", 5, 1000, vec![]).unwrap();

        bridge.fail_with(BridgeError::timeout("br-int"));
        assert!(queues.provision(&mut bridge, "p2", 5, 1000, vec![]).is_err());

        assert!(queues.get("p1").is_some());
        assert!(queues.get("p2").is_none());
    }

    #[test]
    fn test_release_unknown_port_makes_no_call() {
        let mut bridge = RecordingBridge::new();
        let mut queues = QueueAllocator::new();

        assert_eq!(queues.release(&mut bridge, "p1"), Ok(false));
        assert!(bridge.calls().is_empty());

        queues.provision(&mut bridge, "p1", 5, 1000, vec![]).unwrap();
        assert_eq!(queues.release(&mut bridge, "p1"), Ok(true));
        assert_eq!(
            bridge.calls().last(),
            Some(&BridgeCall::DeleteQueue {
                port_id: "p1".to_string()
            })
        );
        assert!(queues.is_empty());
    }

    #[test]
    fn test_failed_release_keeps_allocation() {
        let mut bridge = RecordingBridge::new();
        let mut queues = QueueAllocator::new();
        queues.provision(&mut bridge, "p1", 5, 1000, vec![]).unwrap();

        bridge.fail_with(BridgeError::transport("br-int", "connection reset"));
        assert!(queues.release(&mut bridge, "p1").is_err());
        assert!(queues.get("p1").is_some());
    }
}
