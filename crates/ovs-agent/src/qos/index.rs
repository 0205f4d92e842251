//! Index of policies currently applied to the switch.
//!
//! Entries are keyed by port, rule kind and direction. Lookups never create
//! entries; a delete for a key that was never applied finds nothing.

use super::types::{Direction, PortInfo, RuleKind};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyKey {
    pub port_id: String,
    pub kind: RuleKind,
    pub direction: Direction,
}

impl PolicyKey {
    pub fn new(port_id: impl Into<String>, kind: RuleKind, direction: Direction) -> Self {
        Self {
            port_id: port_id.into(),
            kind,
            direction,
        }
    }
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.port_id, self.kind, self.direction)
    }
}

/// Snapshot of the port binding each applied policy was programmed with.
#[derive(Debug, Clone, Default)]
pub struct AppliedPolicyIndex {
    inner: HashMap<PolicyKey, PortInfo>,
}

impl AppliedPolicyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn contains(&self, key: &PolicyKey) -> bool {
        self.inner.contains_key(key)
    }

    pub fn get(&self, key: &PolicyKey) -> Option<&PortInfo> {
        self.inner.get(key)
    }

    /// Records `port` under `key`, returning the previous snapshot.
    pub fn insert(&mut self, key: PolicyKey, port: PortInfo) -> Option<PortInfo> {
        self.inner.insert(key, port)
    }

    pub fn remove(&mut self, key: &PolicyKey) -> Option<PortInfo> {
        self.inner.remove(key)
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Ids of every port with at least one applied policy, sorted.
    pub fn ports(&self) -> Vec<&str> {
        let ports: BTreeSet<&str> = self.inner.keys().map(|key| key.port_id.as_str()).collect();
        ports.into_iter().collect()
    }

    /// Keys of every policy applied to `port_id`, sorted.
    pub fn policies_for(&self, port_id: &str) -> Vec<&PolicyKey> {
        let mut keys: Vec<_> = self
            .inner
            .keys()
            .filter(|key| key.port_id == port_id)
            .collect();
        keys.sort();
        keys
    }
}
