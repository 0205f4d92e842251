//! Assertion helpers over a flow-table snapshot.

use ovs_bridge::{Flow, FlowMatch, Priority, TableId};
use ovs_types::PortNumber;
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Expected rule table={table} priority={priority} match={match_fields} not found")]
    FlowNotFound {
        table: TableId,
        priority: Priority,
        match_fields: String,
    },

    #[error("Unexpected rule present: table={table} priority={priority} match={match_fields}")]
    UnexpectedFlow {
        table: TableId,
        priority: Priority,
        match_fields: String,
    },

    #[error("Expected {expected} rules in table {table}, found {actual}")]
    TableCountMismatch {
        table: TableId,
        expected: usize,
        actual: usize,
    },

    #[error("Port {port} still has {count} rules in table {table}")]
    PortFlowsRemain {
        port: PortNumber,
        table: TableId,
        count: usize,
    },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Checks against a snapshot of rules, e.g. `RecordingBridge::flows()`.
pub struct FlowVerifier<'a> {
    flows: &'a [Flow],
}

impl<'a> FlowVerifier<'a> {
    pub fn new(flows: &'a [Flow]) -> Self {
        Self { flows }
    }

    fn find(&self, table: TableId, priority: Priority, match_fields: &FlowMatch) -> Option<&'a Flow> {
        self.flows
            .iter()
            .find(|flow| flow.key() == (table, priority, match_fields))
    }

    /// Rule with exactly this key exists; returns it for further checks.
    pub fn assert_flow(
        &self,
        table: TableId,
        priority: Priority,
        match_fields: &FlowMatch,
    ) -> VerifyResult<&'a Flow> {
        self.find(table, priority, match_fields)
            .ok_or_else(|| VerificationError::FlowNotFound {
                table,
                priority,
                match_fields: match_fields.to_string(),
            })
    }

    pub fn assert_no_flow(
        &self,
        table: TableId,
        priority: Priority,
        match_fields: &FlowMatch,
    ) -> VerifyResult<()> {
        match self.find(table, priority, match_fields) {
            Some(_) => Err(VerificationError::UnexpectedFlow {
                table,
                priority,
                match_fields: match_fields.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn assert_table_count(&self, table: TableId, expected: usize) -> VerifyResult<()> {
        let actual = self.in_table(table).len();
        if actual != expected {
            return Err(VerificationError::TableCountMismatch {
                table,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// No rule in `table` matches on `in_port == port`.
    pub fn assert_no_flows_for_port(&self, table: TableId, port: PortNumber) -> VerifyResult<()> {
        let count = self
            .in_table(table)
            .iter()
            .filter(|flow| flow.match_fields.in_port == Some(port))
            .count();
        if count > 0 {
            return Err(VerificationError::PortFlowsRemain { port, table, count });
        }
        Ok(())
    }

    pub fn in_table(&self, table: TableId) -> Vec<&'a Flow> {
        self.flows.iter().filter(|flow| flow.table == table).collect()
    }
}
