//! Agent error types.

use ovs_bridge::{BridgeError, TableId};
use ovs_types::ParseError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    /// A bridge call failed; not retried here.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Invalid rule {rule_id}: {message}")]
    InvalidRule { rule_id: String, message: String },

    #[error("Invalid address {address}: {message}")]
    InvalidAddress { address: String, message: String },

    /// A goto-table that would loop back or leave the pipeline.
    #[error("Invalid goto from table {from} to table {to}")]
    InvalidGoto { from: TableId, to: TableId },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AgentError {
    pub fn invalid_rule(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        AgentError::InvalidRule {
            rule_id: rule_id.into(),
            message: message.into(),
        }
    }

    pub fn invalid_address(address: impl Into<String>, message: impl Into<String>) -> Self {
        AgentError::InvalidAddress {
            address: address.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        AgentError::Config(message.into())
    }

    /// Transport failures may succeed if the event is replayed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::Bridge(err) => err.is_retryable(),
            _ => false,
        }
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
