//! Bridge error types.
//!
//! Every capability in [`crate::api`] reports failures through [`BridgeError`].
//! Callers decide whether to retry via [`BridgeError::is_retryable`].

use thiserror::Error;

/// Error type for bridge operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The control channel to the switch failed.
    #[error("Transport failure on {bridge}: {message}")]
    Transport { bridge: String, message: String },

    /// The switch did not answer in time.
    #[error("Timed out waiting for {bridge}")]
    Timeout { bridge: String },

    /// The named port is not attached to the bridge.
    #[error("Port not found: {port}")]
    PortNotFound { port: String },

    /// The switch rejected a parameter.
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// The switch does not support the requested feature.
    #[error("Feature not supported: {feature}")]
    NotSupported { feature: String },

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BridgeError {
    pub fn transport(bridge: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::Transport {
            bridge: bridge.into(),
            message: message.into(),
        }
    }

    pub fn timeout(bridge: impl Into<String>) -> Self {
        BridgeError::Timeout {
            bridge: bridge.into(),
        }
    }

    pub fn port_not_found(port: impl Into<String>) -> Self {
        BridgeError::PortNotFound { port: port.into() }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        BridgeError::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn not_supported(feature: impl Into<String>) -> Self {
        BridgeError::NotSupported {
            feature: feature.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        BridgeError::Internal {
            message: message.into(),
        }
    }

    /// Returns true if the same request may succeed when re-sent.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::Transport { .. } | BridgeError::Timeout { .. }
        )
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
