//! Gateway error types.

use crate::config::ConfigError;
use crate::contract::GatewayOperation;

/// Errors from gateway calls and gateway session management.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The gateway returned a non-zero result code.
    #[error("gateway {operation} failed with code {code}: {message}")]
    Failure {
        operation: GatewayOperation,
        code: i32,
        message: String,
    },
    /// A native handle is already initialized in this process.
    #[error("a gateway handle is already initialized in this process")]
    AlreadyInitialized,
    /// A call was issued before `Initialize` or after `Finalize`.
    #[error("gateway is not initialized")]
    NotInitialized,
    /// The exclusive gateway section was not acquired before the deadline.
    #[error("timed out after {waited_ms}ms waiting for the gateway")]
    Timeout { waited_ms: u64 },
    /// Configuration could not be loaded or applied.
    #[error("gateway configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl GatewayError {
    pub(crate) fn failure(
        operation: GatewayOperation,
        code: i32,
        message: impl Into<String>,
    ) -> Self {
        Self::Failure {
            operation,
            code,
            message: message.into(),
        }
    }

    /// The gateway's result code, for [`GatewayError::Failure`].
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Failure { code, .. } => Some(*code),
            _ => None,
        }
    }
}
