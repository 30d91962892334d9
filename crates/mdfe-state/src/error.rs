//! Lifecycle error taxonomy.

use mdfe_core::ValidationError;
use mdfe_gateway::{GatewayError, GatewayOperation};
use thiserror::Error;

use crate::document::{LifecycleEvent, ManifestState};

/// Errors from manifest lifecycle operations.
///
/// On every variant the document is left in the state it had before the
/// call.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// Input rejected before any gateway call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The event is not legal from the current state.
    #[error("invalid transition: {event} from {from}")]
    InvalidTransition {
        from: ManifestState,
        event: LifecycleEvent,
    },

    /// The gateway reported a non-zero result code.
    #[error("gateway {operation} failed with code {code}: {message}")]
    Gateway {
        operation: GatewayOperation,
        code: i32,
        message: String,
    },

    /// The gateway call succeeded but the authority refused the request.
    #[error("authority rejected the request with status {status}: {reason}")]
    AuthorityRejected { status: u16, reason: String },

    /// The gateway call succeeded but its response lacks what the
    /// transition needs.
    #[error("unreadable authority response: {0}")]
    UnreadableResponse(String),

    /// The exclusive gateway section was not acquired before the deadline.
    #[error("gateway busy: gave up after {waited_ms}ms")]
    ConcurrencyTimeout { waited_ms: u64 },
}

/// Result code used for session errors that carry no native code.
pub const SESSION_ERROR_CODE: i32 = -1;

impl LifecycleError {
    /// Map a gateway error raised while performing `operation`.
    pub fn from_gateway(operation: GatewayOperation, err: GatewayError) -> Self {
        match err {
            GatewayError::Failure {
                operation,
                code,
                message,
            } => Self::Gateway {
                operation,
                code,
                message,
            },
            GatewayError::Timeout { waited_ms } => Self::ConcurrencyTimeout { waited_ms },
            other => Self::Gateway {
                operation,
                code: SESSION_ERROR_CODE,
                message: other.to_string(),
            },
        }
    }

    /// Whether a later retry of the same call could succeed.
    ///
    /// Lock timeouts and gateway failures may be transient. The lifecycle
    /// never retries on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Gateway { .. } | Self::ConcurrencyTimeout { .. })
    }
}
