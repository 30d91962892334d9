//! # Service Error Types
//!
//! Every façade operation fails with a single [`ServiceError`] carrying a
//! stable machine-readable code and a human-readable message. The
//! serialized form is [`ErrorBody`]; `details` holds the structured context
//! (rejected fields, gateway code, authority status, manifest id).

use mdfe_core::ValidationError;
use mdfe_state::LifecycleError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Structured error response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Façade-level error.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Request input rejected before any manifest was touched.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A lifecycle operation failed. `manifest_id` names the registered
    /// manifest it ran on, when there is one; its state is unchanged.
    #[error("{source}")]
    Lifecycle {
        manifest_id: Option<Uuid>,
        source: LifecycleError,
    },

    /// No registered manifest matches the request.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<LifecycleError> for ServiceError {
    fn from(source: LifecycleError) -> Self {
        Self::Lifecycle {
            manifest_id: None,
            source,
        }
    }
}

impl ServiceError {
    pub(crate) fn lifecycle(manifest_id: Uuid, source: LifecycleError) -> Self {
        Self::Lifecycle {
            manifest_id: Some(manifest_id),
            source,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Lifecycle { source, .. } => match source {
                LifecycleError::Validation(_) => "VALIDATION_ERROR",
                LifecycleError::InvalidTransition { .. } => "INVALID_TRANSITION",
                LifecycleError::Gateway { .. } => "GATEWAY_FAILURE",
                LifecycleError::AuthorityRejected { .. } => "AUTHORITY_REJECTED",
                LifecycleError::UnreadableResponse(_) => "UNREADABLE_RESPONSE",
                LifecycleError::ConcurrencyTimeout { .. } => "CONCURRENCY_TIMEOUT",
            },
        }
    }

    /// Whether the caller may retry the same request later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Lifecycle { source, .. } if source.is_transient())
    }

    /// Structured context for the error body.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::Validation(v) => Some(json!({ "fields": v.errors() })),
            Self::NotFound(_) => None,
            Self::Lifecycle {
                manifest_id,
                source,
            } => {
                let mut details = Map::new();
                if let Some(id) = manifest_id {
                    details.insert("manifest_id".into(), json!(id));
                }
                match source {
                    LifecycleError::Validation(v) => {
                        details.insert("fields".into(), json!(v.errors()));
                    }
                    LifecycleError::InvalidTransition { from, event } => {
                        details.insert("state".into(), json!(from.to_string()));
                        details.insert("event".into(), json!(event.to_string()));
                    }
                    LifecycleError::Gateway {
                        operation, code, ..
                    } => {
                        details.insert("operation".into(), json!(operation.to_string()));
                        details.insert("gateway_code".into(), json!(code));
                    }
                    LifecycleError::AuthorityRejected { status, reason } => {
                        details.insert("authority_status".into(), json!(status));
                        details.insert("authority_reason".into(), json!(reason));
                    }
                    LifecycleError::ConcurrencyTimeout { waited_ms } => {
                        details.insert("waited_ms".into(), json!(waited_ms));
                    }
                    LifecycleError::UnreadableResponse(_) => {}
                }
                (!details.is_empty()).then(|| Value::Object(details))
            }
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details: self.details(),
            },
        }
    }
}
