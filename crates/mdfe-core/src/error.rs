//! # Validation Errors
//!
//! Local, recoverable rejections raised before any gateway call. Each
//! rejection names the field it concerns so the caller can map it back to
//! the form input that produced it. Collections of field errors are
//! reported together: the assembler does not stop at the first problem.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted/indexed path of the field (e.g. `unloading[0].cte_keys[1]`).
    pub field: String,
    /// Human-readable reason.
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// One or more fields failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("validation failed: {}", summarize(.errors))]
pub struct ValidationError {
    errors: Vec<FieldError>,
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    /// A validation error for a single field.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(field, message)],
        }
    }

    /// Build from collected field errors. Returns `None` when the list is
    /// empty, so callers can write `if let Some(err) = ...`.
    pub fn from_fields(errors: Vec<FieldError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    /// All rejected fields, in the order they were found.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Whether the named field is among the rejected ones.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// Re-key every field under a parent path (`issuer` + `cnpj` → `issuer.cnpj`).
    pub fn nested(self, parent: &str) -> Self {
        Self {
            errors: self
                .errors
                .into_iter()
                .map(|e| FieldError {
                    field: format!("{parent}.{}", e.field),
                    message: e.message,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_is_not_an_error() {
        assert!(ValidationError::from_fields(Vec::new()).is_none());
    }

    #[test]
    fn display_lists_every_field() {
        let err = ValidationError::from_fields(vec![
            FieldError::new("route.origin_uf", "required"),
            FieldError::new("totals.value", "must not be negative"),
        ])
        .unwrap();
        let text = err.to_string();
        assert!(text.contains("route.origin_uf: required"));
        assert!(text.contains("totals.value: must not be negative"));
        assert!(err.has_field("totals.value"));
    }

    #[test]
    fn nested_prefixes_field_names() {
        let err = ValidationError::field("cnpj", "invalid check digits").nested("issuer");
        assert_eq!(err.errors()[0].field, "issuer.cnpj");
    }
}
