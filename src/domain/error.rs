//! API error taxonomy
//!
//! Mirrors the four wire-visible error families: validation (400),
//! missing authentication (401), insufficient role (403) and unknown
//! resource (404). The JSON envelopes are produced in `io::api`.

use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or rule-violating input; carries field-level detail.
    /// Rejected before any event is recorded.
    #[error("validation failed")]
    Validation(Value),

    #[error("authentication required")]
    NotAuthenticated,

    #[error("permission denied")]
    PermissionDenied,

    /// Unknown entity id. The message is for logs only; the wire envelope
    /// is the generic "Recurso no encontrado."
    #[error("not found: {0}")]
    NotFound(String),
}

impl ApiError {
    /// Single-field validation error: {"field": ["message"]}
    pub fn field(field: &str, message: &str) -> Self {
        ApiError::Validation(json!({ field: [message] }))
    }

    /// Non-field (global) validation error
    pub fn non_field(message: &str) -> Self {
        ApiError::Validation(json!({ "non_field_errors": [message] }))
    }
}
