use serde::Serialize;
use serde_json::Value;
use shared::domain::EntityKind;
use thiserror::Error;
use tracing::warn;

pub const LIST_ERROR_FALLBACK: &str = "An unexpected error occurred loading orders.";
pub const DETAIL_ERROR_FALLBACK: &str = "An unexpected error occurred loading order details.";
pub const MUTATION_ERROR_FALLBACK: &str = "An unexpected error occurred while saving the record.";

/// Errors that can carry a human-readable message supplied by the backing store.
pub trait ErrorDetail: Serialize {
    fn structured_message(&self) -> Option<&str>;
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum QueryError {
    #[error("query transport failure: {reason}")]
    Transport { reason: String },
    #[error("query rejected with status {status}")]
    Rejected { status: u16, body: Option<Value> },
    #[error("malformed query response: {reason}")]
    Decode { reason: String },
}

impl ErrorDetail for QueryError {
    fn structured_message(&self) -> Option<&str> {
        match self {
            Self::Rejected {
                body: Some(body), ..
            } => payload_message(body),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum MutationError {
    #[error("mutation transport failure: {reason}")]
    Transport { reason: String },
    #[error("mutation rejected with status {status}")]
    Rejected {
        status: u16,
        message: Option<String>,
        body: Option<Value>,
    },
    #[error("{kind} records must be created under a parent order")]
    MissingParent { kind: EntityKind },
}

impl ErrorDetail for MutationError {
    fn structured_message(&self) -> Option<&str> {
        match self {
            Self::Rejected { message, body, .. } => message
                .as_deref()
                .or_else(|| body.as_ref().and_then(payload_message)),
            Self::MissingParent { .. } => Some("Line items must be created under an order."),
            Self::Transport { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum EnrichmentError {
    #[error("enrichment transport failure: {reason}")]
    Transport { reason: String },
    #[error("enrichment rejected with status {status}")]
    Rejected { status: u16 },
}

/// Reads `message`, or `body.message`, from an error payload.
pub(crate) fn payload_message(payload: &Value) -> Option<&str> {
    payload
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| {
            payload
                .get("body")
                .and_then(|body| body.get("message"))
                .and_then(Value::as_str)
        })
}

/// Human-readable text for an error: the structured message when present,
/// otherwise the whole error serialized, otherwise `fallback`.
pub fn describe_error<E: ErrorDetail>(err: &E, fallback: &str) -> String {
    if let Some(message) = err
        .structured_message()
        .map(str::trim)
        .filter(|message| !message.is_empty())
    {
        return message.to_string();
    }

    match serde_json::to_string(err) {
        Ok(text) => text,
        Err(source) => {
            warn!(error = %source, "failed to serialize error for display");
            fallback.to_string()
        }
    }
}

#[cfg(test)]
#[path = "tests/error_tests.rs"]
mod tests;
