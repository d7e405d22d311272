use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
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

#[derive(Debug, Error)]
pub enum EquityEngineError {
    #[error("Validation failed: {}", summarize(.0))]
    Validation(Vec<FieldError>),

    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Malformed request: {0}")]
    Serialization(String),

    #[error("Financial impossibility: {0}")]
    FinancialImpossibility(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Computation cancelled before completion")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<serde_json::Error> for EquityEngineError {
    fn from(e: serde_json::Error) -> Self {
        EquityEngineError::Serialization(e.to_string())
    }
}

/// Error taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    CalculationError,
    InternalError,
}

/// Serializable error shape returned across the request boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<FieldError>,
}

pub const INTERNAL_ERROR_MESSAGE: &str = "An internal error occurred";

impl EquityEngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EquityEngineError::Validation(_)
            | EquityEngineError::InvalidInput { .. }
            | EquityEngineError::Serialization(_) => ErrorCode::ValidationError,
            EquityEngineError::FinancialImpossibility(_)
            | EquityEngineError::DivisionByZero { .. }
            | EquityEngineError::InsufficientData(_)
            | EquityEngineError::Cancelled => ErrorCode::CalculationError,
            EquityEngineError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Field-level detail list. Single-field errors are expanded into one entry.
    pub fn details(&self) -> Vec<FieldError> {
        match self {
            EquityEngineError::Validation(errors) => errors.clone(),
            EquityEngineError::InvalidInput { field, reason } => {
                vec![FieldError::new(field.clone(), reason.clone())]
            }
            _ => Vec::new(),
        }
    }

    /// Convert into the caller-facing shape. Internal causes are logged, never exposed.
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            EquityEngineError::Internal(cause) => {
                log::error!("internal error: {cause}");
                INTERNAL_ERROR_MESSAGE.to_string()
            }
            other => other.to_string(),
        };
        ErrorResponse {
            code: self.code(),
            message,
            details: self.details(),
        }
    }
}

impl From<&EquityEngineError> for ErrorResponse {
    fn from(e: &EquityEngineError) -> Self {
        e.to_response()
    }
}
