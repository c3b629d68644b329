//! Error handling for the goods service.
//!
//! This module provides:
//! - A single error type with context and chaining
//! - HTTP status code mapping for API responses
//! - The structured `{code, message, details}` body existing clients parse
//! - Severity-aware logging and an error counter
//!
//! # Usage
//!
//! ```rust,ignore
//! use goods_core::error::{GoodsError, Result};
//!
//! fn load(id: i64) -> Result<Good> {
//!     find_row(id)?.ok_or_else(|| GoodsError::not_found("Good", id.to_string()))
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

// ═══════════════════════════════════════════════════════════════════════════════
// Result Type Alias
// ═══════════════════════════════════════════════════════════════════════════════

/// A specialized Result type for goods operations.
pub type Result<T> = std::result::Result<T, GoodsError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Error Codes
// ═══════════════════════════════════════════════════════════════════════════════

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Database Errors (2000-2099)
    DatabaseError,
    DatabaseConnectionFailed,
    DatabaseQueryFailed,
    RecordNotFound,
    SerializationConflict,

    // Cache Errors (2100-2199)
    CacheError,
    CacheConnectionFailed,

    // Serialization Errors (2200-2299)
    SerializationError,
    DeserializationError,
    InvalidJson,

    // Event Pipeline Errors (3000-3099)
    EventBusError,
    EventBusUnavailable,
    SinkUnavailable,

    // Validation Errors (4100-4199)
    ValidationError,

    // Configuration Errors (5000-5099)
    ConfigurationError,

    // Internal Errors (9000-9099)
    InternalError,
}

impl ErrorCode {
    /// Get the numeric code for this error.
    pub const fn numeric_code(&self) -> u32 {
        match self {
            Self::DatabaseError => 2000,
            Self::DatabaseConnectionFailed => 2001,
            Self::DatabaseQueryFailed => 2002,
            Self::RecordNotFound => 2004,
            Self::SerializationConflict => 2005,

            Self::CacheError => 2100,
            Self::CacheConnectionFailed => 2101,

            Self::SerializationError => 2200,
            Self::DeserializationError => 2201,
            Self::InvalidJson => 2202,

            Self::EventBusError => 3000,
            Self::EventBusUnavailable => 3001,
            Self::SinkUnavailable => 3003,

            Self::ValidationError => 4100,

            Self::ConfigurationError => 5000,

            Self::InternalError => 9000,
        }
    }

    /// Code carried in the HTTP error body.
    ///
    /// Clients of the goods API only distinguish four outcomes, so the
    /// response code is deliberately coarser than [`Self::numeric_code`].
    pub const fn response_code(&self) -> u32 {
        match self {
            Self::ValidationError => 1,
            Self::RecordNotFound => 3,
            Self::SerializationConflict => 4,
            _ => 2,
        }
    }

    /// Message key carried in the HTTP error body.
    pub const fn message_key(&self) -> &'static str {
        match self {
            Self::ValidationError => "errors.validation.failed",
            Self::RecordNotFound => "errors.common.notFound",
            Self::SerializationConflict => "errors.common.conflict",
            _ => "errors.internal",
        }
    }

    /// Get the HTTP status code for this error.
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::RecordNotFound => StatusCode::NOT_FOUND,

            Self::ValidationError => StatusCode::BAD_REQUEST,

            Self::SerializationConflict => StatusCode::CONFLICT,

            Self::DatabaseConnectionFailed
            | Self::CacheConnectionFailed
            | Self::EventBusUnavailable
            | Self::SinkUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            Self::DatabaseError
            | Self::DatabaseQueryFailed
            | Self::CacheError
            | Self::SerializationError
            | Self::DeserializationError
            | Self::InvalidJson
            | Self::EventBusError
            | Self::ConfigurationError
            | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error is retryable.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DatabaseConnectionFailed
                | Self::SerializationConflict
                | Self::CacheConnectionFailed
                | Self::CacheError
                | Self::EventBusUnavailable
                | Self::SinkUnavailable
        )
    }

    /// Get the error category for grouping.
    pub const fn category(&self) -> &'static str {
        match self.numeric_code() {
            2000..=2099 => "database",
            2100..=2199 => "cache",
            2200..=2299 => "serialization",
            3000..=3099 => "event_pipeline",
            4100..=4199 => "validation",
            5000..=5099 => "configuration",
            9000..=9099 => "internal",
            _ => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Severity
// ═══════════════════════════════════════════════════════════════════════════════

/// Severity level for errors (affects logging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Caller errors (bad input, missing rows)
    Low,
    /// Transient conditions (conflicts, cache hiccups)
    Medium,
    /// System errors (query failures, sink failures)
    High,
    /// Infrastructure unreachable
    Critical,
}

impl ErrorSeverity {
    /// Get severity based on error code.
    pub fn from_code(code: &ErrorCode) -> Self {
        match code {
            ErrorCode::ValidationError | ErrorCode::RecordNotFound => {
                Self::Low
            }

            ErrorCode::SerializationConflict
            | ErrorCode::CacheError
            | ErrorCode::CacheConnectionFailed
            | ErrorCode::EventBusError => Self::Medium,

            ErrorCode::DatabaseConnectionFailed
            | ErrorCode::EventBusUnavailable
            | ErrorCode::SinkUnavailable => Self::Critical,

            _ => Self::High,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Error Details
// ═══════════════════════════════════════════════════════════════════════════════

/// Additional structured details for errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Related entity type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Related entity ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Additional context
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub context: HashMap<String, serde_json::Value>,
}

impl ErrorDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Error Type
// ═══════════════════════════════════════════════════════════════════════════════

/// The main error type for the goods service.
///
/// Carries a machine-readable code, a client-safe message, an optional
/// internal message for logs, and the source error when there is one.
#[derive(Error, Debug)]
pub struct GoodsError {
    /// Machine-readable error code
    code: ErrorCode,

    /// User-friendly error message (safe to expose to clients)
    user_message: Cow<'static, str>,

    /// Detailed internal message
    internal_message: Option<String>,

    /// Additional structured details
    details: ErrorDetails,

    /// The source error that caused this error
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl fmt::Display for GoodsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.user_message)?;
        if let Some(ref internal) = self.internal_message {
            write!(f, " (internal: {})", internal)?;
        }
        Ok(())
    }
}

impl GoodsError {
    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new error with code and user message.
    pub fn new(code: ErrorCode, user_message: impl Into<Cow<'static, str>>) -> Self {
        let error = Self {
            code,
            user_message: user_message.into(),
            internal_message: None,
            details: ErrorDetails::default(),
            source: None,
        };
        error.record_metrics();
        error
    }

    /// Create an error with both user and internal messages.
    pub fn with_internal(
        code: ErrorCode,
        user_message: impl Into<Cow<'static, str>>,
        internal_message: impl Into<String>,
    ) -> Self {
        let mut error = Self::new(code, user_message);
        error.internal_message = Some(internal_message.into());
        error
    }

    /// Create an internal error (500).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_internal(ErrorCode::InternalError, "An internal error occurred", message)
    }

    /// Create a not found error.
    pub fn not_found(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        let entity_type = entity_type.into();
        let entity_id = entity_id.into();
        Self::new(
            ErrorCode::RecordNotFound,
            format!("{} not found: {}", entity_type, entity_id),
        )
        .with_details(ErrorDetails::new().with_entity(&entity_type, &entity_id))
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::with_internal(
            ErrorCode::ConfigurationError,
            "Invalid configuration",
            message,
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder Methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Add error details.
    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = details;
        self
    }

    /// Add context to details.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.context.insert(key.into(), v);
        }
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the user-friendly message.
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// Get the internal message (if any).
    pub fn internal_message(&self) -> Option<&str> {
        self.internal_message.as_deref()
    }

    /// Get the error details.
    pub fn details(&self) -> &ErrorDetails {
        &self.details
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// True for serialization failures reported by a SERIALIZABLE transaction.
    pub fn is_conflict(&self) -> bool {
        self.code == ErrorCode::SerializationConflict
    }

    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::from_code(&self.code)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Logging
    // ─────────────────────────────────────────────────────────────────────────

    /// Log this error with appropriate severity.
    pub fn log(&self) {
        let code = self.code.to_string();
        let category = self.code.category();
        let status = self.http_status().as_u16();

        match self.severity() {
            ErrorSeverity::Critical | ErrorSeverity::High => {
                error!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    internal_message = ?self.internal_message,
                    source = ?self.source,
                    "Request failed"
                );
            }
            ErrorSeverity::Medium => {
                warn!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Request failed"
                );
            }
            ErrorSeverity::Low => {
                tracing::debug!(
                    error_code = %code,
                    category = category,
                    http_status = status,
                    user_message = %self.user_message,
                    "Request rejected"
                );
            }
        }
    }

    fn record_metrics(&self) {
        counter!(
            "goods_errors_total",
            "code" => self.code.to_string(),
            "category" => self.code.category().to_string(),
            "retryable" => self.is_retryable().to_string(),
        )
        .increment(1);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// API Response
// ═══════════════════════════════════════════════════════════════════════════════

/// Error body returned to API clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Coarse outcome code (1 validation, 2 internal, 3 not found, 4 conflict)
    pub code: u32,

    /// Message key for client-side localisation
    pub message: String,

    /// Free-form details
    pub details: serde_json::Value,
}

impl From<&GoodsError> for ErrorResponse {
    fn from(error: &GoodsError) -> Self {
        let details = match error.code {
            ErrorCode::RecordNotFound => serde_json::json!({}),
            ErrorCode::ValidationError => {
                serde_json::Value::String(error.user_message.to_string())
            }
            _ => serde_json::Value::String(
                error
                    .internal_message
                    .clone()
                    .unwrap_or_else(|| error.user_message.to_string()),
            ),
        };

        Self {
            code: error.code.response_code(),
            message: error.code.message_key().to_string(),
            details,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Axum Integration
// ═══════════════════════════════════════════════════════════════════════════════

impl IntoResponse for GoodsError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.http_status();
        let response = ErrorResponse::from(&self);

        (status, Json(response)).into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// From Implementations for Common Error Types
// ═══════════════════════════════════════════════════════════════════════════════

/// SQLSTATE for `serialization_failure`.
const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE for `deadlock_detected`.
const SQLSTATE_DEADLOCK_DETECTED: &str = "40P01";

impl From<sqlx::Error> for GoodsError {
    fn from(error: sqlx::Error) -> Self {
        let (code, user_msg) = match &error {
            sqlx::Error::RowNotFound => (
                ErrorCode::RecordNotFound,
                "The requested record was not found",
            ),
            sqlx::Error::Database(db_err) => {
                let sqlstate = db_err.code();
                match sqlstate.as_deref() {
                    Some(SQLSTATE_SERIALIZATION_FAILURE) | Some(SQLSTATE_DEADLOCK_DETECTED) => (
                        ErrorCode::SerializationConflict,
                        "The record was modified concurrently, please retry",
                    ),
                    _ => (ErrorCode::DatabaseQueryFailed, "A database error occurred"),
                }
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => (
                ErrorCode::DatabaseConnectionFailed,
                "Unable to connect to the database",
            ),
            _ => (ErrorCode::DatabaseError, "A database error occurred"),
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<redis::RedisError> for GoodsError {
    fn from(error: redis::RedisError) -> Self {
        let (code, user_msg) = if error.is_connection_refusal() || error.is_connection_dropped() {
            (ErrorCode::CacheConnectionFailed, "Unable to connect to cache")
        } else if error.is_timeout() {
            (ErrorCode::CacheError, "Cache operation timed out")
        } else {
            (ErrorCode::CacheError, "A cache error occurred")
        };

        Self::with_internal(code, user_msg, error.to_string()).with_source(error)
    }
}

impl From<serde_json::Error> for GoodsError {
    fn from(error: serde_json::Error) -> Self {
        let code = if error.is_syntax() || error.is_data() {
            ErrorCode::DeserializationError
        } else if error.is_eof() {
            ErrorCode::InvalidJson
        } else {
            ErrorCode::SerializationError
        };

        Self::with_internal(code, "Failed to process JSON data", error.to_string())
            .with_source(error)
    }
}

impl From<std::io::Error> for GoodsError {
    fn from(error: std::io::Error) -> Self {
        Self::with_internal(ErrorCode::InternalError, "An I/O error occurred", error.to_string())
            .with_source(error)
    }
}

impl From<config::ConfigError> for GoodsError {
    fn from(error: config::ConfigError) -> Self {
        Self::configuration(error.to_string()).with_source(error)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
