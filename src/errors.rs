// ABOUTME: Unified error handling for the streak engine
// ABOUTME: Error codes, AppError with source chaining, and HTTP response formatting
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Embers contributors

//! Unified error handling.
//!
//! Every fallible operation in the engine surfaces an [`AppError`] carrying a
//! stable [`ErrorCode`]. The HTTP layer maps codes to status codes and a JSON
//! [`ErrorResponse`] envelope; the database layer uses `anyhow` internally and
//! converts at the boundary.

use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// A date could not be normalized to a civil calendar date.
    #[serde(rename = "INVALID_DATE")]
    InvalidDate,
    /// Malformed or out-of-range request input.
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput,
    /// The referenced user or record does not exist.
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound,
    /// A concurrent writer invalidated the read-modify-write sequence and
    /// retries were exhausted.
    #[serde(rename = "CONCURRENT_MODIFICATION")]
    ConcurrentModification,
    /// The backing store is unreachable or failing; callers may retry with
    /// backoff.
    #[serde(rename = "STORAGE_UNAVAILABLE")]
    StorageUnavailable,
    /// Unexpected internal failure.
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

impl ErrorCode {
    /// HTTP status code for this error.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::InvalidDate | Self::InvalidInput => 400,
            Self::ResourceNotFound => 404,
            Self::ConcurrentModification => 409,
            Self::StorageUnavailable => 503,
            Self::InternalError => 500,
        }
    }

    /// Short human-readable description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::InvalidDate => "The provided date is not a valid calendar date",
            Self::InvalidInput => "The provided input is invalid",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::ConcurrentModification => "The record was modified concurrently",
            Self::StorageUnavailable => "The backing store is temporarily unavailable",
            Self::InternalError => "An internal error occurred",
        }
    }
}

/// Unified application error.
#[derive(Debug, Error)]
#[error("{}: {message}", .code.description())]
pub struct AppError {
    /// Stable error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Source error for chaining.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new error with the given code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach a source error for chaining.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Date that cannot be normalized to a civil date.
    #[must_use]
    pub fn invalid_date(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidDate, message)
    }

    /// Malformed request input.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Missing user or record.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Write conflict after exhausting retries.
    #[must_use]
    pub fn concurrent_modification(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConcurrentModification, message)
    }

    /// Storage fault, generically retryable by the caller.
    #[must_use]
    pub fn storage(source: anyhow::Error) -> Self {
        let mut error = Self::new(ErrorCode::StorageUnavailable, source.to_string());
        error.source = Some(source.into());
        error
    }

    /// Unexpected internal failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

/// Result alias used across the engine.
pub type AppResult<T> = Result<T, AppError>;

/// JSON error envelope returned by the HTTP layer.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error payload.
    pub error: ErrorResponseDetails,
}

/// Error payload inside [`ErrorResponse`].
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponseDetails {
    /// Stable error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        Self {
            error: ErrorResponseDetails {
                code: error.code,
                message: error.message,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::from(self))).into_response()
    }
}
