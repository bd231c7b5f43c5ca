//! Centralized error types for the bridge core library.
//!
//! This module provides a unified error handling system that:
//! - Defines the error taxonomy from the design's error-handling section using `thiserror`
//! - Maps each kind to its HTTP status code
//! - Implements `IntoResponse` for automatic JSON error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Trait for error types that provide machine-readable error codes.
pub trait ErrorCode {
    /// Returns a machine-readable error code for API responses.
    fn code(&self) -> &'static str;
}

/// Application-wide error type for the bridge server.
///
/// `FloodBackoff` is deliberately absent: it is recoverable and retried
/// internally by the chat-file reader (`reader::get_block`) and never
/// surfaces past that boundary.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum BridgeError {
    /// Invalid range header or internally-inconsistent range request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// `message_id` or `remote_token` path segment was not a non-negative decimal.
    #[error("unauthorized: non-digit id/token")]
    Unauthorized,

    /// `local_token` is not in the active set, or a web-poll password mismatched.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Message could not be resolved, or resolved to a non-document media kind.
    #[error("not found: {0}")]
    NotFound(String),

    /// `data_to_skip > block_size`: the parsed range request cannot be satisfied.
    #[error("internal inconsistency: {0}")]
    InternalInconsistent(String),

    /// The chat session (or one of its per-DC media sessions) is not connected.
    #[error("disconnected: {0}")]
    Disconnected(String),

    /// A `Device::play`/`Device::stop` call failed.
    #[error("device error: {0}")]
    DeviceError(String),

    /// A scoped device-command or discovery timeout elapsed.
    #[error("timeout: {0}")]
    Timeout(String),
}

impl ErrorCode for BridgeError {
    fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::InternalInconsistent(_) => "internal_inconsistent",
            Self::Disconnected(_) => "disconnected",
            Self::DeviceError(_) => "device_error",
            Self::Timeout(_) => "timeout",
        }
    }
}

impl From<crate::devices::soap::SoapError> for BridgeError {
    fn from(e: crate::devices::soap::SoapError) -> Self {
        Self::DeviceError(e.to_string())
    }
}

impl From<crate::devices::gena::GenaError> for BridgeError {
    fn from(e: crate::devices::gena::GenaError) -> Self {
        Self::DeviceError(e.to_string())
    }
}

impl BridgeError {
    /// Maps the error to the HTTP status code from the error-handling table.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InternalInconsistent(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Disconnected(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DeviceError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_maps_to_403() {
        let err = BridgeError::Forbidden("unknown token".into());
        assert_eq!(err.code(), "forbidden");
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn unauthorized_maps_to_401() {
        assert_eq!(BridgeError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn internal_inconsistent_maps_to_500() {
        let err = BridgeError::InternalInconsistent("data_to_skip > block_size".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
