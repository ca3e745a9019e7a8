//! Service-wide error type with HTTP status mapping
//!
//! Every fallible operation in the system surfaces a [`ServiceError`].
//! Client-caused failures (4xx) carry the offending field path in `target`;
//! server-side failures (5xx) additionally distinguish *trusted* errors
//! (expected operational failures) from *untrusted* ones, which indicate the
//! process state can no longer be relied on and the server should restart.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire-level error codes exposed in the response envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Unauthorized,
    AccessDenied,
    InvalidRequest,
    NotFound,
    InternalServerError,
    ServiceUnavailable,
    GeneralException,
}

impl ErrorCode {
    /// The HTTP status this code maps to
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::Unauthorized => 401,
            ErrorCode::AccessDenied => 403,
            ErrorCode::InvalidRequest => 400,
            ErrorCode::NotFound => 404,
            ErrorCode::InternalServerError => 500,
            ErrorCode::ServiceUnavailable => 503,
            ErrorCode::GeneralException => 500,
        }
    }
}

/// Unified error for all domain and infrastructure operations
#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct ServiceError {
    pub code: ErrorCode,
    pub message: String,
    /// Field path of the offending input, for client errors
    pub target: Option<String>,
    /// Structured context for diagnostics
    pub details: Option<serde_json::Value>,
    /// Message of the underlying cause, if any
    pub inner_error: Option<String>,
    /// False when the process state may be corrupted and a restart is warranted
    pub trusted: bool,
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            target: None,
            details: None,
            inner_error: None,
            trusted: true,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AccessDenied, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalServerError, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Attaches the field path the error refers to
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Attaches structured diagnostic context
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Records the underlying cause
    pub fn with_inner(mut self, inner: impl Into<String>) -> Self {
        self.inner_error = Some(inner.into());
        self
    }

    /// Marks the error as untrusted: process state may be corrupted
    pub fn untrusted(mut self) -> Self {
        self.trusted = false;
        self
    }

    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }

    /// True for client-caused (4xx) errors
    pub fn is_client_error(&self) -> bool {
        self.http_status() < 500
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_expected_statuses() {
        assert_eq!(ErrorCode::Unauthorized.http_status(), 401);
        assert_eq!(ErrorCode::AccessDenied.http_status(), 403);
        assert_eq!(ErrorCode::InvalidRequest.http_status(), 400);
        assert_eq!(ErrorCode::NotFound.http_status(), 404);
        assert_eq!(ErrorCode::InternalServerError.http_status(), 500);
        assert_eq!(ErrorCode::ServiceUnavailable.http_status(), 503);
        assert_eq!(ErrorCode::GeneralException.http_status(), 500);
    }

    #[test]
    fn builders_set_optional_fields() {
        let err = ServiceError::invalid_request("effective time out of range")
            .with_target("period.effectiveTime")
            .with_details(serde_json::json!({"min": "2026-01-01T00:00:00Z"}));

        assert_eq!(err.code, ErrorCode::InvalidRequest);
        assert_eq!(err.target.as_deref(), Some("period.effectiveTime"));
        assert!(err.details.is_some());
        assert!(err.trusted);
        assert!(err.is_client_error());
    }

    #[test]
    fn untrusted_flag_survives_builders() {
        let err = ServiceError::internal("policy row vanished under lock").untrusted();
        assert!(!err.trusted);
        assert!(!err.is_client_error());
    }
}
