//! API error handling
//!
//! Every failure leaving a handler is a `ServiceError`; this module maps it
//! onto the wire envelope `{"error": {code, message, target?, details?,
//! innerError?}}` with the HTTP status the code dictates. An untrusted error
//! additionally raises the fault signal, which the server binary turns into
//! an orderly shutdown.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use core_kernel::{ErrorCode, ServiceError};
use once_cell::sync::Lazy;
use serde::Serialize;
use tokio::sync::Notify;

static FAULT: Lazy<Notify> = Lazy::new(Notify::new);

/// Notified once the process has produced an untrusted error and should
/// stop taking traffic.
pub fn fault_signal() -> &'static Notify {
    &FAULT
}

/// A `ServiceError` on its way out of the API.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inner_error: Option<String>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = StatusCode::from_u16(err.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if err.is_client_error() {
            tracing::debug!(code = ?err.code, message = %err.message, "request refused");
        } else {
            tracing::error!(code = ?err.code, message = %err.message, "request failed");
        }
        if !err.trusted {
            tracing::error!("untrusted failure, requesting shutdown");
            FAULT.notify_one();
        }

        let body = ErrorEnvelope {
            error: ErrorBody {
                code: err.code,
                message: err.message,
                target: err.target,
                details: err.details,
                inner_error: err.inner_error,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_envelope_carries_code_target_and_details() {
        let err = ApiError(
            ServiceError::invalid_request("premium out of range")
                .with_target("premium")
                .with_details(serde_json::json!({ "minimum": "0.1" })),
        );
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "InvalidRequest");
        assert_eq!(body["error"]["target"], "premium");
        assert_eq!(body["error"]["details"]["minimum"], "0.1");
        assert!(body["error"].get("innerError").is_none());
    }

    #[tokio::test]
    async fn statuses_follow_the_code() {
        let unauthorized = ApiError(ServiceError::unauthorized("unknown producer"));
        assert_eq!(unauthorized.into_response().status(), StatusCode::UNAUTHORIZED);
        let unavailable = ApiError(ServiceError::unavailable("busy"));
        assert_eq!(unavailable.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
