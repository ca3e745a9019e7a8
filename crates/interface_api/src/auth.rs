//! Producer identity
//!
//! Callers identify themselves with the `x-producer-code` header; request
//! signature verification sits in front of this service. A missing or empty
//! header is refused before any handler runs.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use core_kernel::ServiceError;

use crate::error::ApiError;

pub const PRODUCER_HEADER: &str = "x-producer-code";

/// The producer code extracted from the request headers.
#[derive(Debug, Clone)]
pub struct ProducerCode(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ProducerCode
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(PRODUCER_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|code| !code.is_empty())
            .map(|code| ProducerCode(code.to_string()))
            .ok_or_else(|| {
                ServiceError::unauthorized("the x-producer-code header is required").into()
            })
    }
}
