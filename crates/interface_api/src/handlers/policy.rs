//! Policy lifecycle handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use core_kernel::ServiceError;
use domain_policy::{
    AcceptRequest, CancelResponse, EndorseRequest, EndorseResponse, PolicyResponse, QuoteResponse,
};
use serde::Deserialize;

use crate::{auth::ProducerCode, error::ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenewBody {
    pub policy_no: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndorseBody {
    pub policy_no: Option<String>,
    #[serde(flatten)]
    pub change: EndorseRequest,
}

fn required_policy_no(policy_no: Option<String>) -> Result<String, ApiError> {
    policy_no.filter(|s| !s.is_empty()).ok_or_else(|| {
        ApiError(ServiceError::invalid_request("policyNo is required").with_target("policyNo"))
    })
}

/// Binds a policy. A replayed order answers 200 with the stored policy,
/// a fresh bind answers 201.
pub async fn accept(
    State(state): State<AppState>,
    producer: ProducerCode,
    Json(request): Json<AcceptRequest>,
) -> Result<Response, ApiError> {
    let outcome = state.policies.accept(&producer.0, request).await?;
    let status = if outcome.replayed { StatusCode::OK } else { StatusCode::CREATED };
    Ok((status, Json(outcome.policy)).into_response())
}

/// Prices a draft without binding anything.
pub async fn quote(
    State(state): State<AppState>,
    producer: ProducerCode,
    Json(request): Json<AcceptRequest>,
) -> Result<Json<QuoteResponse>, ApiError> {
    Ok(Json(state.policies.quote(&producer.0, request).await?))
}

pub async fn get(
    State(state): State<AppState>,
    producer: ProducerCode,
    Path(policy_no): Path<String>,
) -> Result<Json<PolicyResponse>, ApiError> {
    Ok(Json(state.policies.get(&producer.0, &policy_no).await?))
}

pub async fn renew(
    State(state): State<AppState>,
    producer: ProducerCode,
    Json(body): Json<RenewBody>,
) -> Result<Json<PolicyResponse>, ApiError> {
    let policy_no = required_policy_no(body.policy_no)?;
    Ok(Json(state.policies.renew(&producer.0, &policy_no).await?))
}

pub async fn cancel(
    State(state): State<AppState>,
    producer: ProducerCode,
    Path(policy_no): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    Ok(Json(state.policies.cancel(&producer.0, &policy_no).await?))
}

pub async fn endorse(
    State(state): State<AppState>,
    producer: ProducerCode,
    Json(body): Json<EndorseBody>,
) -> Result<Json<EndorseResponse>, ApiError> {
    let policy_no = required_policy_no(body.policy_no)?;
    Ok(Json(state.policies.endorse(&producer.0, &policy_no, body.change).await?))
}
