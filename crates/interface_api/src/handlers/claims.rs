//! Claim handlers

use axum::{
    extract::{Path, State},
    Json,
};
use domain_claims::{ClaimRequest, ClaimResponse};

use crate::{auth::ProducerCode, error::ApiError, AppState};

pub async fn apply(
    State(state): State<AppState>,
    producer: ProducerCode,
    Json(request): Json<ClaimRequest>,
) -> Result<Json<ClaimResponse>, ApiError> {
    Ok(Json(state.claims.apply(&producer.0, request).await?))
}

pub async fn get(
    State(state): State<AppState>,
    producer: ProducerCode,
    Path(claim_no): Path<String>,
) -> Result<Json<ClaimResponse>, ApiError> {
    Ok(Json(state.claims.get(&producer.0, &claim_no).await?))
}
