//! HTTP API Layer
//!
//! This crate provides the REST surface of the policy lifecycle service
//! using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: thin adapters from HTTP onto the domain services
//! - **Producer identity**: the `x-producer-code` header, extracted before
//!   any handler runs
//! - **Error handling**: one envelope for every failure, mapped from
//!   `ServiceError`
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let app = create_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use domain_claims::ClaimService;
use domain_policy::PolicyService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{claims, health, policy};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub policies: Arc<PolicyService>,
    pub claims: Arc<ClaimService>,
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/policies", post(policy::accept))
        .route("/policies/quote", post(policy::quote))
        .route("/policies/renew", post(policy::renew))
        .route("/policies/:policyNo", get(policy::get).delete(policy::cancel))
        .route("/endorsements", post(policy::endorse))
        .route("/claims", post(claims::apply))
        .route("/claims/:claimNo", get(claims::get))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
