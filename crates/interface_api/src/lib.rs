//! HTTP API Layer
//!
//! This crate provides the REST API for expense reimbursement claims using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: One per claim operation, delegating to `ClaimService`
//! - **Middleware**: Bearer-token actor resolution, audit logging
//! - **DTOs**: Request/Response data transfer objects
//! - **Export**: CSV and XLSX claim reports
//! - **Error Handling**: `ClaimError` categories mapped to HTTP statuses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let app = create_router(service, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;
pub mod auth;
pub mod export;

use axum::{
    Router,
    routing::{get, post, put},
    middleware as axum_middleware,
};
use tower_http::trace::TraceLayer;
use tower_http::cors::{CorsLayer, Any};

use domain_claims::ClaimService;

use crate::config::ApiConfig;
use crate::middleware::{auth_middleware, audit_middleware};
use crate::handlers::{claims, health};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: ClaimService,
    pub config: ApiConfig,
}

/// Creates the main API router
///
/// # Arguments
///
/// * `service` - Claim service over the configured store
/// * `config` - API configuration
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(service: ClaimService, config: ApiConfig) -> Router {
    let state = AppState { service, config };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    // Claims routes
    let claims_routes = Router::new()
        .route("/", post(claims::create_claims).get(claims::list_claims))
        .route("/counts", get(claims::claim_counts))
        .route("/export", get(claims::export_claims))
        .route("/:id", get(claims::get_claim).put(claims::edit_claim))
        .route("/:id/decision", post(claims::decide_claim))
        .route("/:id/recall", post(claims::request_recall))
        .route("/:id/recall/exhibit", post(claims::attach_recall_exhibit))
        .route("/:id/recall/response", post(claims::respond_to_recall))
        .route("/:id/recall/cancel", post(claims::cancel_recall))
        .route("/:id/change-request", post(claims::request_change))
        .route("/:id/receipt", put(claims::attach_receipt));

    // Protected API routes
    let api_routes = Router::new()
        .nest("/claims", claims_routes)
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
