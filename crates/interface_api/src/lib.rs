//! HTTP API Layer
//!
//! This crate provides the REST API of the policy numbering service using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers for series administration and issuance
//! - **Middleware**: Request ids, tracing, audit logging, caller metadata
//! - **DTOs**: Request/Response data transfer objects
//! - **Error Handling**: Consistent error responses
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let app = create_router(AppState::new(allocator, config));
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use domain_numbering::PolicySeriesAllocator;

use crate::config::ApiConfig;
use crate::handlers::{health, series};
use crate::middleware::{audit_middleware, REQUEST_ID_HEADER};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub allocator: Arc<PolicySeriesAllocator>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(allocator: PolicySeriesAllocator, config: ApiConfig) -> Self {
        Self {
            allocator: Arc::new(allocator),
            config: Arc::new(config),
        }
    }
}

/// Creates the main API router
///
/// # Arguments
///
/// * `state` - Allocator and configuration shared by all handlers
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let series_routes = Router::new()
        .route("/", post(series::create_series).get(series::list_series))
        .route("/near-depletion", get(series::near_depletion))
        .route(
            "/:id",
            get(series::get_series)
                .put(series::update_series)
                .delete(series::delete_series),
        )
        .route("/:id/next-number", post(series::next_number))
        .route("/:id/policy-numbers", post(series::generate_policy_number))
        .route(
            "/:id/policy-numbers/:policy_number",
            get(series::resolve_policy_number),
        )
        .route("/:id/dealer", put(series::assign_dealer))
        .route("/:id/extend", post(series::extend_range))
        .route("/:id/statistics", get(series::series_statistics))
        .route("/:id/issuances", get(series::issuance_history))
        .route("/:id/events", get(series::series_events));

    let dealer_routes = Router::new().route("/:id/series", get(series::list_dealer_series));

    let api_routes = Router::new()
        .nest("/series", series_routes)
        .nest("/dealers", dealer_routes)
        .layer(axum_middleware::from_fn(audit_middleware));

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        let request_id = request
                            .headers()
                            .get(REQUEST_ID_HEADER)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("-");
                        tracing::info_span!(
                            "http_request",
                            method = %request.method(),
                            uri = %request.uri(),
                            request_id = %request_id,
                        )
                    }),
                )
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
