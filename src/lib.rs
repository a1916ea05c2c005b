//! scimgate: a multi-tenant SCIM 2.0 provisioning server.
//!
//! Identity providers (Okta, Azure AD, OneLogin, ...) push Users and Groups
//! over RFC 7644; every bearer token is scoped to one application, and each
//! application sees only its own resources.

pub mod config;
pub mod db;
pub mod models;
pub mod observability;
pub mod routes;
pub mod scim;
pub mod services;

#[cfg(test)]
mod tests;

use std::{sync::Arc, time::Duration};

use axum::{Router, body::Body, routing::get};
use http::{Request, StatusCode};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::GatewayConfig>,
    pub services: services::Services,
}

impl AppState {
    /// State backed by the in-memory repository.
    pub fn new(config: Arc<config::GatewayConfig>) -> Self {
        let db = Arc::new(db::DbPool::in_memory());
        let services = services::Services::new(db, config.scim.clone());
        Self { config, services }
    }
}

/// Build the HTTP application: `/health` plus the SCIM API under
/// `[server] api_base_path`.
pub fn build_app(config: &config::GatewayConfig, state: AppState) -> Router {
    let scim = routes::scim_routes(state.clone());
    let base_path = config.server.base_path();

    let mut app = Router::new().route("/health", get(routes::health::health_check));
    app = if base_path == "/" {
        app.merge(scim)
    } else {
        app.nest(base_path, scim)
    };

    // Apply CORS layer if enabled (layers are applied in reverse order, so this runs first)
    if let Some(cors_layer) = config.server.cors.clone().into_layer() {
        app = app.layer(cors_layer);
    }

    app.layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.server.timeout_secs),
    ))
    .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
    .layer(PropagateRequestIdLayer::x_request_id())
    .layer(
        TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            tracing::info_span!(
                "request",
                request_id,
                method = %request.method(),
                path = %request.uri().path(),
            )
        }),
    )
    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    .with_state(state)
}
