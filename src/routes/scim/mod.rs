//! SCIM 2.0 Protocol Routes
//!
//! RFC 7644 endpoints, mounted under `[server] api_base_path` (`/scim/v2` by
//! default).
//!
//! **Discovery Endpoints** (no authentication):
//! - `GET /ServiceProviderConfig` - Service capabilities
//! - `GET /ResourceTypes` - List supported resource types
//! - `GET /ResourceTypes/{id}` - Get specific resource type
//! - `GET /Schemas` - List supported schemas
//! - `GET /Schemas/{id}` - Get specific schema
//!
//! **Resource Endpoints** (bearer token):
//! - `GET/POST /Users` - List/create users
//! - `GET/PUT/PATCH/DELETE /Users/{id}` - User operations
//! - `GET/POST /Groups` - List/create groups
//! - `GET/PUT/PATCH/DELETE /Groups/{id}` - Group operations

pub mod discovery;
pub mod groups;
pub mod middleware;
pub mod users;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, rejection::QueryRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    AppState,
    scim::{AttributeProjector, ResourceView, ScimAttributeParams, ScimErrorResponse},
};

const SCIM_CONTENT_TYPE: &str = "application/scim+json";

/// Build the SCIM routes, relative to the configured base path.
pub fn scim_routes(state: AppState) -> Router<AppState> {
    let resources = Router::new()
        .route("/Users", get(users::list_users).post(users::create_user))
        .route(
            "/Users/{id}",
            get(users::get_user)
                .put(users::replace_user)
                .patch(users::patch_user)
                .delete(users::delete_user),
        )
        .route("/Groups", get(groups::list_groups).post(groups::create_group))
        .route(
            "/Groups/{id}",
            get(groups::get_group)
                .put(groups::replace_group)
                .patch(groups::patch_group)
                .delete(groups::delete_group),
        )
        // Bearer token authentication applies to resource routes only
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::scim_auth_middleware,
        ));

    Router::new()
        .route(
            "/ServiceProviderConfig",
            get(discovery::service_provider_config),
        )
        .route("/ResourceTypes", get(discovery::resource_types))
        .route("/ResourceTypes/{id}", get(discovery::resource_type))
        .route("/Schemas", get(discovery::schemas))
        .route("/Schemas/{id}", get(discovery::schema))
        .merge(resources)
}

// =============================================================================
// Responses
// =============================================================================

/// SCIM JSON response with the `application/scim+json` content type.
pub struct ScimJson<T>(pub T);

impl<T: Serialize> IntoResponse for ScimJson<T> {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, SCIM_CONTENT_TYPE)],
            Json(self.0),
        )
            .into_response()
    }
}

/// A single rendered resource.
///
/// Carries `ETag` from `meta.version` and, for `201 Created`, `Location`
/// from `meta.location`. Both are read before projection so that
/// `excludedAttributes=meta` does not drop the headers.
pub(crate) fn resource_response(
    status: StatusCode,
    view: ResourceView,
    projector: &AttributeProjector,
) -> Response {
    let meta = view.get("meta");
    let etag = meta.and_then(|m| m.get("version")).and_then(Value::as_str);
    let location = meta.and_then(|m| m.get("location")).and_then(Value::as_str);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(SCIM_CONTENT_TYPE),
    );
    if let Some(value) = etag.and_then(|e| HeaderValue::from_str(e).ok()) {
        headers.insert(header::ETAG, value);
    }
    if status == StatusCode::CREATED
        && let Some(value) = location.and_then(|l| HeaderValue::from_str(l).ok())
    {
        headers.insert(header::LOCATION, value);
    }

    let body = projector.project(&Value::Object(view));
    (status, headers, Json(body)).into_response()
}

// =============================================================================
// Request Helpers
// =============================================================================

/// Extract the SCIM base URL from the request.
///
/// Uses X-Forwarded-* headers if present (for reverse proxy scenarios),
/// otherwise constructs from the Host header.
pub(crate) fn get_base_url(state: &AppState, headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("https");

    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    let base_path = state.config.server.base_path();
    if base_path == "/" {
        format!("{}://{}", scheme, host)
    } else {
        format!("{}://{}{}", scheme, host, base_path)
    }
}

/// The `If-Match` header, if the client sent one.
pub(crate) fn if_match(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::IF_MATCH)
        .and_then(|v| v.to_str().ok())
}

/// Decode a JSON request body; malformed JSON is `invalidSyntax`.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ScimErrorResponse> {
    serde_json::from_slice(body)
        .map_err(|e| ScimErrorResponse::invalid_syntax(format!("Invalid JSON: {}", e)))
}

/// Unwrap query parameters; a malformed query string is `invalidValue`.
pub(crate) fn query_params<T>(
    query: Result<Query<T>, QueryRejection>,
) -> Result<T, ScimErrorResponse> {
    query
        .map(|Query(params)| params)
        .map_err(|e| ScimErrorResponse::invalid_value(format!("Invalid query parameters: {}", e)))
}

/// Projector for single-resource responses.
pub(crate) fn projector(
    params: Result<Query<ScimAttributeParams>, QueryRejection>,
) -> Result<AttributeProjector, ScimErrorResponse> {
    let params = query_params(params)?;
    Ok(AttributeProjector::from_params(
        params.attributes.as_deref(),
        params.excluded_attributes.as_deref(),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http_body_util::BodyExt;
    use serde_json::json;

    use super::*;
    use crate::config::GatewayConfig;

    fn state(base_path: &str) -> AppState {
        let mut config = GatewayConfig::default();
        config.server.api_base_path = base_path.to_string();
        AppState::new(Arc::new(config))
    }

    #[test]
    fn test_base_url_from_host() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("idp.example.com"));
        assert_eq!(
            get_base_url(&state("/scim/v2"), &headers),
            "https://idp.example.com/scim/v2"
        );
    }

    #[test]
    fn test_base_url_prefers_forwarded_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("internal:8000"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("scim.example.com"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
        assert_eq!(
            get_base_url(&state("/api/scim/"), &headers),
            "http://scim.example.com/api/scim"
        );
    }

    #[test]
    fn test_base_url_root_mount() {
        assert_eq!(get_base_url(&state("/"), &HeaderMap::new()), "https://localhost");
    }

    #[test]
    fn test_parse_body_rejects_malformed_json() {
        let err = parse_body::<Value>(&Bytes::from_static(b"{not json")).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::to_value(&err).unwrap()["scimType"],
            "invalidSyntax"
        );
    }

    #[tokio::test]
    async fn test_resource_response_headers() {
        let view = json!({
            "id": "u1",
            "userName": "alice",
            "meta": {"version": "W/\"abc\"", "location": "https://h/scim/v2/Users/u1"}
        })
        .as_object()
        .cloned()
        .unwrap();
        let projector = AttributeProjector::from_params(None, Some("meta"));

        let response = resource_response(StatusCode::CREATED, view, &projector);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::ETAG], "W/\"abc\"");
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://h/scim/v2/Users/u1"
        );
        assert_eq!(response.headers()[header::CONTENT_TYPE], SCIM_CONTENT_TYPE);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["userName"], "alice");
    }

    #[test]
    fn test_location_only_on_created() {
        let view = json!({"id": "u1", "meta": {"location": "https://h/Users/u1"}})
            .as_object()
            .cloned()
            .unwrap();
        let response = resource_response(
            StatusCode::OK,
            view,
            &AttributeProjector::from_params(None, None),
        );
        assert!(response.headers().get(header::LOCATION).is_none());
    }
}
