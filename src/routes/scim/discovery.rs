//! SCIM 2.0 Discovery Endpoints
//!
//! Implements RFC 7644 Section 4 discovery endpoints:
//! - ServiceProviderConfig: Advertises service capabilities
//! - ResourceTypes: Lists supported resource types (User, Group)
//! - Schemas: Lists and retrieves schema definitions
//!
//! These are served without authentication.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};

use super::{ScimJson, get_base_url};
use crate::{
    AppState,
    scim::{ResourceType, ScimErrorResponse, ScimListResponse, ScimSchema, ServiceProviderConfig},
};

/// Get SCIM Service Provider Configuration.
///
/// `GET /ServiceProviderConfig`
#[tracing::instrument(name = "scim.discovery.service_provider_config", skip_all)]
pub async fn service_provider_config(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let base_url = get_base_url(&state, &headers);
    ScimJson(ServiceProviderConfig::new(
        &base_url,
        state.config.scim.max_page_size,
    ))
}

/// List all supported resource types.
///
/// `GET /ResourceTypes`
#[tracing::instrument(name = "scim.discovery.resource_types", skip_all)]
pub async fn resource_types(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let base_url = get_base_url(&state, &headers);
    let resource_types = ResourceType::all(&base_url);
    let total = resource_types.len();
    ScimJson(ScimListResponse::new(resource_types, total, 1))
}

/// Get a specific resource type by ID (`User` or `Group`).
///
/// `GET /ResourceTypes/{id}`
#[tracing::instrument(name = "scim.discovery.resource_type", skip_all, fields(%id))]
pub async fn resource_type(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let base_url = get_base_url(&state, &headers);

    match ResourceType::all(&base_url).into_iter().find(|rt| rt.id == id) {
        Some(resource_type) => ScimJson(resource_type).into_response(),
        None => {
            ScimErrorResponse::not_found(format!("ResourceType '{}' not found", id)).into_response()
        }
    }
}

/// List all supported schemas, including the enterprise User extension.
///
/// `GET /Schemas`
#[tracing::instrument(name = "scim.discovery.schemas", skip_all)]
pub async fn schemas(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let base_url = get_base_url(&state, &headers);
    let schemas = ScimSchema::all(&base_url);
    let total = schemas.len();
    ScimJson(ScimListResponse::new(schemas, total, 1))
}

/// Get a specific schema by ID (URI).
///
/// `GET /Schemas/{id}`
///
/// The Path extractor URL-decodes the segment, so both the raw URN and its
/// percent-encoded form work. URNs compare case-insensitively.
#[tracing::instrument(name = "scim.discovery.schema", skip_all, fields(%id))]
pub async fn schema(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let base_url = get_base_url(&state, &headers);

    match ScimSchema::all(&base_url)
        .into_iter()
        .find(|schema| schema.id.eq_ignore_ascii_case(&id))
    {
        Some(schema) => ScimJson(schema).into_response(),
        None => ScimErrorResponse::not_found(format!("Schema '{}' not found", id)).into_response(),
    }
}
