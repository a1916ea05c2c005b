//! SCIM 2.0 User Resource Endpoints
//!
//! Implements RFC 7644 Section 3 CRUD operations for User resources:
//! - POST /Users: Create user
//! - GET /Users: List/search users
//! - GET /Users/{id}: Get user by ID
//! - PUT /Users/{id}: Replace user (full update)
//! - PATCH /Users/{id}: Partial update
//! - DELETE /Users/{id}: Delete user

use axum::{
    Extension,
    body::Bytes,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use super::{
    ScimJson, get_base_url, if_match, middleware::AuthContext, parse_body, projector,
    query_params, resource_response,
};
use crate::{
    AppState,
    scim::{PatchRequest, ScimAttributeParams, ScimErrorResponse, ScimListParams},
};

type ScimResponse = Result<Response, ScimErrorResponse>;

/// List users with optional filter, sort and pagination.
///
/// `GET /Users`
///
/// Query parameters:
/// - `filter`: SCIM filter expression (e.g., `userName eq "john@example.com"`)
/// - `sortBy` / `sortOrder`
/// - `startIndex`: 1-based pagination start (default: 1)
/// - `count`: Results per page (clamped to `[scim] max_page_size`)
/// - `attributes` / `excludedAttributes`
#[tracing::instrument(name = "scim.users.list", skip_all, fields(app_id = %auth.app_id))]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    params: Result<Query<ScimListParams>, QueryRejection>,
) -> ScimResponse {
    let params = query_params(params)?;
    let base_url = get_base_url(&state, &headers);

    let response = state
        .services
        .scim_provisioning
        .list_users(&auth.app_id, &params, &base_url)
        .await?;
    Ok(ScimJson(response).into_response())
}

/// Create a new user.
///
/// `POST /Users`
///
/// Returns 201 Created with the full user resource and a `Location` header.
#[tracing::instrument(name = "scim.users.create", skip_all, fields(app_id = %auth.app_id))]
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    attributes: Result<Query<ScimAttributeParams>, QueryRejection>,
    body: Bytes,
) -> ScimResponse {
    let projector = projector(attributes)?;
    let body: Value = parse_body(&body)?;
    let base_url = get_base_url(&state, &headers);

    let created = state
        .services
        .scim_provisioning
        .create_user(&auth.app_id, body, &base_url)
        .await?;
    Ok(resource_response(StatusCode::CREATED, created, &projector))
}

/// Get a user by ID.
///
/// `GET /Users/{id}`
#[tracing::instrument(name = "scim.users.get", skip_all, fields(app_id = %auth.app_id, %id))]
pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
    attributes: Result<Query<ScimAttributeParams>, QueryRejection>,
) -> ScimResponse {
    let projector = projector(attributes)?;
    let base_url = get_base_url(&state, &headers);

    let user = state
        .services
        .scim_provisioning
        .get_user(&auth.app_id, &id, &base_url)
        .await?;
    Ok(resource_response(StatusCode::OK, user, &projector))
}

/// Replace a user (full update).
///
/// `PUT /Users/{id}`
///
/// Attributes not included in the request are removed, except `password`,
/// which is kept when absent.
#[tracing::instrument(name = "scim.users.replace", skip_all, fields(app_id = %auth.app_id, %id))]
pub async fn replace_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
    attributes: Result<Query<ScimAttributeParams>, QueryRejection>,
    body: Bytes,
) -> ScimResponse {
    let projector = projector(attributes)?;
    let body: Value = parse_body(&body)?;
    let base_url = get_base_url(&state, &headers);

    let updated = state
        .services
        .scim_provisioning
        .replace_user(&auth.app_id, &id, body, if_match(&headers), &base_url)
        .await?;
    Ok(resource_response(StatusCode::OK, updated, &projector))
}

/// Partially update a user.
///
/// `PATCH /Users/{id}`
///
/// Applies add, replace and remove operations atomically.
#[tracing::instrument(name = "scim.users.patch", skip_all, fields(app_id = %auth.app_id, %id))]
pub async fn patch_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
    attributes: Result<Query<ScimAttributeParams>, QueryRejection>,
    body: Bytes,
) -> ScimResponse {
    let projector = projector(attributes)?;
    let request: PatchRequest = parse_body(&body)?;
    let base_url = get_base_url(&state, &headers);

    let updated = state
        .services
        .scim_provisioning
        .patch_user(&auth.app_id, &id, &request, if_match(&headers), &base_url)
        .await?;
    Ok(resource_response(StatusCode::OK, updated, &projector))
}

/// Delete a user.
///
/// `DELETE /Users/{id}`
///
/// The user also leaves every group and stops being anyone's manager.
#[tracing::instrument(name = "scim.users.delete", skip_all, fields(app_id = %auth.app_id, %id))]
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ScimResponse {
    state
        .services
        .scim_provisioning
        .delete_user(&auth.app_id, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
