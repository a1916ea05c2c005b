//! SCIM 2.0 Group Resource Endpoints
//!
//! Implements RFC 7644 Section 3 CRUD operations for Group resources.
//! Members may be given by id or by any identifier the directory resolves
//! (userName, email, externalId, or a group's displayName).

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

/// List groups with optional filter, sort and pagination.
///
/// `GET /Groups`
#[tracing::instrument(name = "scim.groups.list", skip_all, fields(app_id = %auth.app_id))]
pub async fn list_groups(
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
        .list_groups(&auth.app_id, &params, &base_url)
        .await?;
    Ok(ScimJson(response).into_response())
}

/// Create a new group.
///
/// `POST /Groups`
#[tracing::instrument(name = "scim.groups.create", skip_all, fields(app_id = %auth.app_id))]
pub async fn create_group(
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
        .create_group(&auth.app_id, body, &base_url)
        .await?;
    Ok(resource_response(StatusCode::CREATED, created, &projector))
}

/// Get a group by ID.
///
/// `GET /Groups/{id}`
#[tracing::instrument(name = "scim.groups.get", skip_all, fields(app_id = %auth.app_id, %id))]
pub async fn get_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
    attributes: Result<Query<ScimAttributeParams>, QueryRejection>,
) -> ScimResponse {
    let projector = projector(attributes)?;
    let base_url = get_base_url(&state, &headers);

    let group = state
        .services
        .scim_provisioning
        .get_group(&auth.app_id, &id, &base_url)
        .await?;
    Ok(resource_response(StatusCode::OK, group, &projector))
}

/// Replace a group, including its full member list.
///
/// `PUT /Groups/{id}`
#[tracing::instrument(name = "scim.groups.replace", skip_all, fields(app_id = %auth.app_id, %id))]
pub async fn replace_group(
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
        .replace_group(&auth.app_id, &id, body, if_match(&headers), &base_url)
        .await?;
    Ok(resource_response(StatusCode::OK, updated, &projector))
}

/// Partially update a group.
///
/// `PATCH /Groups/{id}`
///
/// Identity providers mostly use this for membership changes
/// (`add members`, `remove members[value eq "..."]`).
#[tracing::instrument(name = "scim.groups.patch", skip_all, fields(app_id = %auth.app_id, %id))]
pub async fn patch_group(
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
        .patch_group(&auth.app_id, &id, &request, if_match(&headers), &base_url)
        .await?;
    Ok(resource_response(StatusCode::OK, updated, &projector))
}

/// Delete a group.
///
/// `DELETE /Groups/{id}`
#[tracing::instrument(name = "scim.groups.delete", skip_all, fields(app_id = %auth.app_id, %id))]
pub async fn delete_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> ScimResponse {
    state
        .services
        .scim_provisioning
        .delete_group(&auth.app_id, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
