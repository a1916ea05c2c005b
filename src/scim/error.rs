//! SCIM 2.0 Error Types
//!
//! Two layers live here:
//! - [`ScimError`]: transport-independent failures raised by the path parser,
//!   filter parser, PATCH engine and precondition check.
//! - [`ScimErrorResponse`]: the RFC 7644 Section 3.12 error body returned over HTTP.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::types::SCHEMA_ERROR;

// =============================================================================
// Core Errors
// =============================================================================

/// Failure kinds raised by the SCIM expression engine and PATCH engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScimError {
    /// Attribute path did not match any path grammar rule
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Filter expression could not be parsed
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// A PATCH operation failed; `index` is the 1-based operation number
    #[error("{}", patch_detail(.index, .message))]
    InvalidPatch {
        index: Option<usize>,
        message: String,
    },

    /// `If-Match` did not match the resource's current version
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    /// Referenced resource or sub-item does not exist
    #[error("{resource_type} '{id}' not found")]
    ResourceNotFound { resource_type: String, id: String },
}

fn patch_detail(index: &Option<usize>, message: &str) -> String {
    match index {
        Some(i) => format!("Operation {}: {}", i, message),
        None => message.to_string(),
    }
}

impl ScimError {
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_filter(message: impl Into<String>) -> Self {
        Self::InvalidFilter(message.into())
    }

    /// PATCH failure not yet attributed to an operation.
    pub fn invalid_patch(message: impl Into<String>) -> Self {
        Self::InvalidPatch {
            index: None,
            message: message.into(),
        }
    }

    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Attribute this error to the 1-based PATCH operation `index`.
    ///
    /// Every kind is folded into `InvalidPatch`; an index that is already set
    /// is kept.
    pub fn at_operation(self, index: usize) -> Self {
        match self {
            Self::InvalidPatch {
                index: Some(existing),
                message,
            } => Self::InvalidPatch {
                index: Some(existing),
                message,
            },
            Self::InvalidPatch {
                index: None,
                message,
            } => Self::InvalidPatch {
                index: Some(index),
                message,
            },
            other => Self::InvalidPatch {
                index: Some(index),
                message: other.to_string(),
            },
        }
    }

    /// The failing operation number, for `InvalidPatch` errors.
    pub fn operation_index(&self) -> Option<usize> {
        match self {
            Self::InvalidPatch { index, .. } => *index,
            _ => None,
        }
    }
}

// =============================================================================
// HTTP Error Body
// =============================================================================

/// SCIM error response per RFC 7644.
///
/// All SCIM errors are returned in this format with appropriate HTTP status codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimErrorResponse {
    /// SCIM schema URIs (always contains the Error schema)
    pub schemas: Vec<String>,

    /// HTTP status code as a string (e.g., "400", "404")
    pub status: String,

    /// SCIM-specific error type (optional, per RFC 7644)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scim_type: Option<ScimErrorType>,

    /// Human-readable error detail
    pub detail: String,
}

impl ScimErrorResponse {
    fn new(
        status: StatusCode,
        scim_type: Option<ScimErrorType>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            schemas: vec![SCHEMA_ERROR.to_string()],
            status: status.as_u16().to_string(),
            scim_type,
            detail: detail.into(),
        }
    }

    /// Invalid filter syntax error (400)
    pub fn invalid_filter(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            Some(ScimErrorType::InvalidFilter),
            detail,
        )
    }

    /// Invalid attribute path (400)
    pub fn invalid_path(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            Some(ScimErrorType::InvalidPath),
            detail,
        )
    }

    /// Invalid JSON syntax error (400)
    pub fn invalid_syntax(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            Some(ScimErrorType::InvalidSyntax),
            detail,
        )
    }

    /// Invalid attribute value (400)
    pub fn invalid_value(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            Some(ScimErrorType::InvalidValue),
            detail,
        )
    }

    /// Authentication required (401)
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, None, detail)
    }

    /// Resource not found (404)
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, None, detail)
    }

    /// Uniqueness constraint violation (409)
    pub fn uniqueness(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::CONFLICT,
            Some(ScimErrorType::Uniqueness),
            detail,
        )
    }

    /// Version mismatch on a conditional request (412)
    pub fn precondition_failed(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::PRECONDITION_FAILED, None, detail)
    }

    /// Internal server error (500)
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, None, detail)
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status.parse().unwrap_or(500))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<ScimError> for ScimErrorResponse {
    fn from(err: ScimError) -> Self {
        let detail = err.to_string();
        match err {
            ScimError::InvalidPath { .. } => Self::invalid_path(detail),
            ScimError::InvalidFilter(_) => Self::invalid_filter(detail),
            ScimError::InvalidPatch { .. } => Self::invalid_value(detail),
            ScimError::PreconditionFailed(_) => Self::precondition_failed(detail),
            ScimError::ResourceNotFound { .. } => Self::not_found(detail),
        }
    }
}

impl IntoResponse for ScimErrorResponse {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (
            status,
            [(header::CONTENT_TYPE, "application/scim+json")],
            Json(self),
        )
            .into_response()
    }
}

/// SCIM error types per RFC 7644 Section 3.12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScimErrorType {
    /// Filter syntax is invalid or unsupported
    InvalidFilter,

    /// Attribute path is malformed
    InvalidPath,

    /// Request body has invalid JSON syntax
    InvalidSyntax,

    /// Uniqueness constraint violated (e.g., duplicate userName)
    Uniqueness,

    /// Attribute value is invalid for its type
    InvalidValue,
}

impl std::fmt::Display for ScimErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScimErrorType::InvalidFilter => write!(f, "invalidFilter"),
            ScimErrorType::InvalidPath => write!(f, "invalidPath"),
            ScimErrorType::InvalidSyntax => write!(f, "invalidSyntax"),
            ScimErrorType::Uniqueness => write!(f, "uniqueness"),
            ScimErrorType::InvalidValue => write!(f, "invalidValue"),
        }
    }
}

/// Result type for the SCIM core
pub type ScimResult<T> = Result<T, ScimError>;

// =============================================================================
// Tests
// =============================================================================
