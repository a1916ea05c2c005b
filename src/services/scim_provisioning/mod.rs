//! SCIM 2.0 User and Group Provisioning Service
//!
//! Orchestrates create, read, replace, patch, delete and list for Users and
//! Groups on behalf of identity providers. Every operation is scoped to an
//! application (`app_id`), which the HTTP layer takes from the bearer token.
//!
//! Writes for one application are serialized by a per-application lock, and
//! each repository update is additionally guarded by a revision
//! compare-and-swap.

mod directory;
mod groups;
mod listing;
mod normalize;
mod pending;
mod render;
mod users;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub(crate) use directory::Directory;
use pending::PendingManagers;

use crate::{
    config::ScimConfig,
    db::{DbError, DbPool, ScimResourceRepo},
    scim::{ScimError, ScimErrorResponse},
};

/// SCIM provisioning error types
#[derive(Debug, thiserror::Error)]
pub enum ScimProvisioningError {
    /// Repository failure
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Path, filter, PATCH, precondition or not-found failure from the core
    #[error(transparent)]
    Scim(#[from] ScimError),

    /// A unique attribute is already taken within the application
    #[error("{0}")]
    Uniqueness(String),

    /// Request body is not a usable SCIM document
    #[error("{0}")]
    InvalidSyntax(String),

    /// An attribute value is missing or not acceptable
    #[error("{0}")]
    InvalidValue(String),

    #[error("{0}")]
    Internal(String),
}

impl From<ScimProvisioningError> for ScimErrorResponse {
    fn from(e: ScimProvisioningError) -> Self {
        match e {
            ScimProvisioningError::Database(DbError::NotFound) => {
                ScimErrorResponse::not_found("Resource not found")
            }
            ScimProvisioningError::Database(DbError::Conflict(msg)) => {
                ScimErrorResponse::precondition_failed(msg)
            }
            ScimProvisioningError::Database(db_err) => {
                ScimErrorResponse::internal(format!("Database error: {}", db_err))
            }
            ScimProvisioningError::Scim(err) => err.into(),
            ScimProvisioningError::Uniqueness(msg) => ScimErrorResponse::uniqueness(msg),
            ScimProvisioningError::InvalidSyntax(msg) => ScimErrorResponse::invalid_syntax(msg),
            ScimProvisioningError::InvalidValue(msg) => ScimErrorResponse::invalid_value(msg),
            ScimProvisioningError::Internal(msg) => ScimErrorResponse::internal(msg),
        }
    }
}

/// Result type for SCIM provisioning operations
pub type ProvisioningResult<T> = Result<T, ScimProvisioningError>;

/// SCIM User and Group Provisioning Service
#[derive(Clone)]
pub struct ScimProvisioningService {
    db: Arc<DbPool>,
    scim: ScimConfig,
    write_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    pending: PendingManagers,
}

impl ScimProvisioningService {
    pub fn new(db: Arc<DbPool>, scim: ScimConfig) -> Self {
        Self {
            db,
            scim,
            write_locks: Arc::new(DashMap::new()),
            pending: PendingManagers::default(),
        }
    }

    fn repo(&self) -> Arc<dyn ScimResourceRepo> {
        self.db.resources()
    }

    /// Hold the write lock of one application until the guard drops.
    async fn lock_app(&self, app_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .write_locks
            .entry(app_id.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Snapshot of every User and Group of the application.
    async fn directory(&self, app_id: &str, base_url: &str) -> ProvisioningResult<Directory> {
        Ok(Directory::load(self.repo().as_ref(), app_id, base_url).await?)
    }
}
