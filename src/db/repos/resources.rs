//! Repository for SCIM Users and Groups.

use async_trait::async_trait;

use crate::{
    db::error::DbResult,
    models::{NewResource, StoredResource},
    scim::{ResourceKind, ResourceView},
};

/// Storage for SCIM resources.
///
/// Every call is scoped to an application (`app_id`); a resource owned by one
/// application is invisible to every other. Uniqueness of SCIM attributes is
/// enforced by the service layer, not here.
#[async_trait]
pub trait ScimResourceRepo: Send + Sync {
    /// Store a new resource under a fresh id.
    async fn create(&self, input: NewResource) -> DbResult<StoredResource>;

    /// Get a resource by id.
    async fn get(&self, app_id: &str, kind: ResourceKind, id: &str)
    -> DbResult<Option<StoredResource>>;

    /// All resources of a kind, oldest first.
    async fn list(&self, app_id: &str, kind: ResourceKind) -> DbResult<Vec<StoredResource>>;

    /// Replace a resource's data.
    ///
    /// The write only happens while the stored revision still equals
    /// `expected_revision`.
    ///
    /// # Errors
    /// - `DbError::NotFound` if the resource does not exist
    /// - `DbError::Conflict` if the resource was modified concurrently
    async fn update(
        &self,
        app_id: &str,
        kind: ResourceKind,
        id: &str,
        data: ResourceView,
        expected_revision: u64,
    ) -> DbResult<StoredResource>;

    /// Delete a resource. Returns false if it did not exist.
    async fn delete(&self, app_id: &str, kind: ResourceKind, id: &str) -> DbResult<bool>;
}
