//! Stored SCIM resources.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scim::{ResourceKind, ResourceView};

/// A User or Group as held by the repository.
///
/// `data` is the SCIM representation without `id`, `meta` and computed
/// attributes; those are rendered from the surrounding fields on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResource {
    /// Server-assigned identifier (UUID v4).
    pub id: String,
    /// Application (tenant) that owns the resource.
    pub app_id: String,
    pub kind: ResourceKind,
    pub data: ResourceView,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    /// Monotonic revision, bumped on every write. Used for compare-and-swap.
    pub revision: u64,
}

impl StoredResource {
    /// String attribute from the stored representation.
    pub fn str_attr(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(|v| v.as_str())
    }

    /// The name shown for this resource in references
    /// (`displayName`, falling back to `userName` for users).
    pub fn display_name(&self) -> Option<&str> {
        self.str_attr("displayName").or_else(|| self.str_attr("userName"))
    }
}

/// Input for creating a resource.
#[derive(Debug, Clone)]
pub struct NewResource {
    pub app_id: String,
    pub kind: ResourceKind,
    pub data: ResourceView,
}
