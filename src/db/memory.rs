//! In-memory repository backed by DashMap.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::{DashMap, mapref::entry::Entry};
use uuid::Uuid;

use super::{
    error::{DbError, DbResult},
    repos::ScimResourceRepo,
};
use crate::{
    models::{NewResource, StoredResource},
    scim::{ResourceKind, ResourceView},
};

/// Primary key: (app_id, kind, id).
type Key = (String, ResourceKind, String);

struct Slot {
    /// Insertion order, breaks ties between equal creation timestamps.
    seq: u64,
    resource: StoredResource,
}

/// Repository that keeps every resource in process memory.
///
/// Data does not survive a restart and is not shared between nodes.
#[derive(Clone, Default)]
pub struct MemoryResourceRepo {
    slots: Arc<DashMap<Key, Slot>>,
    next_seq: Arc<AtomicU64>,
}

impl MemoryResourceRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(app_id: &str, kind: ResourceKind, id: &str) -> Key {
        (app_id.to_string(), kind, id.to_string())
    }
}

#[async_trait]
impl ScimResourceRepo for MemoryResourceRepo {
    async fn create(&self, input: NewResource) -> DbResult<StoredResource> {
        let now = Utc::now();
        let resource = StoredResource {
            id: Uuid::new_v4().to_string(),
            app_id: input.app_id,
            kind: input.kind,
            data: input.data,
            created: now,
            last_modified: now,
            revision: 1,
        };

        let key = Self::key(&resource.app_id, resource.kind, &resource.id);
        match self.slots.entry(key) {
            Entry::Occupied(_) => Err(DbError::Conflict(format!(
                "{} with id {} already exists",
                resource.kind, resource.id
            ))),
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                slot.insert(Slot {
                    seq,
                    resource: resource.clone(),
                });
                Ok(resource)
            }
        }
    }

    async fn get(
        &self,
        app_id: &str,
        kind: ResourceKind,
        id: &str,
    ) -> DbResult<Option<StoredResource>> {
        Ok(self
            .slots
            .get(&Self::key(app_id, kind, id))
            .map(|slot| slot.resource.clone()))
    }

    async fn list(&self, app_id: &str, kind: ResourceKind) -> DbResult<Vec<StoredResource>> {
        let mut found: Vec<(u64, StoredResource)> = self
            .slots
            .iter()
            .filter(|entry| {
                let (app, k, _) = entry.key();
                app == app_id && *k == kind
            })
            .map(|entry| (entry.seq, entry.resource.clone()))
            .collect();

        found.sort_by(|(a_seq, a), (b_seq, b)| a.created.cmp(&b.created).then(a_seq.cmp(b_seq)));
        Ok(found.into_iter().map(|(_, resource)| resource).collect())
    }

    async fn update(
        &self,
        app_id: &str,
        kind: ResourceKind,
        id: &str,
        data: ResourceView,
        expected_revision: u64,
    ) -> DbResult<StoredResource> {
        let mut slot = self
            .slots
            .get_mut(&Self::key(app_id, kind, id))
            .ok_or(DbError::NotFound)?;

        if slot.resource.revision != expected_revision {
            return Err(DbError::Conflict(format!(
                "{} {} was modified concurrently (revision {} != {})",
                kind, id, slot.resource.revision, expected_revision
            )));
        }

        let resource = &mut slot.resource;
        resource.data = data;
        resource.revision += 1;
        // Keep lastModified strictly after created even on coarse clocks
        resource.last_modified = Utc::now().max(resource.created);

        Ok(resource.clone())
    }

    async fn delete(&self, app_id: &str, kind: ResourceKind, id: &str) -> DbResult<bool> {
        Ok(self.slots.remove(&Self::key(app_id, kind, id)).is_some())
    }
}
