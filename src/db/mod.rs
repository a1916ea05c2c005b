//! Persistence layer.
//!
//! Services talk to storage only through the traits in [`repos`]. The only
//! backend is [`MemoryResourceRepo`].

mod error;
mod memory;
pub mod repos;

use std::sync::Arc;

pub use error::{DbError, DbResult};
pub use memory::MemoryResourceRepo;
pub use repos::*;

/// Handle to the configured repositories.
#[derive(Clone)]
pub struct DbPool {
    resources: Arc<dyn ScimResourceRepo>,
}

impl DbPool {
    /// A pool backed by process memory.
    pub fn in_memory() -> Self {
        Self::from_repo(Arc::new(MemoryResourceRepo::new()))
    }

    pub fn from_repo(resources: Arc<dyn ScimResourceRepo>) -> Self {
        Self { resources }
    }

    pub fn resources(&self) -> Arc<dyn ScimResourceRepo> {
        self.resources.clone()
    }
}
