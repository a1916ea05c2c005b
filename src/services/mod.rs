mod scim_provisioning;

use std::sync::Arc;

pub use scim_provisioning::{ProvisioningResult, ScimProvisioningError, ScimProvisioningService};

use crate::{config::ScimConfig, db::DbPool};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub scim_provisioning: ScimProvisioningService,
}

impl Services {
    pub fn new(db: Arc<DbPool>, scim: ScimConfig) -> Self {
        Self {
            scim_provisioning: ScimProvisioningService::new(db, scim),
        }
    }
}
