//! User provisioning.

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{
    Directory, ProvisioningResult, ScimProvisioningError, ScimProvisioningService,
    listing::{ListEntry, list_page},
    normalize::{finish_patched_user, normalize_user},
    render::{render, resource_version},
};
use crate::{
    db::DbError,
    models::{NewResource, StoredResource},
    scim::{
        PatchDocument, PatchEngine, PatchRequest, ResourceKind, ResourceView,
        SCHEMA_ENTERPRISE_USER, ScimError, ScimListParams, ScimListResponse, check_if_match,
    },
};

impl ScimProvisioningService {
    /// Create a user (`POST /Users`).
    pub async fn create_user(
        &self,
        app_id: &str,
        body: Value,
        base_url: &str,
    ) -> ProvisioningResult<ResourceView> {
        let _guard = self.lock_app(app_id).await;
        let mut directory = self.directory(app_id, base_url).await?;

        let data = normalize_user(body, &directory)?;
        check_user_uniqueness(&directory, &data, None)?;

        let user = self
            .repo()
            .create(NewResource {
                app_id: app_id.to_string(),
                kind: ResourceKind::User,
                data,
            })
            .await?;
        info!(app_id, user_id = %user.id, "SCIM user created");

        self.finish_user_write(user, &mut directory).await
    }

    /// Get a user by id.
    pub async fn get_user(
        &self,
        app_id: &str,
        id: &str,
        base_url: &str,
    ) -> ProvisioningResult<ResourceView> {
        let directory = self.directory(app_id, base_url).await?;
        let user = directory
            .get(ResourceKind::User, id)
            .ok_or_else(|| ScimError::not_found("User", id))?;
        Ok(render(user, &directory))
    }

    /// Replace a user (`PUT /Users/{id}`).
    ///
    /// A body without `password` keeps the stored password.
    pub async fn replace_user(
        &self,
        app_id: &str,
        id: &str,
        body: Value,
        if_match: Option<&str>,
        base_url: &str,
    ) -> ProvisioningResult<ResourceView> {
        let _guard = self.lock_app(app_id).await;
        let mut directory = self.directory(app_id, base_url).await?;
        let existing = existing(&directory, id)?;
        check_if_match(if_match, &resource_version(&existing))?;

        let mut data = normalize_user(body, &directory)?;
        if !data.contains_key("password")
            && let Some(password) = existing.data.get("password")
        {
            data.insert("password".to_string(), password.clone());
        }
        check_user_uniqueness(&directory, &data, Some(id))?;

        let user = self
            .repo()
            .update(app_id, ResourceKind::User, id, data, existing.revision)
            .await?;
        info!(app_id, user_id = %id, "SCIM user replaced");

        self.finish_user_write(user, &mut directory).await
    }

    /// Apply PATCH operations to a user.
    ///
    /// All operations apply to a working copy; nothing is stored unless every
    /// operation succeeds.
    pub async fn patch_user(
        &self,
        app_id: &str,
        id: &str,
        request: &PatchRequest,
        if_match: Option<&str>,
        base_url: &str,
    ) -> ProvisioningResult<ResourceView> {
        request.validate()?;

        let _guard = self.lock_app(app_id).await;
        let mut directory = self.directory(app_id, base_url).await?;
        let existing = existing(&directory, id)?;
        check_if_match(if_match, &resource_version(&existing))?;

        let document = PatchDocument::from_resource(ResourceKind::User, existing.data.clone());
        let patched = PatchEngine::new(&directory).apply(document, &request.operations)?;

        let mut data = patched.into_resource();
        finish_patched_user(&mut data, existing.data.get("password"));
        check_user_uniqueness(&directory, &data, Some(id))?;

        let user = self
            .repo()
            .update(app_id, ResourceKind::User, id, data, existing.revision)
            .await?;
        info!(
            app_id,
            user_id = %id,
            operations = request.operations.len(),
            "SCIM user patched"
        );

        self.finish_user_write(user, &mut directory).await
    }

    /// Delete a user.
    ///
    /// The user is also removed from every group, and users it managed lose
    /// their manager.
    pub async fn delete_user(&self, app_id: &str, id: &str) -> ProvisioningResult<()> {
        let _guard = self.lock_app(app_id).await;

        if !self.repo().delete(app_id, ResourceKind::User, id).await? {
            return Err(ScimError::not_found("User", id).into());
        }
        self.pending.forget(app_id, id);

        let groups = self
            .remove_member_everywhere(app_id, ResourceKind::User, id)
            .await?;
        let reports = self.clear_manager_references(app_id, id).await?;

        info!(app_id, user_id = %id, groups, reports, "SCIM user deleted");
        Ok(())
    }

    /// List users with optional filter, sort, pagination and projection.
    pub async fn list_users(
        &self,
        app_id: &str,
        params: &ScimListParams,
        base_url: &str,
    ) -> ProvisioningResult<ScimListResponse<Value>> {
        let directory = self.directory(app_id, base_url).await?;
        let entries = directory
            .users()
            .iter()
            .map(|user| ListEntry {
                created: user.created,
                last_modified: user.last_modified,
                view: render(user, &directory),
            })
            .collect();
        Ok(list_page(entries, params, &self.scim)?)
    }

    /// Shared tail of every user write: keep the pending-manager index in
    /// step, re-point users waiting for this one, and render the result.
    async fn finish_user_write(
        &self,
        user: StoredResource,
        directory: &mut Directory,
    ) -> ProvisioningResult<ResourceView> {
        self.track_manager(&user);
        directory.upsert(user.clone());
        self.resolve_pending_managers(&user, directory).await?;

        let user = directory.get(ResourceKind::User, &user.id).unwrap_or(&user);
        Ok(render(user, directory))
    }

    /// Record the user's manager in the pending index if it did not resolve.
    fn track_manager(&self, user: &StoredResource) {
        self.pending.forget(&user.app_id, &user.id);
        if let Some(identifier) = pending_manager(user) {
            debug!(user_id = %user.id, manager = %identifier, "Manager pending");
            self.pending
                .record(&user.app_id, &identifier.to_lowercase(), &user.id);
        }
    }

    /// Point users whose manager was unresolved at `manager` when one of its
    /// identifiers matches.
    async fn resolve_pending_managers(
        &self,
        manager: &StoredResource,
        directory: &mut Directory,
    ) -> ProvisioningResult<()> {
        let identifiers = identifiers_of(manager);
        let waiting = self.pending.take_matching(&manager.app_id, &identifiers);

        for user_id in waiting {
            let Some(report) = directory.get(ResourceKind::User, &user_id).cloned() else {
                continue;
            };
            let still_waiting = pending_manager(&report)
                .is_some_and(|identifier| identifiers.contains(&identifier.to_lowercase()));
            if !still_waiting || report.id == manager.id {
                self.track_manager(&report);
                continue;
            }

            let mut data = report.data.clone();
            if let Some(Value::Object(extension)) = data.get_mut(SCHEMA_ENTERPRISE_USER) {
                let display = extension
                    .get("manager")
                    .and_then(|m| m.get("displayName"))
                    .and_then(Value::as_str)
                    .or_else(|| manager.display_name())
                    .map(str::to_string);

                let mut reference = Map::new();
                reference.insert("value".to_string(), Value::String(manager.id.clone()));
                reference.insert(
                    "$ref".to_string(),
                    Value::String(directory.location(ResourceKind::User, &manager.id)),
                );
                if let Some(display) = display {
                    reference.insert("displayName".to_string(), Value::String(display));
                }
                extension.insert("manager".to_string(), Value::Object(reference));
            }

            match self
                .repo()
                .update(&report.app_id, ResourceKind::User, &report.id, data, report.revision)
                .await
            {
                Ok(updated) => {
                    info!(
                        app_id = %updated.app_id,
                        user_id = %updated.id,
                        manager_id = %manager.id,
                        "Resolved pending manager"
                    );
                    directory.upsert(updated);
                }
                Err(DbError::NotFound) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Drop the manager of every user managed by `manager_id`.
    async fn clear_manager_references(
        &self,
        app_id: &str,
        manager_id: &str,
    ) -> ProvisioningResult<usize> {
        let users = self.repo().list(app_id, ResourceKind::User).await?;
        let mut cleared = 0;

        for user in users {
            let managed = user
                .data
                .get(SCHEMA_ENTERPRISE_USER)
                .and_then(|ext| ext.get("manager"))
                .and_then(|m| m.get("value"))
                .and_then(Value::as_str)
                == Some(manager_id);
            if !managed {
                continue;
            }

            let mut data = user.data.clone();
            let emptied = match data.get_mut(SCHEMA_ENTERPRISE_USER) {
                Some(Value::Object(extension)) => {
                    extension.remove("manager");
                    extension.is_empty()
                }
                _ => false,
            };
            if emptied {
                data.remove(SCHEMA_ENTERPRISE_USER);
            }

            match self
                .repo()
                .update(app_id, ResourceKind::User, &user.id, data, user.revision)
                .await
            {
                Ok(_) => cleared += 1,
                Err(DbError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(cleared)
    }
}

fn existing(directory: &Directory, id: &str) -> ProvisioningResult<StoredResource> {
    directory
        .get(ResourceKind::User, id)
        .cloned()
        .ok_or_else(|| ScimError::not_found("User", id).into())
}

fn check_user_uniqueness(
    directory: &Directory,
    data: &ResourceView,
    except: Option<&str>,
) -> ProvisioningResult<()> {
    if let Some(user_name) = data.get("userName").and_then(Value::as_str)
        && directory.user_name_taken(user_name, except)
    {
        return Err(ScimProvisioningError::Uniqueness(format!(
            "User with userName '{}' already exists",
            user_name
        )));
    }
    if let Some(external_id) = data.get("externalId").and_then(Value::as_str)
        && directory.external_id_taken(ResourceKind::User, external_id, except)
    {
        return Err(ScimProvisioningError::Uniqueness(format!(
            "User with externalId '{}' already exists",
            external_id
        )));
    }
    Ok(())
}

/// The identifier of a manager reference that has not resolved (no `$ref`).
fn pending_manager(user: &StoredResource) -> Option<&str> {
    let manager = user.data.get(SCHEMA_ENTERPRISE_USER)?.get("manager")?;
    if manager.get("$ref").is_some() {
        return None;
    }
    manager
        .get("value")
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// Lowercased identifiers a manager reference may have used for `user`.
fn identifiers_of(user: &StoredResource) -> Vec<String> {
    let mut identifiers = vec![user.id.to_lowercase()];
    for attr in ["userName", "externalId"] {
        if let Some(value) = user.str_attr(attr) {
            identifiers.push(value.to_lowercase());
        }
    }
    if let Some(employee_number) = user
        .data
        .get(SCHEMA_ENTERPRISE_USER)
        .and_then(|ext| ext.get("employeeNumber"))
        .and_then(Value::as_str)
    {
        identifiers.push(employee_number.to_lowercase());
    }
    if let Some(Value::Array(emails)) = user.data.get("emails") {
        identifiers.extend(
            emails
                .iter()
                .filter_map(|email| email.get("value").and_then(Value::as_str))
                .map(str::to_lowercase),
        );
    }
    identifiers
}
