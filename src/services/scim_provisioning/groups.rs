//! Group provisioning.

use serde_json::Value;
use tracing::info;

use super::{
    Directory, ProvisioningResult, ScimProvisioningError, ScimProvisioningService,
    directory::{has_member, member_is},
    listing::{ListEntry, list_page},
    normalize::normalize_group,
    render::{render, resource_version},
};
use crate::{
    db::DbError,
    models::{NewResource, StoredResource},
    scim::{
        PatchDocument, PatchEngine, PatchRequest, ResourceKind, ResourceView, ScimError,
        ScimListParams, ScimListResponse, check_if_match,
    },
};

impl ScimProvisioningService {
    /// Create a group (`POST /Groups`).
    pub async fn create_group(
        &self,
        app_id: &str,
        body: Value,
        base_url: &str,
    ) -> ProvisioningResult<ResourceView> {
        let _guard = self.lock_app(app_id).await;
        let mut directory = self.directory(app_id, base_url).await?;

        let data = normalize_group(body, &directory)?;
        check_group_uniqueness(&directory, &data, None)?;

        let group = self
            .repo()
            .create(NewResource {
                app_id: app_id.to_string(),
                kind: ResourceKind::Group,
                data,
            })
            .await?;
        info!(
            app_id,
            group_id = %group.id,
            members = member_count(&group),
            "SCIM group created"
        );

        directory.upsert(group.clone());
        Ok(render(&group, &directory))
    }

    /// Get a group by id.
    pub async fn get_group(
        &self,
        app_id: &str,
        id: &str,
        base_url: &str,
    ) -> ProvisioningResult<ResourceView> {
        let directory = self.directory(app_id, base_url).await?;
        let group = directory
            .get(ResourceKind::Group, id)
            .ok_or_else(|| ScimError::not_found("Group", id))?;
        Ok(render(group, &directory))
    }

    /// Replace a group (`PUT /Groups/{id}`), including its member list.
    pub async fn replace_group(
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

        let data = normalize_group(body, &directory)?;
        check_group_uniqueness(&directory, &data, Some(id))?;

        let group = self
            .repo()
            .update(app_id, ResourceKind::Group, id, data, existing.revision)
            .await?;
        info!(app_id, group_id = %id, members = member_count(&group), "SCIM group replaced");

        directory.upsert(group.clone());
        Ok(render(&group, &directory))
    }

    /// Apply PATCH operations to a group.
    ///
    /// Member additions resolve each member by identifier; members that do
    /// not resolve are skipped.
    pub async fn patch_group(
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

        let document = PatchDocument::from_resource(ResourceKind::Group, existing.data.clone());
        let patched = PatchEngine::new(&directory).apply(document, &request.operations)?;
        let data = patched.into_resource();
        check_group_uniqueness(&directory, &data, Some(id))?;

        let group = self
            .repo()
            .update(app_id, ResourceKind::Group, id, data, existing.revision)
            .await?;
        info!(
            app_id,
            group_id = %id,
            operations = request.operations.len(),
            members = member_count(&group),
            "SCIM group patched"
        );

        directory.upsert(group.clone());
        Ok(render(&group, &directory))
    }

    /// Delete a group and remove it from other groups' members.
    pub async fn delete_group(&self, app_id: &str, id: &str) -> ProvisioningResult<()> {
        let _guard = self.lock_app(app_id).await;

        if !self.repo().delete(app_id, ResourceKind::Group, id).await? {
            return Err(ScimError::not_found("Group", id).into());
        }
        let parents = self
            .remove_member_everywhere(app_id, ResourceKind::Group, id)
            .await?;

        info!(app_id, group_id = %id, parents, "SCIM group deleted");
        Ok(())
    }

    /// List groups with optional filter, sort, pagination and projection.
    pub async fn list_groups(
        &self,
        app_id: &str,
        params: &ScimListParams,
        base_url: &str,
    ) -> ProvisioningResult<ScimListResponse<Value>> {
        let directory = self.directory(app_id, base_url).await?;
        let entries = directory
            .groups()
            .iter()
            .map(|group| ListEntry {
                created: group.created,
                last_modified: group.last_modified,
                view: render(group, &directory),
            })
            .collect();
        Ok(list_page(entries, params, &self.scim)?)
    }

    /// Remove the resource from the members of every group that lists it.
    ///
    /// Returns how many groups changed.
    pub(super) async fn remove_member_everywhere(
        &self,
        app_id: &str,
        kind: ResourceKind,
        id: &str,
    ) -> ProvisioningResult<usize> {
        let groups = self.repo().list(app_id, ResourceKind::Group).await?;
        let mut changed = 0;

        for group in groups.into_iter().filter(|g| has_member(g, kind, id)) {
            let mut data = group.data.clone();
            let emptied = match data.get_mut("members") {
                Some(Value::Array(members)) => {
                    members.retain(|m| !member_is(m, kind, id));
                    members.is_empty()
                }
                _ => false,
            };
            if emptied {
                data.remove("members");
            }

            match self
                .repo()
                .update(app_id, ResourceKind::Group, &group.id, data, group.revision)
                .await
            {
                Ok(_) => changed += 1,
                Err(DbError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(changed)
    }
}

fn existing(directory: &Directory, id: &str) -> ProvisioningResult<StoredResource> {
    directory
        .get(ResourceKind::Group, id)
        .cloned()
        .ok_or_else(|| ScimError::not_found("Group", id).into())
}

fn member_count(group: &StoredResource) -> usize {
    group
        .data
        .get("members")
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

fn check_group_uniqueness(
    directory: &Directory,
    data: &ResourceView,
    except: Option<&str>,
) -> ProvisioningResult<()> {
    if let Some(display_name) = data.get("displayName").and_then(Value::as_str)
        && directory.display_name_taken(display_name, except)
    {
        return Err(ScimProvisioningError::Uniqueness(format!(
            "Group with displayName '{}' already exists",
            display_name
        )));
    }
    if let Some(external_id) = data.get("externalId").and_then(Value::as_str)
        && directory.external_id_taken(ResourceKind::Group, external_id, except)
    {
        return Err(ScimProvisioningError::Uniqueness(format!(
            "Group with externalId '{}' already exists",
            external_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{
        config::ScimConfig,
        db::DbPool,
        scim::{PatchOperation, SCHEMA_PATCH_OP},
    };

    const BASE: &str = "http://localhost/scim/v2";

    fn service() -> ScimProvisioningService {
        ScimProvisioningService::new(Arc::new(DbPool::in_memory()), ScimConfig::default())
    }

    fn id_of(view: &ResourceView) -> String {
        view["id"].as_str().unwrap().to_string()
    }

    fn patch(operations: Vec<PatchOperation>) -> PatchRequest {
        PatchRequest {
            schemas: vec![SCHEMA_PATCH_OP.to_string()],
            operations,
        }
    }

    async fn user(svc: &ScimProvisioningService, name: &str) -> String {
        let view = svc
            .create_user("app", json!({"userName": name}), BASE)
            .await
            .unwrap();
        id_of(&view)
    }

    #[tokio::test]
    async fn test_create_group_with_members() {
        let svc = service();
        let alice = user(&svc, "alice").await;

        let group = svc
            .create_group(
                "app",
                json!({
                    "schemas": ["urn:ietf:params:scim:schemas:core:2.0:Group"],
                    "displayName": "Engineering",
                    "members": [{"value": &alice}, {"value": "nobody"}]
                }),
                BASE,
            )
            .await
            .unwrap();

        assert_eq!(group["displayName"], "Engineering");
        assert_eq!(group["meta"]["resourceType"], "Group");
        assert_eq!(
            group["members"],
            json!([{
                "value": &alice,
                "type": "User",
                "display": "alice",
                "$ref": format!("{}/Users/{}", BASE, alice)
            }])
        );
    }

    #[tokio::test]
    async fn test_group_uniqueness() {
        let svc = service();
        svc.create_group("app", json!({"displayName": "Ops", "externalId": "x"}), BASE)
            .await
            .unwrap();

        for body in [
            json!({"displayName": "Ops"}),
            json!({"displayName": "Other", "externalId": "x"}),
        ] {
            let err = svc.create_group("app", body, BASE).await.unwrap_err();
            assert!(matches!(err, ScimProvisioningError::Uniqueness(_)));
        }
    }

    #[tokio::test]
    async fn test_patch_group_members() {
        let svc = service();
        let alice = user(&svc, "alice").await;
        let bob = user(&svc, "bob").await;
        let group = svc
            .create_group("app", json!({"displayName": "Ops"}), BASE)
            .await
            .unwrap();
        let id = id_of(&group);

        let patched = svc
            .patch_group(
                "app",
                &id,
                &patch(vec![
                    PatchOperation::add(
                        "members",
                        json!([{"value": "alice"}, {"value": &bob}, {"value": &alice}]),
                    ),
                    PatchOperation::replace("displayName", json!("Operations")),
                ]),
                None,
                BASE,
            )
            .await
            .unwrap();
        assert_eq!(patched["displayName"], "Operations");
        assert_eq!(patched["members"].as_array().unwrap().len(), 2);

        let patched = svc
            .patch_group(
                "app",
                &id,
                &patch(vec![PatchOperation::remove(format!(
                    "members[value eq \"{}\"]",
                    alice
                ))]),
                None,
                BASE,
            )
            .await
            .unwrap();
        let members = patched["members"].as_array().unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0]["value"], bob.as_str());
    }

    #[tokio::test]
    async fn test_patch_group_if_match() {
        let svc = service();
        let group = svc
            .create_group("app", json!({"displayName": "Ops"}), BASE)
            .await
            .unwrap();
        let id = id_of(&group);

        let err = svc
            .patch_group(
                "app",
                &id,
                &patch(vec![PatchOperation::replace("externalId", json!("e"))]),
                Some("W/\"0000\""),
                BASE,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ScimProvisioningError::Scim(ScimError::PreconditionFailed(_))
        ));

        svc.patch_group(
            "app",
            &id,
            &patch(vec![PatchOperation::replace("externalId", json!("e"))]),
            Some("*"),
            BASE,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_replace_group() {
        let svc = service();
        let alice = user(&svc, "alice").await;
        let group = svc
            .create_group(
                "app",
                json!({"displayName": "Ops", "externalId": "e-1", "members": [{"value": &alice}]}),
                BASE,
            )
            .await
            .unwrap();

        let replaced = svc
            .replace_group("app", &id_of(&group), json!({"displayName": "Ops"}), None, BASE)
            .await
            .unwrap();
        assert!(replaced.get("members").is_none());
        assert!(replaced.get("externalId").is_none());
        assert_eq!(replaced["meta"]["created"], group["meta"]["created"]);
    }

    #[tokio::test]
    async fn test_delete_group_removes_nested_membership() {
        let svc = service();
        let child = svc
            .create_group("app", json!({"displayName": "Child"}), BASE)
            .await
            .unwrap();
        let parent = svc
            .create_group(
                "app",
                json!({"displayName": "Parent", "members": [{"value": "Child", "type": "Group"}]}),
                BASE,
            )
            .await
            .unwrap();
        assert_eq!(parent["members"][0]["type"], "Group");

        svc.delete_group("app", &id_of(&child)).await.unwrap();

        let parent = svc.get_group("app", &id_of(&parent), BASE).await.unwrap();
        assert!(parent.get("members").is_none());

        let err = svc.get_group("app", &id_of(&child), BASE).await.unwrap_err();
        assert!(matches!(
            err,
            ScimProvisioningError::Scim(ScimError::ResourceNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_groups_filter_by_member() {
        let svc = service();
        let alice = user(&svc, "alice").await;
        svc.create_group("app", json!({"displayName": "A", "members": [{"value": &alice}]}), BASE)
            .await
            .unwrap();
        svc.create_group("app", json!({"displayName": "B"}), BASE)
            .await
            .unwrap();

        let params: ScimListParams = serde_json::from_value(json!({
            "filter": format!("members.value eq \"{}\"", alice),
            "excludedAttributes": "members"
        }))
        .unwrap();
        let page = svc.list_groups("app", &params, BASE).await.unwrap();

        assert_eq!(page.total_results, 1);
        assert_eq!(page.resources[0]["displayName"], "A");
        assert!(page.resources[0].get("members").is_none());
    }
}
