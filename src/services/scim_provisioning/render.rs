//! Stored resources to SCIM response documents.

use serde_json::Value;

use super::Directory;
use crate::{
    models::StoredResource,
    scim::{ResourceKind, ResourceView, SCHEMA_ENTERPRISE_USER, ScimMeta, generate_etag},
};

/// The resource version (`meta.version` and the `ETag` header).
///
/// Hashes the stored representation plus the id, so a password change bumps
/// the version even though the password is never returned.
pub(super) fn resource_version(resource: &StoredResource) -> String {
    let mut canonical = resource.data.clone();
    canonical.insert("id".to_string(), Value::String(resource.id.clone()));
    generate_etag(&canonical)
}

/// Render a stored User or Group as its SCIM representation.
pub(super) fn render(resource: &StoredResource, directory: &Directory) -> ResourceView {
    let mut view = resource.data.clone();
    let mut schemas = vec![Value::String(resource.kind.schema().to_string())];

    match resource.kind {
        ResourceKind::User => {
            view.remove("password");

            if let Some(Value::Object(extension)) = view.get_mut(SCHEMA_ENTERPRISE_USER) {
                schemas.push(Value::String(SCHEMA_ENTERPRISE_USER.to_string()));
                if let Some(Value::Object(manager)) = extension.get_mut("manager")
                    && manager.contains_key("$ref")
                    && let Some(id) = manager.get("value").and_then(Value::as_str)
                {
                    let location = directory.location(ResourceKind::User, id);
                    manager.insert("$ref".to_string(), Value::String(location));
                }
            }

            let groups = directory.groups_of(&resource.id);
            if !groups.is_empty() {
                view.insert("groups".to_string(), Value::Array(groups));
            }
        }
        ResourceKind::Group => {
            if let Some(Value::Array(members)) = view.get_mut("members") {
                for member in members.iter_mut().filter_map(Value::as_object_mut) {
                    let kind = match member.get("type").and_then(Value::as_str) {
                        Some(t) if t.eq_ignore_ascii_case("group") => ResourceKind::Group,
                        _ => ResourceKind::User,
                    };
                    if let Some(id) = member.get("value").and_then(Value::as_str) {
                        let location = directory.location(kind, id);
                        member.insert("$ref".to_string(), Value::String(location));
                    }
                }
            }
        }
    }

    let meta = ScimMeta::resource(resource.kind.as_str(), resource.created, resource.last_modified)
        .with_location(directory.location(resource.kind, &resource.id))
        .with_version(resource_version(resource));

    view.insert("schemas".to_string(), Value::Array(schemas));
    view.insert("id".to_string(), Value::String(resource.id.clone()));
    view.insert(
        "meta".to_string(),
        serde_json::to_value(meta).unwrap_or(Value::Null),
    );
    view
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::services::scim_provisioning::directory::tests::stored;

    fn directory() -> Directory {
        Directory::from_parts(
            "https://example.com/scim/v2",
            vec![],
            vec![stored(
                ResourceKind::Group,
                "g-1",
                json!({
                    "displayName": "Admins",
                    "members": [
                        {"value": "u-1", "type": "User", "$ref": "http://old-host/Users/u-1"},
                        {"value": "g-2", "type": "Group"}
                    ]
                }),
            )],
        )
    }

    #[test]
    fn test_render_user() {
        let dir = directory();
        let user = stored(
            ResourceKind::User,
            "u-1",
            json!({
                "userName": "bjensen",
                "password": "digest",
                SCHEMA_ENTERPRISE_USER: {
                    "manager": {"value": "u-9", "$ref": "http://old-host/Users/u-9"}
                }
            }),
        );

        let view = render(&user, &dir);
        assert_eq!(view["id"], "u-1");
        assert!(!view.contains_key("password"));
        assert_eq!(
            view["schemas"],
            json!([
                "urn:ietf:params:scim:schemas:core:2.0:User",
                SCHEMA_ENTERPRISE_USER
            ])
        );
        assert_eq!(
            view[SCHEMA_ENTERPRISE_USER]["manager"]["$ref"],
            "https://example.com/scim/v2/Users/u-9"
        );
        assert_eq!(view["groups"][0]["value"], "g-1");
        assert_eq!(view["meta"]["resourceType"], "User");
        assert_eq!(
            view["meta"]["location"],
            "https://example.com/scim/v2/Users/u-1"
        );
        assert_eq!(view["meta"]["version"], resource_version(&user));
    }

    #[test]
    fn test_unresolved_manager_has_no_ref() {
        let dir = directory();
        let user = stored(
            ResourceKind::User,
            "u-2",
            json!({"userName": "b", SCHEMA_ENTERPRISE_USER: {"manager": {"value": "ext-1"}}}),
        );
        let view = render(&user, &dir);
        assert!(view[SCHEMA_ENTERPRISE_USER]["manager"].get("$ref").is_none());
        assert!(!view.contains_key("groups"));
    }

    #[test]
    fn test_render_group_refreshes_member_refs() {
        let dir = directory();
        let view = render(&dir.groups()[0], &dir);
        assert_eq!(view["schemas"], json!(["urn:ietf:params:scim:schemas:core:2.0:Group"]));
        assert_eq!(
            view["members"][0]["$ref"],
            "https://example.com/scim/v2/Users/u-1"
        );
        assert_eq!(
            view["members"][1]["$ref"],
            "https://example.com/scim/v2/Groups/g-2"
        );
    }

    #[test]
    fn test_version_tracks_password() {
        let a = stored(ResourceKind::User, "u-1", json!({"userName": "a", "password": "x"}));
        let b = stored(ResourceKind::User, "u-1", json!({"userName": "a", "password": "y"}));
        let c = stored(ResourceKind::User, "u-2", json!({"userName": "a", "password": "x"}));
        assert_ne!(resource_version(&a), resource_version(&b));
        assert_ne!(resource_version(&a), resource_version(&c));
        assert_eq!(resource_version(&a), resource_version(&a.clone()));
    }
}
