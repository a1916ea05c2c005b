//! Per-request snapshot of an application's Users and Groups.

use serde_json::{Map, Value};

use crate::{
    db::{DbResult, ScimResourceRepo},
    models::StoredResource,
    scim::{ReferenceResolver, ResolvedReference, ResourceKind, SCHEMA_ENTERPRISE_USER},
};

/// Every User and Group of one application, loaded once per operation.
///
/// Serves identifier lookups for manager and member references, uniqueness
/// checks, and the computed `groups` attribute of users.
pub(crate) struct Directory {
    base_url: String,
    users: Vec<StoredResource>,
    groups: Vec<StoredResource>,
}

impl Directory {
    pub async fn load(repo: &dyn ScimResourceRepo, app_id: &str, base_url: &str) -> DbResult<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            users: repo.list(app_id, ResourceKind::User).await?,
            groups: repo.list(app_id, ResourceKind::Group).await?,
        })
    }

    #[cfg(test)]
    pub fn from_parts(base_url: &str, users: Vec<StoredResource>, groups: Vec<StoredResource>) -> Self {
        Self {
            base_url: base_url.to_string(),
            users,
            groups,
        }
    }

    pub fn users(&self) -> &[StoredResource] {
        &self.users
    }

    pub fn groups(&self) -> &[StoredResource] {
        &self.groups
    }

    pub fn get(&self, kind: ResourceKind, id: &str) -> Option<&StoredResource> {
        match kind {
            ResourceKind::User => self.users.iter().find(|r| r.id == id),
            ResourceKind::Group => self.groups.iter().find(|r| r.id == id),
        }
    }

    /// `{base_url}/Users/{id}` or `{base_url}/Groups/{id}`.
    pub fn location(&self, kind: ResourceKind, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, kind.endpoint(), id)
    }

    /// Put a freshly written resource into the snapshot.
    pub fn upsert(&mut self, resource: StoredResource) {
        let list = match resource.kind {
            ResourceKind::User => &mut self.users,
            ResourceKind::Group => &mut self.groups,
        };
        match list.iter_mut().find(|r| r.id == resource.id) {
            Some(slot) => *slot = resource,
            None => list.push(resource),
        }
    }

    /// Find a user by id, userName, email, employeeNumber or externalId, in
    /// that order.
    ///
    /// userName and email compare case-insensitively. A primary email match
    /// wins over a match on any other email.
    pub fn find_user(&self, identifier: &str) -> Option<&StoredResource> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return None;
        }
        let lowered = identifier.to_lowercase();

        self.users
            .iter()
            .find(|u| u.id == identifier)
            .or_else(|| {
                self.users.iter().find(|u| {
                    u.str_attr("userName")
                        .is_some_and(|name| name.eq_ignore_ascii_case(identifier))
                })
            })
            .or_else(|| {
                self.users
                    .iter()
                    .find(|u| emails(u).any(|(email, primary)| primary && email == lowered))
            })
            .or_else(|| {
                self.users
                    .iter()
                    .find(|u| emails(u).any(|(email, _)| email == lowered))
            })
            .or_else(|| {
                self.users
                    .iter()
                    .find(|u| employee_number(u) == Some(identifier))
            })
            .or_else(|| {
                self.users
                    .iter()
                    .find(|u| u.str_attr("externalId") == Some(identifier))
            })
    }

    /// Find a group by id, displayName or externalId, in that order.
    pub fn find_group(&self, identifier: &str) -> Option<&StoredResource> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return None;
        }

        self.groups
            .iter()
            .find(|g| g.id == identifier)
            .or_else(|| {
                self.groups
                    .iter()
                    .find(|g| g.str_attr("displayName") == Some(identifier))
            })
            .or_else(|| {
                self.groups
                    .iter()
                    .find(|g| g.str_attr("externalId") == Some(identifier))
            })
    }

    /// The read-only `groups` attribute of a user: every group that lists
    /// the user as a direct member.
    pub fn groups_of(&self, user_id: &str) -> Vec<Value> {
        self.groups
            .iter()
            .filter(|g| has_member(g, ResourceKind::User, user_id))
            .map(|g| {
                let mut entry = Map::new();
                entry.insert("value".to_string(), Value::String(g.id.clone()));
                entry.insert(
                    "$ref".to_string(),
                    Value::String(self.location(ResourceKind::Group, &g.id)),
                );
                if let Some(display) = g.str_attr("displayName") {
                    entry.insert("display".to_string(), Value::String(display.to_string()));
                }
                entry.insert("type".to_string(), Value::String("direct".to_string()));
                Value::Object(entry)
            })
            .collect()
    }

    /// Whether another user already holds `user_name` (case-insensitive).
    pub fn user_name_taken(&self, user_name: &str, except: Option<&str>) -> bool {
        self.users.iter().any(|u| {
            Some(u.id.as_str()) != except
                && u.str_attr("userName")
                    .is_some_and(|name| name.eq_ignore_ascii_case(user_name))
        })
    }

    /// Whether another group already holds `display_name`.
    pub fn display_name_taken(&self, display_name: &str, except: Option<&str>) -> bool {
        self.groups.iter().any(|g| {
            Some(g.id.as_str()) != except && g.str_attr("displayName") == Some(display_name)
        })
    }

    /// Whether another resource of `kind` already holds `external_id`.
    pub fn external_id_taken(&self, kind: ResourceKind, external_id: &str, except: Option<&str>) -> bool {
        let list = match kind {
            ResourceKind::User => &self.users,
            ResourceKind::Group => &self.groups,
        };
        list.iter().any(|r| {
            Some(r.id.as_str()) != except && r.str_attr("externalId") == Some(external_id)
        })
    }

    fn reference(&self, resource: &StoredResource) -> ResolvedReference {
        ResolvedReference {
            id: resource.id.clone(),
            display: resource.display_name().map(str::to_string),
            location: Some(self.location(resource.kind, &resource.id)),
        }
    }
}

impl ReferenceResolver for Directory {
    fn resolve_user(&self, identifier: &str) -> Option<ResolvedReference> {
        self.find_user(identifier).map(|u| self.reference(u))
    }

    fn resolve_group(&self, identifier: &str) -> Option<ResolvedReference> {
        self.find_group(identifier).map(|g| self.reference(g))
    }
}

/// Lowercased email values of a user with their primary flag.
fn emails(user: &StoredResource) -> impl Iterator<Item = (String, bool)> + '_ {
    user.data
        .get("emails")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|email| {
            let value = email.get("value")?.as_str()?.to_lowercase();
            let primary = email.get("primary").and_then(Value::as_bool).unwrap_or(false);
            Some((value, primary))
        })
}

fn employee_number(user: &StoredResource) -> Option<&str> {
    user.data
        .get(SCHEMA_ENTERPRISE_USER)?
        .get("employeeNumber")?
        .as_str()
}

/// Whether `group` lists the resource as a member. Members without a
/// `type` count as users.
pub(crate) fn has_member(group: &StoredResource, kind: ResourceKind, id: &str) -> bool {
    group
        .data
        .get("members")
        .and_then(Value::as_array)
        .is_some_and(|members| members.iter().any(|m| member_is(m, kind, id)))
}

pub(crate) fn member_is(member: &Value, kind: ResourceKind, id: &str) -> bool {
    let type_matches = match member.get("type").and_then(Value::as_str) {
        Some(t) => t.eq_ignore_ascii_case(kind.as_str()),
        None => kind == ResourceKind::User,
    };
    type_matches && member.get("value").and_then(Value::as_str) == Some(id)
}
