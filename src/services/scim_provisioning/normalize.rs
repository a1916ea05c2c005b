//! Turn request bodies into stored User and Group representations.
//!
//! Only attributes the server models are kept. Read-only attributes (`id`,
//! `meta`, `schemas`, `groups`) and unknown attributes are dropped.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{ProvisioningResult, ScimProvisioningError};
use crate::scim::{
    PatchDocument, PatchEngine, PatchOperation, ReferenceResolver, ResourceKind, ResourceView,
    SCHEMA_ENTERPRISE_USER, SCHEMA_ENTERPRISE_USER_ONELOGIN,
    evaluator::get_ci,
    patch::{
        ENTERPRISE_FIELDS, NAME_FIELDS, USER_COLLECTIONS, USER_SCALARS, canonical, coerce_bool,
        manager_reference,
    },
};

/// Address fields that make an address worth keeping.
const ADDRESS_FIELDS: &[&str] = &[
    "formatted",
    "streetAddress",
    "locality",
    "region",
    "postalCode",
    "country",
    "type",
    "primary",
];

/// SHA-256 hex digest of a password. Only the digest is stored.
pub(super) fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

fn into_object(body: Value) -> ProvisioningResult<ResourceView> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ScimProvisioningError::InvalidSyntax(
            "Request body must be a JSON object".to_string(),
        )),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

// =============================================================================
// Users
// =============================================================================

/// Normalize a User body from POST or PUT.
///
/// `userName` is trimmed and required, `active` defaults to true, emails are
/// lowercased with exactly one primary, a password is replaced by its digest
/// and a manager is resolved through `resolver`.
pub(super) fn normalize_user(
    body: Value,
    resolver: &dyn ReferenceResolver,
) -> ProvisioningResult<ResourceView> {
    let mut body = into_object(body)?;

    // OneLogin sends the enterprise extension under a non-standard URN
    if !body.contains_key(SCHEMA_ENTERPRISE_USER)
        && let Some(extension) = body.remove(SCHEMA_ENTERPRISE_USER_ONELOGIN)
    {
        body.insert(SCHEMA_ENTERPRISE_USER.to_string(), extension);
    }

    let mut data = Map::new();
    for (key, value) in body {
        if value.is_null() {
            continue;
        }
        if key.eq_ignore_ascii_case(SCHEMA_ENTERPRISE_USER) {
            let extension = normalize_enterprise(value, resolver)?;
            if !extension.is_empty() {
                data.insert(SCHEMA_ENTERPRISE_USER.to_string(), Value::Object(extension));
            }
        } else if key.eq_ignore_ascii_case("name") {
            let name = normalize_name(value)?;
            if !name.is_empty() {
                data.insert("name".to_string(), Value::Object(name));
            }
        } else if let Some(collection) = canonical(USER_COLLECTIONS, &key) {
            let items = normalize_collection(collection, value)?;
            if !items.is_empty() {
                data.insert(collection.to_string(), Value::Array(items));
            }
        } else if let Some(field) = canonical(USER_SCALARS, &key) {
            data.insert(field.to_string(), value);
        } else {
            debug!(attribute = %key, "Ignoring unsupported User attribute");
        }
    }

    let user_name = data
        .get("userName")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            ScimProvisioningError::InvalidValue("userName is required and must not be blank".to_string())
        })?
        .to_string();
    data.insert("userName".to_string(), Value::String(user_name));

    let active = match data.get("active") {
        None => true,
        Some(value) => coerce_bool(value).ok_or_else(|| {
            ScimProvisioningError::InvalidValue("active must be a boolean".to_string())
        })?,
    };
    data.insert("active".to_string(), Value::Bool(active));

    match data.remove("password") {
        Some(Value::String(password)) if !password.is_empty() => {
            data.insert("password".to_string(), Value::String(hash_password(&password)));
        }
        Some(Value::String(_)) | None => {}
        Some(_) => {
            return Err(ScimProvisioningError::InvalidValue(
                "password must be a string".to_string(),
            ));
        }
    }

    Ok(data)
}

fn normalize_name(value: Value) -> ProvisioningResult<ResourceView> {
    let Value::Object(fields) = value else {
        return Err(ScimProvisioningError::InvalidValue(
            "name must be an object".to_string(),
        ));
    };
    Ok(fields
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .filter_map(|(key, v)| canonical(NAME_FIELDS, &key).map(|field| (field.to_string(), v)))
        .collect())
}

fn normalize_collection(collection: &str, value: Value) -> ProvisioningResult<Vec<Value>> {
    let Value::Array(items) = value else {
        return Err(ScimProvisioningError::InvalidValue(format!(
            "{} must be an array",
            collection
        )));
    };

    let mut kept: Vec<ResourceView> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .filter(|item| keep_item(collection, item))
        .collect();

    for item in &mut kept {
        if let Some(flag) = get_ci(item, "primary").and_then(coerce_bool) {
            item.retain(|k, _| !k.eq_ignore_ascii_case("primary"));
            item.insert("primary".to_string(), Value::Bool(flag));
        }
    }

    if collection == "emails" {
        for item in &mut kept {
            if let Some(Value::String(email)) = item.get_mut("value") {
                *email = email.trim().to_lowercase();
            }
        }
        let primaries = kept.iter().filter(|item| is_primary(item)).count();
        if primaries > 1 {
            return Err(ScimProvisioningError::InvalidValue(
                "Only one email can be marked as primary".to_string(),
            ));
        }
        if primaries == 0
            && let Some(first) = kept.first_mut()
        {
            first.insert("primary".to_string(), Value::Bool(true));
        }
    } else {
        // Other collections keep their first primary only
        let mut seen_primary = false;
        for item in &mut kept {
            if is_primary(item) {
                if seen_primary {
                    item.insert("primary".to_string(), Value::Bool(false));
                }
                seen_primary = true;
            }
        }
    }

    Ok(kept.into_iter().map(Value::Object).collect())
}

fn keep_item(collection: &str, item: &ResourceView) -> bool {
    if collection == "addresses" {
        ADDRESS_FIELDS
            .iter()
            .any(|field| get_ci(item, field).is_some_and(is_truthy))
    } else {
        get_ci(item, "value").is_some_and(is_truthy)
    }
}

fn is_primary(item: &ResourceView) -> bool {
    item.get("primary").and_then(Value::as_bool).unwrap_or(false)
}

fn normalize_enterprise(
    value: Value,
    resolver: &dyn ReferenceResolver,
) -> ProvisioningResult<ResourceView> {
    let Value::Object(fields) = value else {
        return Err(ScimProvisioningError::InvalidValue(
            "Enterprise extension must be an object".to_string(),
        ));
    };

    let mut extension = Map::new();
    for (key, value) in fields {
        if value.is_null() {
            continue;
        }
        let Some(field) = canonical(ENTERPRISE_FIELDS, &key) else {
            debug!(attribute = %key, "Ignoring unsupported enterprise attribute");
            continue;
        };
        if field != "manager" {
            extension.insert(field.to_string(), value);
            continue;
        }

        let (identifier, display) = match &value {
            Value::String(s) => (s.trim().to_string(), None),
            Value::Object(manager) => (
                get_ci(manager, "value")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .trim()
                    .to_string(),
                get_ci(manager, "displayName")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            ),
            _ => {
                return Err(ScimProvisioningError::InvalidValue(
                    "manager must be a string or an object with 'value'".to_string(),
                ));
            }
        };
        if !identifier.is_empty() {
            extension.insert(
                "manager".to_string(),
                Value::Object(manager_reference(resolver, &identifier, display)),
            );
        }
    }
    Ok(extension)
}

/// Bring a PATCHed user back to its stored form.
///
/// The engine writes a new password verbatim: anything that differs from the
/// stored digest is hashed. Email values are lowercased.
pub(super) fn finish_patched_user(data: &mut ResourceView, previous_password: Option<&Value>) {
    let digest = match data.get("password") {
        Some(current @ Value::String(password)) if Some(current) != previous_password => {
            Some(hash_password(password))
        }
        _ => None,
    };
    if let Some(digest) = digest {
        data.insert("password".to_string(), Value::String(digest));
    }

    if let Some(Value::Array(emails)) = data.get_mut("emails") {
        for email in emails {
            if let Some(Value::String(value)) = email.get_mut("value") {
                *value = value.trim().to_lowercase();
            }
        }
    }
}

// =============================================================================
// Groups
// =============================================================================

/// Normalize a Group body from POST or PUT.
///
/// Members are resolved the same way as a PATCH `replace` of `members`:
/// unknown members and duplicates are skipped.
pub(super) fn normalize_group(
    body: Value,
    resolver: &dyn ReferenceResolver,
) -> ProvisioningResult<ResourceView> {
    let mut body = into_object(body)?;

    let display_name = get_ci(&body, "displayName")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            ScimProvisioningError::InvalidValue(
                "displayName is required and must not be blank".to_string(),
            )
        })?
        .to_string();

    let mut data = Map::new();
    data.insert("displayName".to_string(), Value::String(display_name));

    match get_ci(&body, "externalId") {
        None | Some(Value::Null) => {}
        Some(Value::String(external_id)) => {
            data.insert("externalId".to_string(), Value::String(external_id.clone()));
        }
        Some(_) => {
            return Err(ScimProvisioningError::InvalidValue(
                "externalId must be a string".to_string(),
            ));
        }
    }

    let members_key = body
        .keys()
        .find(|k| k.eq_ignore_ascii_case("members"))
        .cloned();
    let members = members_key
        .and_then(|key| body.remove(&key))
        .filter(|v| !v.is_null());

    let Some(members) = members else {
        return Ok(data);
    };
    if !members.is_array() {
        return Err(ScimProvisioningError::InvalidValue(
            "members must be an array".to_string(),
        ));
    }

    let document = PatchDocument::from_resource(ResourceKind::Group, data);
    let document = PatchEngine::new(resolver)
        .apply(document, &[PatchOperation::replace("members", members)])?;
    Ok(document.into_resource())
}
