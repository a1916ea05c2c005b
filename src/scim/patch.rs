//! SCIM 2.0 PATCH Operations
//!
//! This module implements parsing and execution of SCIM PATCH operations per RFC 7644 Section 3.5.2.
//!
//! ## Operations
//!
//! - `add`: Add value(s) to an attribute
//! - `remove`: Remove attribute or specific value from multi-valued attribute
//! - `replace`: Replace attribute value
//!
//! Operation names are matched case-insensitively (Azure AD sends `Replace`).
//!
//! ## Targets
//!
//! | Path | Effect |
//! |------|--------|
//! | none | value is an object of top-level replacements |
//! | `urn:...:enterprise:2.0:User:department` | enterprise extension field |
//! | `emails[type eq "work"].value` | sub-attribute of every matching item |
//! | `members[value eq "u1"]` | the matching items themselves |
//! | `name.givenName`, `emails`, `active` | simple attribute, complex field or whole collection |
//!
//! ## Examples
//!
//! ```json
//! {
//!   "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
//!   "Operations": [
//!     { "op": "replace", "path": "displayName", "value": "New Name" },
//!     { "op": "add", "path": "emails", "value": [{"type": "home", "value": "home@example.com"}] },
//!     { "op": "remove", "path": "members[value eq \"user-123\"]" }
//!   ]
//! }
//! ```
//!
//! Operations run in order against a working [`PatchDocument`], each seeing the
//! effects of the previous ones. The first failure aborts the whole request and
//! is reported with its 1-based operation number.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{
    error::{ScimError, ScimResult},
    evaluator::{ResourceView, get_ci, matching_indices},
    filter::parse_filter,
    path::{ParsedPath, parse_path},
    types::{SCHEMA_ENTERPRISE_USER, SCHEMA_GROUP, SCHEMA_PATCH_OP, SCHEMA_USER},
};

// =============================================================================
// Request Types
// =============================================================================

/// A SCIM PATCH request containing one or more operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchRequest {
    /// SCIM schema URIs (must contain the PatchOp schema)
    #[serde(default)]
    pub schemas: Vec<String>,

    /// List of patch operations to apply
    #[serde(rename = "Operations", default)]
    pub operations: Vec<PatchOperation>,
}

impl PatchRequest {
    /// Create a new patch request with operations
    pub fn new(operations: Vec<PatchOperation>) -> Self {
        Self {
            schemas: vec![SCHEMA_PATCH_OP.to_string()],
            operations,
        }
    }

    /// Check the envelope before any operation is applied.
    pub fn validate(&self) -> ScimResult<()> {
        if !self.schemas.iter().any(|s| s == SCHEMA_PATCH_OP) {
            return Err(ScimError::invalid_patch(format!(
                "Request must include the {} schema",
                SCHEMA_PATCH_OP
            )));
        }
        if self.operations.is_empty() {
            return Err(ScimError::invalid_patch(
                "Request must contain at least one operation",
            ));
        }
        Ok(())
    }
}

/// A single SCIM PATCH operation as received on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: "add".to_string(),
            path: Some(path.into()),
            value: Some(value),
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: "replace".to_string(),
            path: Some(path.into()),
            value: Some(value),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: "remove".to_string(),
            path: Some(path.into()),
            value: None,
        }
    }

    /// The path, if present and not blank.
    pub fn target_path(&self) -> Option<&str> {
        self.path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

/// Normalized operation name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOpKind {
    Add,
    Remove,
    Replace,
}

impl PatchOpKind {
    pub fn parse(op: &str) -> ScimResult<Self> {
        match op.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(Self::Add),
            "remove" => Ok(Self::Remove),
            "replace" => Ok(Self::Replace),
            other => Err(ScimError::invalid_patch(format!(
                "Unsupported operation '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for PatchOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchOpKind::Add => write!(f, "add"),
            PatchOpKind::Remove => write!(f, "remove"),
            PatchOpKind::Replace => write!(f, "replace"),
        }
    }
}

// =============================================================================
// Attribute Catalog
// =============================================================================

/// Multi-valued User attributes held as sub-collections.
pub const USER_COLLECTIONS: &[&str] = &[
    "emails",
    "phoneNumbers",
    "ims",
    "photos",
    "addresses",
    "entitlements",
    "roles",
    "x509Certificates",
];

/// Multi-valued Group attributes held as sub-collections.
pub const GROUP_COLLECTIONS: &[&str] = &["members"];

pub(crate) const USER_SCALARS: &[&str] = &[
    "userName",
    "externalId",
    "displayName",
    "nickName",
    "profileUrl",
    "title",
    "userType",
    "preferredLanguage",
    "locale",
    "timezone",
    "active",
    "password",
];

pub(crate) const NAME_FIELDS: &[&str] = &[
    "formatted",
    "familyName",
    "givenName",
    "middleName",
    "honorificPrefix",
    "honorificSuffix",
];

pub(crate) const ENTERPRISE_FIELDS: &[&str] = &[
    "employeeNumber",
    "costCenter",
    "organization",
    "division",
    "department",
    "manager",
];

const READ_ONLY: &[&str] = &["id", "meta", "schemas", "groups"];

/// Case-insensitive lookup of `name` in a catalog, returning the canonical spelling.
pub(crate) fn canonical(catalog: &'static [&'static str], name: &str) -> Option<&'static str> {
    catalog
        .iter()
        .copied()
        .find(|candidate| candidate.eq_ignore_ascii_case(name))
}

/// Accept JSON booleans and the `"True"`/`"False"` strings some IdPs send.
pub(crate) fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn is_primary(item: &ResourceView) -> bool {
    get_ci(item, "primary").and_then(coerce_bool).unwrap_or(false)
}

// =============================================================================
// Resources
// =============================================================================

/// Which resource schema a document follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    User,
    Group,
}

impl ResourceKind {
    /// Names of the multi-valued attributes held in [`PatchDocument::collections`].
    pub fn collections(self) -> &'static [&'static str] {
        match self {
            ResourceKind::User => USER_COLLECTIONS,
            ResourceKind::Group => GROUP_COLLECTIONS,
        }
    }

    /// The `meta.resourceType` value.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::User => "User",
            ResourceKind::Group => "Group",
        }
    }

    /// The core schema URN.
    pub fn schema(self) -> &'static str {
        match self {
            ResourceKind::User => SCHEMA_USER,
            ResourceKind::Group => SCHEMA_GROUP,
        }
    }

    /// The endpoint segment (`Users` or `Groups`).
    pub fn endpoint(self) -> &'static str {
        match self {
            ResourceKind::User => "Users",
            ResourceKind::Group => "Groups",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource split into its single-valued part and its sub-collections.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchDocument {
    pub kind: ResourceKind,
    pub resource: ResourceView,
    pub collections: BTreeMap<String, Vec<ResourceView>>,
}

impl PatchDocument {
    /// Split a stored resource. Non-object collection items are dropped.
    pub fn from_resource(kind: ResourceKind, mut resource: ResourceView) -> Self {
        let mut collections = BTreeMap::new();
        for name in kind.collections() {
            let items = match resource.remove(*name) {
                Some(Value::Array(items)) => items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(map) => Some(map),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };
            collections.insert((*name).to_string(), items);
        }
        Self {
            kind,
            resource,
            collections,
        }
    }

    /// Merge the collections back. Empty collections are omitted.
    pub fn into_resource(self) -> ResourceView {
        let mut resource = self.resource;
        for (name, items) in self.collections {
            if !items.is_empty() {
                resource.insert(
                    name,
                    Value::Array(items.into_iter().map(Value::Object).collect()),
                );
            }
        }
        resource
    }

    pub fn collection(&self, name: &str) -> &[ResourceView] {
        self.collections
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn collection_mut(&mut self, name: &str) -> &mut Vec<ResourceView> {
        self.collections.entry(name.to_string()).or_default()
    }
}

// =============================================================================
// Reference Resolution
// =============================================================================

/// A resource found by identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedReference {
    pub id: String,
    pub display: Option<String>,
    pub location: Option<String>,
}

/// Looks up Users and Groups referenced from manager and member values.
///
/// Implementations decide which identifiers they accept; the service layer
/// tries id, then userName, then email, then externalId for users.
pub trait ReferenceResolver {
    fn resolve_user(&self, identifier: &str) -> Option<ResolvedReference>;
    fn resolve_group(&self, identifier: &str) -> Option<ResolvedReference>;
}

// =============================================================================
// Engine
// =============================================================================

/// Applies PATCH operations to a [`PatchDocument`].
pub struct PatchEngine<'a> {
    resolver: &'a dyn ReferenceResolver,
}

impl<'a> PatchEngine<'a> {
    pub fn new(resolver: &'a dyn ReferenceResolver) -> Self {
        Self { resolver }
    }

    /// Apply `operations` in order.
    ///
    /// The document is a working copy: on error it is dropped and the caller's
    /// stored resource is left as it was.
    pub fn apply(
        &self,
        document: PatchDocument,
        operations: &[PatchOperation],
    ) -> ScimResult<PatchDocument> {
        let mut working = document;
        for (idx, operation) in operations.iter().enumerate() {
            tracing::debug!(
                index = idx + 1,
                op = %operation.op,
                path = ?operation.path,
                "Applying PATCH operation"
            );
            self.apply_operation(&mut working, operation)
                .map_err(|e| e.at_operation(idx + 1))?;
        }
        Ok(working)
    }

    fn apply_operation(&self, doc: &mut PatchDocument, operation: &PatchOperation) -> ScimResult<()> {
        let kind = PatchOpKind::parse(&operation.op)?;
        let value = operation.value.as_ref().filter(|v| !v.is_null());

        let Some(path) = operation.target_path() else {
            if kind == PatchOpKind::Remove {
                return Err(ScimError::invalid_patch("path required for remove"));
            }
            return self.apply_without_path(doc, kind, value);
        };

        let parsed = parse_path(path)?;
        self.apply_parsed(doc, kind, &parsed, value)
    }

    fn apply_parsed(
        &self,
        doc: &mut PatchDocument,
        kind: PatchOpKind,
        parsed: &ParsedPath,
        value: Option<&Value>,
    ) -> ScimResult<()> {
        if let Some(schema) = &parsed.schema_uri {
            return self.apply_schema_qualified(doc, kind, schema, parsed, value);
        }
        if let Some(expr) = &parsed.filter_expression {
            return self.apply_filtered(doc, kind, parsed, expr, value);
        }
        self.apply_simple(doc, kind, &parsed.attribute, parsed.sub_attribute.as_deref(), value)
    }

    /// Each key of the object value is applied as a replace on that path.
    fn apply_without_path(
        &self,
        doc: &mut PatchDocument,
        kind: PatchOpKind,
        value: Option<&Value>,
    ) -> ScimResult<()> {
        let Some(Value::Object(values)) = value else {
            return Err(ScimError::invalid_patch(format!(
                "'{}' without a path requires an object value",
                kind
            )));
        };

        for (key, v) in values {
            if matches!(key.as_str(), "schemas" | "id" | "meta") {
                continue;
            }
            let parsed = parse_path(key)?;
            let v = Some(v).filter(|v| !v.is_null());
            self.apply_parsed(doc, PatchOpKind::Replace, &parsed, v)?;
        }
        Ok(())
    }

    fn apply_schema_qualified(
        &self,
        doc: &mut PatchDocument,
        kind: PatchOpKind,
        schema: &str,
        parsed: &ParsedPath,
        value: Option<&Value>,
    ) -> ScimResult<()> {
        let whole = format!("{}:{}", schema, parsed.attribute);
        if doc.kind == ResourceKind::User && whole.eq_ignore_ascii_case(SCHEMA_ENTERPRISE_USER) {
            return self.apply_enterprise_object(doc, kind, value);
        }

        if schema.eq_ignore_ascii_case(doc.kind.schema()) {
            return self.apply_simple(
                doc,
                kind,
                &parsed.attribute,
                parsed.sub_attribute.as_deref(),
                value,
            );
        }

        if doc.kind == ResourceKind::User && schema.eq_ignore_ascii_case(SCHEMA_ENTERPRISE_USER) {
            let mut extension = take_extension(&mut doc.resource);
            self.apply_enterprise_field(
                &mut extension,
                kind,
                &parsed.attribute,
                parsed.sub_attribute.as_deref(),
                value,
            )?;
            put_extension(&mut doc.resource, extension);
            return Ok(());
        }

        Err(ScimError::invalid_patch(format!(
            "Unsupported schema '{}' for {}",
            schema, doc.kind
        )))
    }

    fn apply_enterprise_object(
        &self,
        doc: &mut PatchDocument,
        kind: PatchOpKind,
        value: Option<&Value>,
    ) -> ScimResult<()> {
        let mut extension = take_extension(&mut doc.resource);
        match (kind, value) {
            (PatchOpKind::Remove, _) | (_, None) => extension.clear(),
            (_, Some(Value::Object(fields))) => {
                if kind == PatchOpKind::Replace {
                    extension.clear();
                }
                for (field, v) in fields {
                    let v = Some(v).filter(|v| !v.is_null());
                    self.apply_enterprise_field(&mut extension, PatchOpKind::Replace, field, None, v)?;
                }
            }
            (_, Some(_)) => {
                return Err(ScimError::invalid_patch(
                    "Enterprise extension value must be an object",
                ));
            }
        }
        put_extension(&mut doc.resource, extension);
        Ok(())
    }

    fn apply_enterprise_field(
        &self,
        extension: &mut ResourceView,
        kind: PatchOpKind,
        attribute: &str,
        sub_attribute: Option<&str>,
        value: Option<&Value>,
    ) -> ScimResult<()> {
        let field = canonical(ENTERPRISE_FIELDS, attribute).ok_or_else(|| {
            ScimError::invalid_patch(format!("Unknown enterprise attribute '{}'", attribute))
        })?;

        if field == "manager" {
            return self.apply_manager(extension, kind, sub_attribute, value);
        }
        if let Some(sub) = sub_attribute {
            return Err(ScimError::invalid_patch(format!(
                "'{}' has no sub-attribute '{}'",
                field, sub
            )));
        }

        set_field(extension, field, kind, value);
        Ok(())
    }

    fn apply_manager(
        &self,
        extension: &mut ResourceView,
        kind: PatchOpKind,
        sub_attribute: Option<&str>,
        value: Option<&Value>,
    ) -> ScimResult<()> {
        let Some(value) = value.filter(|_| kind != PatchOpKind::Remove) else {
            match sub_attribute {
                Some(sub) if !sub.eq_ignore_ascii_case("value") => {
                    if let Some(Value::Object(manager)) = extension.get_mut("manager") {
                        manager.retain(|k, _| !k.eq_ignore_ascii_case(sub));
                    }
                }
                _ => {
                    extension.remove("manager");
                }
            }
            return Ok(());
        };

        let (identifier, display) = match (sub_attribute, value) {
            (None, Value::String(s)) => (s.clone(), None),
            (None, Value::Object(obj)) => {
                let identifier = get_ci(obj, "value")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let display = get_ci(obj, "displayName")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                (identifier, display)
            }
            (Some(sub), Value::String(s)) if sub.eq_ignore_ascii_case("value") => (s.clone(), None),
            (Some(sub), Value::String(s)) if sub.eq_ignore_ascii_case("displayName") => {
                let Some(Value::Object(manager)) = extension.get_mut("manager") else {
                    return Err(ScimError::invalid_patch(
                        "manager.displayName requires an existing manager",
                    ));
                };
                manager.insert("displayName".to_string(), Value::String(s.clone()));
                return Ok(());
            }
            (Some(sub), _) => {
                return Err(ScimError::invalid_patch(format!(
                    "Cannot set manager sub-attribute '{}'",
                    sub
                )));
            }
            _ => {
                return Err(ScimError::invalid_patch(
                    "manager must be a string or an object with 'value'",
                ));
            }
        };

        if identifier.is_empty() {
            extension.remove("manager");
            return Ok(());
        }

        extension.insert(
            "manager".to_string(),
            Value::Object(manager_reference(self.resolver, &identifier, display)),
        );
        Ok(())
    }

    fn apply_filtered(
        &self,
        doc: &mut PatchDocument,
        kind: PatchOpKind,
        parsed: &ParsedPath,
        expr: &str,
        value: Option<&Value>,
    ) -> ScimResult<()> {
        let name = canonical(doc.kind.collections(), &parsed.attribute).ok_or_else(|| {
            ScimError::invalid_patch(format!(
                "Attribute '{}' does not support filters",
                parsed.attribute
            ))
        })?;
        let node = parse_filter(expr)?;
        let resource_kind = doc.kind;
        let items = doc.collection_mut(name);
        let matches = matching_indices(items, &node);

        match (kind, parsed.sub_attribute.as_deref()) {
            (PatchOpKind::Remove, Some(sub)) => {
                for idx in matches {
                    items[idx].retain(|k, _| !k.eq_ignore_ascii_case(sub));
                }
            }
            (PatchOpKind::Remove, None) => remove_indices(items, &matches),
            (_, Some(sub)) => {
                if resource_kind == ResourceKind::Group && !sub.eq_ignore_ascii_case("display") {
                    return Err(ScimError::invalid_patch(format!(
                        "Cannot update sub-attribute '{}' of members",
                        sub
                    )));
                }
                set_item_field(items, &matches, sub, kind, value)?;
            }
            (_, None) => {
                remove_indices(items, &matches);
                match resource_kind {
                    ResourceKind::User => {
                        for item in items_from(value)? {
                            push_item(items, item);
                        }
                    }
                    ResourceKind::Group => {
                        for entry in member_entries(value) {
                            self.add_member(items, entry);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn apply_simple(
        &self,
        doc: &mut PatchDocument,
        kind: PatchOpKind,
        attribute: &str,
        sub_attribute: Option<&str>,
        value: Option<&Value>,
    ) -> ScimResult<()> {
        if let Some(name) = canonical(doc.kind.collections(), attribute) {
            return match doc.kind {
                ResourceKind::User => apply_collection(doc.collection_mut(name), kind, sub_attribute, value),
                ResourceKind::Group => {
                    if let Some(sub) = sub_attribute {
                        return Err(ScimError::invalid_patch(format!(
                            "members.{} requires a value filter",
                            sub
                        )));
                    }
                    self.apply_members(doc.collection_mut(name), kind, value);
                    Ok(())
                }
            };
        }

        if canonical(READ_ONLY, attribute).is_some() {
            return Err(ScimError::invalid_patch(format!(
                "Attribute '{}' is read-only",
                attribute
            )));
        }

        match doc.kind {
            ResourceKind::User => apply_user_attribute(&mut doc.resource, kind, attribute, sub_attribute, value),
            ResourceKind::Group => apply_group_attribute(&mut doc.resource, kind, attribute, sub_attribute, value),
        }
    }

    fn apply_members(&self, members: &mut Vec<ResourceView>, kind: PatchOpKind, value: Option<&Value>) {
        match kind {
            PatchOpKind::Add => {
                for entry in member_entries(value) {
                    self.add_member(members, entry);
                }
            }
            PatchOpKind::Replace => {
                members.clear();
                for entry in member_entries(value) {
                    self.add_member(members, entry);
                }
            }
            PatchOpKind::Remove => {
                if value.is_none() {
                    members.clear();
                    return;
                }
                for entry in member_entries(value) {
                    self.remove_member(members, &entry.value);
                }
            }
        }
    }

    fn add_member(&self, members: &mut Vec<ResourceView>, entry: MemberEntry) {
        let (resolved, member_type) = if entry.member_type.eq_ignore_ascii_case("group") {
            (self.resolver.resolve_group(&entry.value), "Group")
        } else if entry.member_type.eq_ignore_ascii_case("user") {
            (self.resolver.resolve_user(&entry.value), "User")
        } else {
            tracing::warn!(member = %entry.value, member_type = %entry.member_type, "Unknown member type, skipping");
            return;
        };

        let Some(resolved) = resolved else {
            tracing::warn!(member = %entry.value, member_type, "Member not found, skipping");
            return;
        };

        let duplicate = members.iter().any(|m| {
            m.get("value").and_then(Value::as_str) == Some(resolved.id.as_str())
                && m.get("type")
                    .and_then(Value::as_str)
                    .is_none_or(|t| t.eq_ignore_ascii_case(member_type))
        });
        if duplicate {
            tracing::debug!(member = %resolved.id, "Already a member, skipping");
            return;
        }

        let mut member = Map::new();
        member.insert("value".to_string(), Value::String(resolved.id));
        member.insert("type".to_string(), Value::String(member_type.to_string()));
        if let Some(display) = entry.display.or(resolved.display) {
            member.insert("display".to_string(), Value::String(display));
        }
        if let Some(location) = resolved.location {
            member.insert("$ref".to_string(), Value::String(location));
        }
        members.push(member);
    }

    /// Remove by identifier, trying it as a user first and then as a group.
    fn remove_member(&self, members: &mut Vec<ResourceView>, identifier: &str) {
        let candidates = [
            self.resolver.resolve_user(identifier).map(|r| r.id),
            self.resolver.resolve_group(identifier).map(|r| r.id),
            Some(identifier.to_string()),
        ];

        for candidate in candidates.into_iter().flatten() {
            let before = members.len();
            members.retain(|m| m.get("value").and_then(Value::as_str) != Some(candidate.as_str()));
            if members.len() != before {
                return;
            }
        }
        tracing::warn!(member = %identifier, "Member not found in group");
    }
}

/// Build the stored manager object for `identifier`.
///
/// A resolved manager stores the target id and its `$ref`; an unresolved one
/// keeps the identifier as sent and has no `$ref`.
pub fn manager_reference(
    resolver: &dyn ReferenceResolver,
    identifier: &str,
    display: Option<String>,
) -> ResourceView {
    let mut manager = Map::new();
    match resolver.resolve_user(identifier) {
        Some(resolved) => {
            manager.insert("value".to_string(), Value::String(resolved.id));
            if let Some(location) = resolved.location {
                manager.insert("$ref".to_string(), Value::String(location));
            }
            if let Some(display) = display.or(resolved.display) {
                manager.insert("displayName".to_string(), Value::String(display));
            }
        }
        None => {
            tracing::debug!(manager = %identifier, "Manager not resolved yet");
            manager.insert("value".to_string(), Value::String(identifier.to_string()));
            if let Some(display) = display {
                manager.insert("displayName".to_string(), Value::String(display));
            }
        }
    }
    manager
}

// =============================================================================
// Attribute Helpers
// =============================================================================

fn set_field(target: &mut ResourceView, field: &str, kind: PatchOpKind, value: Option<&Value>) {
    match (kind, value) {
        (PatchOpKind::Remove, _) | (_, None) => {
            target.remove(field);
        }
        (_, Some(v)) => {
            target.insert(field.to_string(), v.clone());
        }
    }
}

fn apply_user_attribute(
    resource: &mut ResourceView,
    kind: PatchOpKind,
    attribute: &str,
    sub_attribute: Option<&str>,
    value: Option<&Value>,
) -> ScimResult<()> {
    if attribute.eq_ignore_ascii_case("name") {
        return apply_name(resource, kind, sub_attribute, value);
    }

    let field = canonical(USER_SCALARS, attribute)
        .ok_or_else(|| ScimError::invalid_patch(format!("Unknown attribute '{}'", attribute)))?;
    if let Some(sub) = sub_attribute {
        return Err(ScimError::invalid_patch(format!(
            "'{}' has no sub-attribute '{}'",
            field, sub
        )));
    }

    let setting = kind != PatchOpKind::Remove && value.is_some();
    match field {
        "userName" if !setting => Err(ScimError::invalid_patch("userName is required")),
        "userName" => match value.and_then(Value::as_str).map(str::trim) {
            Some(name) if !name.is_empty() => {
                resource.insert(field.to_string(), Value::String(name.to_string()));
                Ok(())
            }
            _ => Err(ScimError::invalid_patch("userName must be a non-empty string")),
        },
        "active" if setting => {
            let active = value.and_then(coerce_bool).ok_or_else(|| {
                ScimError::invalid_patch("active must be a boolean")
            })?;
            resource.insert(field.to_string(), Value::Bool(active));
            Ok(())
        }
        _ => {
            set_field(resource, field, kind, value);
            Ok(())
        }
    }
}

fn apply_name(
    resource: &mut ResourceView,
    kind: PatchOpKind,
    sub_attribute: Option<&str>,
    value: Option<&Value>,
) -> ScimResult<()> {
    let mut name = match resource.remove("name") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    match sub_attribute {
        Some(sub) => {
            let field = canonical(NAME_FIELDS, sub).ok_or_else(|| {
                ScimError::invalid_patch(format!("Unknown sub-attribute '{}' for 'name'", sub))
            })?;
            set_field(&mut name, field, kind, value);
        }
        None => match (kind, value) {
            (PatchOpKind::Remove, _) | (_, None) => name.clear(),
            (_, Some(Value::Object(fields))) => {
                if kind == PatchOpKind::Replace {
                    name.clear();
                }
                for (key, v) in fields {
                    if let Some(field) = canonical(NAME_FIELDS, key) {
                        set_field(&mut name, field, PatchOpKind::Replace, Some(v).filter(|v| !v.is_null()));
                    }
                }
            }
            (_, Some(_)) => return Err(ScimError::invalid_patch("name must be an object")),
        },
    }

    if !name.is_empty() {
        resource.insert("name".to_string(), Value::Object(name));
    }
    Ok(())
}

fn apply_group_attribute(
    resource: &mut ResourceView,
    kind: PatchOpKind,
    attribute: &str,
    sub_attribute: Option<&str>,
    value: Option<&Value>,
) -> ScimResult<()> {
    if let Some(sub) = sub_attribute {
        return Err(ScimError::invalid_patch(format!(
            "'{}' has no sub-attribute '{}'",
            attribute, sub
        )));
    }

    if attribute.eq_ignore_ascii_case("displayName") {
        if kind == PatchOpKind::Remove {
            return Err(ScimError::invalid_patch("displayName is required"));
        }
        return match value.and_then(Value::as_str).map(str::trim) {
            Some(name) if !name.is_empty() => {
                resource.insert("displayName".to_string(), Value::String(name.to_string()));
                Ok(())
            }
            _ => Err(ScimError::invalid_patch("displayName must be a non-empty string")),
        };
    }

    if attribute.eq_ignore_ascii_case("externalId") {
        set_field(resource, "externalId", kind, value);
        return Ok(());
    }

    Err(ScimError::invalid_patch(format!(
        "Unknown attribute '{}' for groups",
        attribute
    )))
}

fn apply_collection(
    items: &mut Vec<ResourceView>,
    kind: PatchOpKind,
    sub_attribute: Option<&str>,
    value: Option<&Value>,
) -> ScimResult<()> {
    if let Some(sub) = sub_attribute {
        let all: Vec<usize> = (0..items.len()).collect();
        if kind == PatchOpKind::Remove {
            for item in items.iter_mut() {
                item.retain(|k, _| !k.eq_ignore_ascii_case(sub));
            }
            return Ok(());
        }
        return set_item_field(items, &all, sub, kind, value);
    }

    match kind {
        PatchOpKind::Add => {
            for item in items_from(value)? {
                push_item(items, item);
            }
        }
        PatchOpKind::Replace => {
            let replacement = items_from(value)?;
            items.clear();
            for item in replacement {
                push_item(items, item);
            }
        }
        PatchOpKind::Remove => match value {
            None => items.clear(),
            Some(v) => {
                let targets = removal_values(v);
                items.retain(|item| {
                    item.get("value")
                        .and_then(Value::as_str)
                        .is_none_or(|existing| !targets.iter().any(|t| t == existing))
                });
            }
        },
    }
    Ok(())
}

/// `value` strings named by a remove operation's value.
fn removal_values(value: &Value) -> Vec<String> {
    let one = |v: &Value| match v {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => obj.get("value").and_then(Value::as_str).map(str::to_string),
        _ => None,
    };
    match value {
        Value::Array(items) => items.iter().filter_map(one).collect(),
        other => one(other).into_iter().collect(),
    }
}

fn items_from(value: Option<&Value>) -> ScimResult<Vec<ResourceView>> {
    match value {
        None => Ok(Vec::new()),
        Some(Value::Object(obj)) => Ok(vec![obj.clone()]),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Object(obj) => Ok(obj.clone()),
                _ => Err(ScimError::invalid_patch(
                    "Multi-valued attribute items must be objects",
                )),
            })
            .collect(),
        Some(_) => Err(ScimError::invalid_patch(
            "Multi-valued attribute value must be an object or an array",
        )),
    }
}

/// Append an item. A primary item first clears `primary` on its siblings.
fn push_item(items: &mut Vec<ResourceView>, mut item: ResourceView) {
    if let Some(flag) = get_ci(&item, "primary").and_then(coerce_bool) {
        item.retain(|k, _| !k.eq_ignore_ascii_case("primary"));
        item.insert("primary".to_string(), Value::Bool(flag));
    }
    if is_primary(&item) {
        clear_primary(items);
    }
    items.push(item);
}

fn clear_primary(items: &mut [ResourceView]) {
    for item in items.iter_mut() {
        if item.contains_key("primary") {
            item.insert("primary".to_string(), Value::Bool(false));
        }
    }
}

fn set_item_field(
    items: &mut [ResourceView],
    targets: &[usize],
    field: &str,
    kind: PatchOpKind,
    value: Option<&Value>,
) -> ScimResult<()> {
    if field.eq_ignore_ascii_case("primary") {
        let flag = match value {
            None => false,
            Some(v) => coerce_bool(v)
                .ok_or_else(|| ScimError::invalid_patch("primary must be a boolean"))?,
        };
        if flag {
            let Some(&first) = targets.first() else {
                return Ok(());
            };
            clear_primary(items);
            items[first].insert("primary".to_string(), Value::Bool(true));
        } else {
            for &idx in targets {
                items[idx].insert("primary".to_string(), Value::Bool(false));
            }
        }
        return Ok(());
    }

    for &idx in targets {
        set_field(&mut items[idx], field, kind, value);
    }
    Ok(())
}

fn remove_indices(items: &mut Vec<ResourceView>, indices: &[usize]) {
    for &idx in indices.iter().rev() {
        items.remove(idx);
    }
}

// =============================================================================
// Enterprise Extension
// =============================================================================

fn take_extension(resource: &mut ResourceView) -> ResourceView {
    match resource.remove(SCHEMA_ENTERPRISE_USER) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Store the extension back and keep `schemas` in step with its presence.
fn put_extension(resource: &mut ResourceView, extension: ResourceView) {
    let present = !extension.is_empty();
    if present {
        resource.insert(SCHEMA_ENTERPRISE_USER.to_string(), Value::Object(extension));
    }

    if let Some(Value::Array(schemas)) = resource.get_mut("schemas") {
        let listed = schemas.iter().any(|s| s.as_str() == Some(SCHEMA_ENTERPRISE_USER));
        if present && !listed {
            schemas.push(Value::String(SCHEMA_ENTERPRISE_USER.to_string()));
        } else if !present && listed {
            schemas.retain(|s| s.as_str() != Some(SCHEMA_ENTERPRISE_USER));
        }
    }
}

// =============================================================================
// Group Members
// =============================================================================

struct MemberEntry {
    value: String,
    member_type: String,
    display: Option<String>,
}

fn member_entries(value: Option<&Value>) -> Vec<MemberEntry> {
    let one = |v: &Value| -> Option<MemberEntry> {
        let entry = match v {
            Value::String(s) => MemberEntry {
                value: s.clone(),
                member_type: "User".to_string(),
                display: None,
            },
            Value::Object(obj) => MemberEntry {
                value: obj.get("value").and_then(Value::as_str)?.to_string(),
                member_type: obj
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("User")
                    .to_string(),
                display: obj
                    .get("display")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            _ => return None,
        };
        (!entry.value.is_empty()).then_some(entry)
    };

    match value {
        None => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(one).collect(),
        Some(other) => one(other).into_iter().collect(),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    struct Directory {
        users: HashMap<&'static str, &'static str>,
        groups: HashMap<&'static str, &'static str>,
    }

    impl Directory {
        fn new() -> Self {
            Self {
                users: HashMap::from([
                    ("u-1", "u-1"),
                    ("alice", "u-1"),
                    ("alice@example.com", "u-1"),
                    ("u-2", "u-2"),
                    ("bob", "u-2"),
                ]),
                groups: HashMap::from([("g-9", "g-9"), ("Admins", "g-9")]),
            }
        }
    }

    impl ReferenceResolver for Directory {
        fn resolve_user(&self, identifier: &str) -> Option<ResolvedReference> {
            self.users.get(identifier).map(|id| ResolvedReference {
                id: id.to_string(),
                display: Some(format!("User {}", id)),
                location: Some(format!("/scim/v2/Users/{}", id)),
            })
        }

        fn resolve_group(&self, identifier: &str) -> Option<ResolvedReference> {
            self.groups.get(identifier).map(|id| ResolvedReference {
                id: id.to_string(),
                display: Some("Admins".to_string()),
                location: Some(format!("/scim/v2/Groups/{}", id)),
            })
        }
    }

    fn user_doc() -> PatchDocument {
        let resource = json!({
            "schemas": [SCHEMA_USER],
            "id": "u-3",
            "userName": "carol",
            "active": true,
            "name": {"givenName": "Carol", "familyName": "Danvers"},
            "emails": [
                {"value": "carol@work.com", "type": "work", "primary": true},
                {"value": "carol@home.com", "type": "home", "primary": false}
            ]
        });
        let Value::Object(map) = resource else { unreachable!() };
        PatchDocument::from_resource(ResourceKind::User, map)
    }

    fn group_doc() -> PatchDocument {
        let resource = json!({
            "schemas": [SCHEMA_GROUP],
            "id": "g-1",
            "displayName": "Engineering",
            "members": [{"value": "u-2", "type": "User", "display": "Bob"}]
        });
        let Value::Object(map) = resource else { unreachable!() };
        PatchDocument::from_resource(ResourceKind::Group, map)
    }

    fn apply(doc: PatchDocument, ops: Vec<PatchOperation>) -> ScimResult<PatchDocument> {
        let directory = Directory::new();
        PatchEngine::new(&directory).apply(doc, &ops)
    }

    fn op(op: &str, path: Option<&str>, value: Option<Value>) -> PatchOperation {
        PatchOperation {
            op: op.to_string(),
            path: path.map(str::to_string),
            value,
        }
    }

    #[test]
    fn test_patch_request_deserialization() {
        let json = r#"{
            "schemas": ["urn:ietf:params:scim:api:messages:2.0:PatchOp"],
            "Operations": [
                {"op": "Replace", "path": "displayName", "value": "New Name"},
                {"op": "add", "path": "emails", "value": [{"type": "work", "value": "work@example.com"}]},
                {"op": "remove", "path": "members[value eq \"user-123\"]"}
            ]
        }"#;

        let request: PatchRequest = serde_json::from_str(json).unwrap();
        assert!(request.validate().is_ok());
        assert_eq!(request.operations.len(), 3);
        assert_eq!(request.operations[0].op, "Replace");
        assert_eq!(request.operations[2].value, None);
    }

    #[test]
    fn test_patch_request_requires_patch_op_schema() {
        let request = PatchRequest {
            schemas: vec![SCHEMA_USER.to_string()],
            operations: vec![PatchOperation::replace("active", json!(false))],
        };
        assert!(matches!(request.validate(), Err(ScimError::InvalidPatch { .. })));

        let empty = PatchRequest::new(vec![]);
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_op_name_is_case_insensitive() {
        let doc = apply(user_doc(), vec![op("REPLACE", Some("title"), Some(json!("CTO")))]).unwrap();
        assert_eq!(doc.resource["title"], "CTO");
        assert!(PatchOpKind::parse("move").is_err());
    }

    #[test]
    fn test_remove_without_path_fails() {
        let err = apply(user_doc(), vec![op("remove", None, None)]).unwrap_err();
        assert_eq!(err.operation_index(), Some(1));
        assert!(err.to_string().contains("path required for remove"));
    }

    #[test]
    fn test_replace_without_path_applies_each_key() {
        let value = json!({
            "active": "False",
            "displayName": "Captain",
            "name.givenName": "Carol Susan",
            "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:department": "Air Force"
        });
        let doc = apply(user_doc(), vec![op("replace", None, Some(value))]).unwrap();

        assert_eq!(doc.resource["active"], false);
        assert_eq!(doc.resource["displayName"], "Captain");
        assert_eq!(doc.resource["name"]["givenName"], "Carol Susan");
        assert_eq!(doc.resource[SCHEMA_ENTERPRISE_USER]["department"], "Air Force");
        assert!(
            doc.resource["schemas"]
                .as_array()
                .unwrap()
                .contains(&json!(SCHEMA_ENTERPRISE_USER))
        );
    }

    #[test]
    fn test_add_without_path_requires_object() {
        let err = apply(user_doc(), vec![op("add", None, Some(json!("x")))]).unwrap_err();
        assert_eq!(err.operation_index(), Some(1));
    }

    #[test]
    fn test_filtered_replace_sets_sub_attribute() {
        let doc = apply(
            user_doc(),
            vec![PatchOperation::replace(
                r#"emails[type eq "work"].value"#,
                json!("captain@work.com"),
            )],
        )
        .unwrap();

        let emails = doc.collection("emails");
        assert_eq!(emails[0]["value"], "captain@work.com");
        assert_eq!(emails[1]["value"], "carol@home.com");
    }

    #[test]
    fn test_filtered_remove_deletes_matches() {
        let doc = apply(
            user_doc(),
            vec![PatchOperation::remove(r#"emails[type eq "home"]"#)],
        )
        .unwrap();
        let emails = doc.collection("emails");
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0]["type"], "work");
    }

    #[test]
    fn test_filtered_replace_without_sub_attribute_swaps_item() {
        let doc = apply(
            user_doc(),
            vec![PatchOperation::replace(
                r#"emails[type eq "home"]"#,
                json!({"value": "new@home.com", "type": "home"}),
            )],
        )
        .unwrap();
        let emails = doc.collection("emails");
        assert_eq!(emails.len(), 2);
        assert_eq!(emails[1]["value"], "new@home.com");
    }

    #[test]
    fn test_filter_on_single_valued_attribute_fails() {
        let err = apply(
            user_doc(),
            vec![PatchOperation::remove(r#"userName[value eq "x"]"#)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("does not support filters"));
    }

    #[test]
    fn test_primary_is_exclusive_via_filter() {
        let doc = apply(
            user_doc(),
            vec![PatchOperation::replace(
                r#"emails[type eq "home"].primary"#,
                json!(true),
            )],
        )
        .unwrap();

        let emails = doc.collection("emails");
        let primaries: Vec<_> = emails.iter().filter(|e| is_primary(e)).collect();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0]["type"], "home");
    }

    #[test]
    fn test_primary_is_exclusive_on_add() {
        let doc = apply(
            user_doc(),
            vec![PatchOperation::add(
                "emails",
                json!([{"value": "new@corp.com", "type": "other", "primary": "True"}]),
            )],
        )
        .unwrap();

        let emails = doc.collection("emails");
        assert_eq!(emails.len(), 3);
        assert_eq!(emails.iter().filter(|e| is_primary(e)).count(), 1);
        assert_eq!(emails[2]["primary"], true);
    }

    #[test]
    fn test_operations_see_previous_effects() {
        let doc = apply(
            user_doc(),
            vec![
                PatchOperation::add("emails", json!({"value": "x@corp.com", "type": "other"})),
                PatchOperation::replace(r#"emails[value eq "x@corp.com"].type"#, json!("work")),
            ],
        )
        .unwrap();

        let emails = doc.collection("emails");
        assert_eq!(emails[2]["type"], "work");
    }

    #[test]
    fn test_failure_reports_operation_index() {
        let original = user_doc();
        let ops = vec![
            PatchOperation::replace("title", json!("Pilot")),
            PatchOperation::replace("nickName", json!("Cap")),
            PatchOperation::replace("emails[type eq", json!("broken")),
            PatchOperation::replace("locale", json!("en-US")),
            PatchOperation::replace("timezone", json!("UTC")),
        ];

        let err = apply(original.clone(), ops).unwrap_err();
        assert_eq!(err.operation_index(), Some(3));
        assert!(err.to_string().starts_with("Operation 3:"));
        assert!(original.resource.get("title").is_none());
    }

    #[test]
    fn test_replace_collection_and_remove_by_value() {
        let doc = apply(
            user_doc(),
            vec![
                PatchOperation::replace(
                    "phoneNumbers",
                    json!([{"value": "555-1"}, {"value": "555-2"}]),
                ),
                op("remove", Some("phoneNumbers"), Some(json!([{"value": "555-1"}]))),
            ],
        )
        .unwrap();
        let phones = doc.collection("phoneNumbers");
        assert_eq!(phones.len(), 1);
        assert_eq!(phones[0]["value"], "555-2");

        let cleared = apply(doc, vec![PatchOperation::remove("phoneNumbers")]).unwrap();
        assert!(cleared.collection("phoneNumbers").is_empty());
        assert!(cleared.into_resource().get("phoneNumbers").is_none());
    }

    #[test]
    fn test_name_sub_attribute() {
        let doc = apply(
            user_doc(),
            vec![
                PatchOperation::replace("name.familyName", json!("Marvel")),
                PatchOperation::remove("name.givenName"),
            ],
        )
        .unwrap();
        assert_eq!(doc.resource["name"], json!({"familyName": "Marvel"}));

        let err = apply(user_doc(), vec![PatchOperation::replace("name.nick", json!("x"))]).unwrap_err();
        assert!(err.to_string().contains("Unknown sub-attribute"));
    }

    #[test]
    fn test_username_cannot_be_removed_or_blank() {
        assert!(apply(user_doc(), vec![PatchOperation::remove("userName")]).is_err());
        assert!(apply(user_doc(), vec![PatchOperation::replace("userName", json!("  "))]).is_err());
    }

    #[test]
    fn test_read_only_and_unknown_attributes() {
        let err = apply(user_doc(), vec![PatchOperation::replace("id", json!("x"))]).unwrap_err();
        assert!(err.to_string().contains("read-only"));

        let err = apply(user_doc(), vec![PatchOperation::replace("shoeSize", json!(9))]).unwrap_err();
        assert!(err.to_string().contains("Unknown attribute"));
    }

    #[test]
    fn test_enterprise_manager_resolution() {
        let path = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:manager";
        let doc = apply(
            user_doc(),
            vec![PatchOperation::replace(path, json!({"value": "alice@example.com"}))],
        )
        .unwrap();

        let manager = &doc.resource[SCHEMA_ENTERPRISE_USER]["manager"];
        assert_eq!(manager["value"], "u-1");
        assert_eq!(manager["$ref"], "/scim/v2/Users/u-1");
        assert_eq!(manager["displayName"], "User u-1");
    }

    #[test]
    fn test_enterprise_manager_unresolved_keeps_identifier() {
        let path = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:manager";
        let doc = apply(user_doc(), vec![PatchOperation::replace(path, json!("EMP-404"))]).unwrap();

        let manager = &doc.resource[SCHEMA_ENTERPRISE_USER]["manager"];
        assert_eq!(manager["value"], "EMP-404");
        assert!(manager.get("$ref").is_none());

        let doc = apply(doc, vec![PatchOperation::remove(path)]).unwrap();
        assert!(doc.resource.get(SCHEMA_ENTERPRISE_USER).is_none());
        assert!(
            !doc.resource["schemas"]
                .as_array()
                .unwrap()
                .contains(&json!(SCHEMA_ENTERPRISE_USER))
        );
    }

    #[test]
    fn test_unknown_enterprise_field_fails() {
        let path = "urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:badge";
        assert!(apply(user_doc(), vec![PatchOperation::replace(path, json!("x"))]).is_err());
    }

    #[test]
    fn test_group_add_members_resolves_and_skips() {
        let doc = apply(
            group_doc(),
            vec![PatchOperation::add(
                "members",
                json!([
                    {"value": "alice"},
                    {"value": "bob"},
                    {"value": "ghost"},
                    {"value": "Admins", "type": "Group"}
                ]),
            )],
        )
        .unwrap();

        let members = doc.collection("members");
        let ids: Vec<_> = members.iter().map(|m| m["value"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["u-2", "u-1", "g-9"]);
        assert_eq!(members[1]["$ref"], "/scim/v2/Users/u-1");
        assert_eq!(members[2]["type"], "Group");
    }

    #[test]
    fn test_group_remove_members() {
        let doc = apply(
            group_doc(),
            vec![
                PatchOperation::add("members", json!([{"value": "u-1"}])),
                op("remove", Some("members"), Some(json!([{"value": "bob"}]))),
            ],
        )
        .unwrap();
        let ids: Vec<_> = doc
            .collection("members")
            .iter()
            .map(|m| m["value"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["u-1"]);

        let doc = apply(doc, vec![PatchOperation::remove(r#"members[value eq "u-1"]"#)]).unwrap();
        assert!(doc.collection("members").is_empty());
    }

    #[test]
    fn test_group_member_sub_attribute_rules() {
        let doc = apply(
            group_doc(),
            vec![PatchOperation::replace(
                r#"members[value eq "u-2"].display"#,
                json!("Robert"),
            )],
        )
        .unwrap();
        assert_eq!(doc.collection("members")[0]["display"], "Robert");

        let err = apply(
            group_doc(),
            vec![PatchOperation::replace(r#"members[value eq "u-2"].type"#, json!("Group"))],
        )
        .unwrap_err();
        assert!(err.to_string().contains("Cannot update sub-attribute"));
    }

    #[test]
    fn test_group_display_name_rules() {
        let doc = apply(group_doc(), vec![PatchOperation::replace("displayName", json!("Eng"))]).unwrap();
        assert_eq!(doc.resource["displayName"], "Eng");
        assert!(apply(group_doc(), vec![PatchOperation::remove("displayName")]).is_err());
        assert!(apply(group_doc(), vec![PatchOperation::replace("title", json!("x"))]).is_err());
    }

    #[test]
    fn test_document_round_trip_keeps_order_of_items() {
        let doc = user_doc();
        let resource = doc.clone().into_resource();
        assert_eq!(resource["emails"][0]["value"], "carol@work.com");
        assert_eq!(PatchDocument::from_resource(ResourceKind::User, resource), doc);
    }
}
