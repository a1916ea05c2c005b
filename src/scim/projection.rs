//! Attribute projection for `attributes` / `excludedAttributes` (RFC 7644 Section 3.9)
//!
//! Paths are matched case-insensitively. Extension attributes are addressed with
//! their schema URN, e.g.
//! `urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:department`
//! selects only that attribute, while the bare URN selects the whole extension
//! object.
//!
//! `schemas`, `id` and `meta` (with its sub-attributes) are returned regardless
//! of the request. When both parameters are supplied, `attributes` wins.

use std::collections::HashSet;

use serde_json::{Map, Value};

/// Paths returned in every response.
pub const ALWAYS_RETURNED: &[&str] = &[
    "schemas",
    "id",
    "meta",
    "meta.resourcetype",
    "meta.created",
    "meta.lastmodified",
    "meta.location",
    "meta.version",
];

fn is_always_returned(path: &str) -> bool {
    ALWAYS_RETURNED.contains(&path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Include,
    Exclude,
}

/// Normalized projection request.
#[derive(Debug, Clone)]
pub struct AttributeProjector {
    mode: Option<Mode>,
    paths: HashSet<String>,
}

impl AttributeProjector {
    /// Build a projector from the raw `attributes` and `excludedAttributes` lists.
    pub fn new(attributes: &[String], excluded_attributes: &[String]) -> Self {
        if !attributes.is_empty() {
            Self {
                mode: Some(Mode::Include),
                paths: normalize_paths(attributes),
            }
        } else if !excluded_attributes.is_empty() {
            let mut paths = normalize_paths(excluded_attributes);
            paths.retain(|p| !is_always_returned(p));
            Self {
                mode: Some(Mode::Exclude),
                paths,
            }
        } else {
            Self {
                mode: None,
                paths: HashSet::new(),
            }
        }
    }

    /// Build from comma-separated query parameter values.
    pub fn from_params(attributes: Option<&str>, excluded_attributes: Option<&str>) -> Self {
        Self::new(
            &split_attribute_list(attributes),
            &split_attribute_list(excluded_attributes),
        )
    }

    /// Whether this projector changes anything.
    pub fn is_passthrough(&self) -> bool {
        self.mode.is_none()
    }

    /// Project one resource. Non-object values and passthrough projectors
    /// return a copy of the input.
    pub fn project(&self, resource: &Value) -> Value {
        match (self.mode, resource) {
            (Some(mode), Value::Object(map)) => Value::Object(self.filter_object(map, mode, "")),
            _ => resource.clone(),
        }
    }

    /// Project every resource in a list response.
    pub fn project_all(&self, resources: &[Value]) -> Vec<Value> {
        resources.iter().map(|r| self.project(r)).collect()
    }

    fn should_include(&self, path: &str, mode: Mode) -> bool {
        if is_always_returned(path) {
            return true;
        }
        match mode {
            Mode::Include => self.paths.iter().any(|requested| {
                requested == path
                    || is_descendant(requested, path)
                    || is_descendant(path, requested)
            }),
            Mode::Exclude => !self
                .paths
                .iter()
                .any(|excluded| excluded == path || is_descendant(path, excluded)),
        }
    }

    fn filter_object(&self, data: &Map<String, Value>, mode: Mode, parent: &str) -> Map<String, Value> {
        let mut result = Map::new();

        for (key, value) in data {
            let lowered = key.to_lowercase();
            let is_extension = parent.is_empty() && lowered.starts_with("urn:");
            let path = if parent.is_empty() {
                lowered
            } else {
                format!("{}.{}", parent, lowered)
            };

            if !self.should_include(&path, mode) {
                continue;
            }

            match value {
                Value::Object(nested) if is_extension => {
                    if let Some(filtered) = self.filter_extension(nested, mode, &path) {
                        result.insert(key.clone(), Value::Object(filtered));
                    }
                }
                Value::Object(nested) => {
                    let filtered = self.filter_object(nested, mode, &path);
                    if !filtered.is_empty() || is_always_returned(&path) {
                        result.insert(key.clone(), Value::Object(filtered));
                    }
                }
                Value::Array(items) => {
                    if let Some(filtered) = self.filter_list(items, mode, &path) {
                        result.insert(key.clone(), Value::Array(filtered));
                    }
                }
                scalar => {
                    result.insert(key.clone(), scalar.clone());
                }
            }
        }

        result
    }

    /// Extension objects are keyed by schema URN; their attributes are
    /// addressed as `<urn>:<attr>` rather than with a dot.
    fn filter_extension(
        &self,
        data: &Map<String, Value>,
        mode: Mode,
        urn: &str,
    ) -> Option<Map<String, Value>> {
        if mode == Mode::Include {
            if self.paths.contains(urn) {
                return Some(data.clone());
            }
            let prefix = format!("{}:", urn);
            if !self.paths.iter().any(|p| p.starts_with(&prefix)) {
                return None;
            }
        }

        let mut result = Map::new();
        for (key, value) in data {
            let path = format!("{}:{}", urn, key.to_lowercase());
            if !self.should_include(&path, mode) {
                continue;
            }
            match value {
                Value::Object(nested) => {
                    let filtered = self.filter_object(nested, mode, &path);
                    if !filtered.is_empty() {
                        result.insert(key.clone(), Value::Object(filtered));
                    }
                }
                Value::Array(items) => {
                    if let Some(filtered) = self.filter_list(items, mode, &path) {
                        result.insert(key.clone(), Value::Array(filtered));
                    }
                }
                scalar => {
                    result.insert(key.clone(), scalar.clone());
                }
            }
        }

        (!result.is_empty()).then_some(result)
    }

    /// Filter a multi-valued attribute. An empty input list is kept as `[]`;
    /// a non-empty list that filters down to nothing is dropped.
    fn filter_list(&self, items: &[Value], mode: Mode, path: &str) -> Option<Vec<Value>> {
        if items.is_empty() {
            return Some(Vec::new());
        }

        let filtered: Vec<Value> = items
            .iter()
            .filter_map(|item| match item {
                Value::Object(obj) => {
                    let filtered = self.filter_object(obj, mode, path);
                    (!filtered.is_empty()).then_some(Value::Object(filtered))
                }
                other => self.should_include(path, mode).then(|| other.clone()),
            })
            .collect();

        (!filtered.is_empty()).then_some(filtered)
    }
}

/// `child` is strictly below `ancestor`. Dots separate sub-attributes; inside
/// an extension a colon separates the schema URN from its attributes.
fn is_descendant(child: &str, ancestor: &str) -> bool {
    child.len() > ancestor.len()
        && child.starts_with(ancestor)
        && match child.as_bytes()[ancestor.len()] {
            b'.' => true,
            b':' => ancestor.starts_with("urn:"),
            _ => false,
        }
}

fn normalize_paths(paths: &[String]) -> HashSet<String> {
    paths
        .iter()
        .map(|path| path.trim().to_lowercase())
        .filter(|path| !path.is_empty())
        .collect()
}

/// Split a comma-separated attribute list, dropping blanks.
pub fn split_attribute_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Project a single resource; see [`AttributeProjector`].
pub fn project(resource: &Value, included: &[String], excluded: &[String]) -> Value {
    AttributeProjector::new(included, excluded).project(resource)
}

/// Project each resource of a list response.
pub fn filter_list_response(
    resources: &[Value],
    included: &[String],
    excluded: &[String],
) -> Vec<Value> {
    let projector = AttributeProjector::new(included, excluded);
    if projector.is_passthrough() {
        return resources.to_vec();
    }
    projector.project_all(resources)
}
