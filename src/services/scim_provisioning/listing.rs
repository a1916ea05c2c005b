//! Filtering, sorting and paging of list requests (RFC 7644 Section 3.4.2).

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{
    config::ScimConfig,
    scim::{
        AttributeProjector, ResourceView, ScimError, ScimListParams, ScimListResponse, ScimResult,
        SortOrder, evaluate, evaluator::get_ci, parse_filter,
    },
};

/// A rendered resource plus the timestamps it sorts by.
pub(super) struct ListEntry {
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub view: ResourceView,
}

/// Comparable form of a sort attribute.
#[derive(Debug, PartialEq)]
enum SortKey {
    Bool(bool),
    Number(f64),
    Time(DateTime<Utc>),
    Text(String),
}

impl SortKey {
    fn rank(&self) -> u8 {
        match self {
            SortKey::Bool(_) => 0,
            SortKey::Number(_) => 1,
            SortKey::Time(_) => 2,
            SortKey::Text(_) => 3,
        }
    }

    fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Bool(a), SortKey::Bool(b)) => a.cmp(b),
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Time(a), SortKey::Time(b)) => a.cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

/// Run a list request over every resource of one kind.
///
/// `entries` arrive in creation order, which is also the order when no
/// `sortBy` is given. `totalResults` counts matches before paging.
pub(super) fn list_page(
    entries: Vec<ListEntry>,
    params: &ScimListParams,
    config: &ScimConfig,
) -> ScimResult<ScimListResponse<Value>> {
    let mut entries = entries;

    if let Some(filter) = params.filter.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        if filter.len() > config.max_filter_length {
            return Err(ScimError::invalid_filter(format!(
                "Filter exceeds maximum length of {} characters",
                config.max_filter_length
            )));
        }
        let node = parse_filter(filter)?;
        entries.retain(|entry| evaluate(&entry.view, &node));
    }

    if let Some(sort_by) = params.sort_by.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let descending = params.sort_order() == SortOrder::Descending;
        let mut keyed: Vec<(Option<SortKey>, ListEntry)> = entries
            .into_iter()
            .map(|entry| (sort_key(&entry, sort_by), entry))
            .collect();
        // Resources without the attribute go last in either direction
        keyed.sort_by(|(a, _), (b, _)| match (a, b) {
            (Some(a), Some(b)) if descending => b.compare(a),
            (Some(a), Some(b)) => a.compare(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        entries = keyed.into_iter().map(|(_, entry)| entry).collect();
    } else if params.sort_order() == SortOrder::Descending {
        entries.reverse();
    }

    let total = entries.len();
    let start_index = params.start_index.unwrap_or(1).max(1);
    let count = config.page_size(params.count);

    let projector = AttributeProjector::from_params(
        params.attributes.as_deref(),
        params.excluded_attributes.as_deref(),
    );
    let resources: Vec<Value> = entries
        .into_iter()
        .skip(start_index - 1)
        .take(count)
        .map(|entry| projector.project(&Value::Object(entry.view)))
        .collect();

    Ok(ScimListResponse::new(resources, total, start_index))
}

fn sort_key(entry: &ListEntry, path: &str) -> Option<SortKey> {
    if path.eq_ignore_ascii_case("meta.created") {
        return Some(SortKey::Time(entry.created));
    }
    if path.eq_ignore_ascii_case("meta.lastModified") {
        return Some(SortKey::Time(entry.last_modified));
    }

    let value = lookup(&entry.view, path)?;
    match value {
        Value::Bool(b) => Some(SortKey::Bool(*b)),
        Value::Number(n) => n.as_f64().map(SortKey::Number),
        Value::String(s) => Some(SortKey::Text(s.to_lowercase())),
        _ => None,
    }
}

/// Resolve a sort path to one scalar value.
///
/// Schema-qualified paths look inside the extension object. Multi-valued
/// attributes sort by their primary item, or the first one.
fn lookup<'a>(view: &'a ResourceView, path: &str) -> Option<&'a Value> {
    let (scope, local) = if path.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("urn:")) {
        let pos = path.rfind(':')?;
        match get_ci(view, &path[..pos]) {
            Some(Value::Object(extension)) => (extension, &path[pos + 1..]),
            _ => return None,
        }
    } else {
        (view, path)
    };

    let mut current: Option<&Value> = None;
    for segment in local.split('.') {
        let map = match current {
            None => scope,
            Some(Value::Object(map)) => map,
            Some(Value::Array(items)) => match pick_item(items)? {
                Value::Object(map) => map,
                _ => return None,
            },
            Some(_) => return None,
        };
        current = Some(get_ci(map, segment)?);
    }

    match current? {
        Value::Array(items) => match pick_item(items)? {
            Value::Object(item) => get_ci(item, "value"),
            scalar => Some(scalar),
        },
        value => Some(value),
    }
}

fn pick_item(items: &[Value]) -> Option<&Value> {
    items
        .iter()
        .find(|item| item.get("primary").and_then(Value::as_bool) == Some(true))
        .or_else(|| items.first())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn entries() -> Vec<ListEntry> {
        let base = Utc::now();
        [
            json!({"id": "1", "userName": "carol", "title": "CTO", "emails": [{"value": "c@x.com", "primary": true}]}),
            json!({"id": "2", "userName": "alice", "emails": [{"value": "z@x.com"}, {"value": "a@x.com", "primary": true}]}),
            json!({"id": "3", "userName": "Bob", "title": "Engineer", "active": false}),
        ]
        .into_iter()
        .enumerate()
        .map(|(i, view)| ListEntry {
            created: base + Duration::seconds(i as i64),
            last_modified: base + Duration::seconds(10 - i as i64),
            view: view.as_object().cloned().unwrap(),
        })
        .collect()
    }

    fn ids(response: &ScimListResponse<Value>) -> Vec<String> {
        response
            .resources
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect()
    }

    fn params(value: Value) -> ScimListParams {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_default_is_creation_order() {
        let response = list_page(entries(), &ScimListParams::default(), &ScimConfig::default()).unwrap();
        assert_eq!(ids(&response), vec!["1", "2", "3"]);
        assert_eq!(response.total_results, 3);
        assert_eq!(response.start_index, 1);
        assert_eq!(response.items_per_page, 3);
    }

    #[test]
    fn test_filter_counts_matches_only() {
        let response = list_page(
            entries(),
            &params(json!({"filter": "title pr", "count": 1})),
            &ScimConfig::default(),
        )
        .unwrap();
        assert_eq!(response.total_results, 2);
        assert_eq!(ids(&response), vec!["1"]);
    }

    #[rstest]
    #[case("userName", "ascending", &["2", "3", "1"])]
    #[case("userName", "descending", &["1", "3", "2"])]
    #[case("USERNAME", "bogus", &["2", "3", "1"])]
    #[case("emails", "ascending", &["2", "1", "3"])]
    #[case("title", "descending", &["3", "1", "2"])]
    #[case("meta.created", "descending", &["3", "2", "1"])]
    #[case("meta.lastModified", "ascending", &["3", "2", "1"])]
    fn test_sort(#[case] sort_by: &str, #[case] order: &str, #[case] expected: &[&str]) {
        let response = list_page(
            entries(),
            &params(json!({"sortBy": sort_by, "sortOrder": order})),
            &ScimConfig::default(),
        )
        .unwrap();
        assert_eq!(ids(&response), expected);
    }

    #[rstest]
    #[case(json!({"startIndex": 2, "count": 1}), &["2"], 2)]
    #[case(json!({"startIndex": 0, "count": 2}), &["1", "2"], 1)]
    #[case(json!({"startIndex": 10}), &[], 10)]
    #[case(json!({"count": 0}), &[], 1)]
    fn test_paging(#[case] query: Value, #[case] expected: &[&str], #[case] start: usize) {
        let response = list_page(entries(), &params(query), &ScimConfig::default()).unwrap();
        assert_eq!(ids(&response), expected);
        assert_eq!(response.total_results, 3);
        assert_eq!(response.start_index, start);
    }

    #[test]
    fn test_count_clamped_to_max_page_size() {
        let config = ScimConfig {
            default_page_size: 1,
            max_page_size: 2,
            ..Default::default()
        };
        let response = list_page(entries(), &params(json!({"count": 50})), &config).unwrap();
        assert_eq!(response.items_per_page, 2);

        let response = list_page(entries(), &ScimListParams::default(), &config).unwrap();
        assert_eq!(response.items_per_page, 1);
    }

    #[test]
    fn test_filter_length_limit() {
        let config = ScimConfig {
            max_filter_length: 10,
            ..Default::default()
        };
        let err = list_page(
            entries(),
            &params(json!({"filter": "userName eq \"carol\""})),
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, ScimError::InvalidFilter(_)));
    }

    #[test]
    fn test_invalid_filter() {
        let err = list_page(
            entries(),
            &params(json!({"filter": "userName zz \"carol\""})),
            &ScimConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ScimError::InvalidFilter(_)));
    }

    #[test]
    fn test_projection_applied() {
        let response = list_page(
            entries(),
            &params(json!({"attributes": "userName"})),
            &ScimConfig::default(),
        )
        .unwrap();
        let first = &response.resources[0];
        assert_eq!(first["userName"], "carol");
        assert_eq!(first["id"], "1");
        assert!(first.get("title").is_none());
    }
}
