//! SCIM filter evaluation against in-memory resources.
//!
//! A [`ResourceView`] is the JSON object form of a resource or of one item of a
//! multi-valued attribute (`{"type": "work", "value": "a@x.com"}`). Attribute
//! lookup is case-insensitive, dotted paths descend one level, and
//! multi-valued attributes match when any element matches.
//!
//! Attributes outside the SCIM User/Group/Enterprise vocabulary are ignored per
//! RFC 7644 Section 3.4.2.2: a comparison on an unrecognised attribute evaluates
//! to `true`.

use std::{cmp::Ordering, collections::HashSet, sync::LazyLock};

use serde_json::{Map, Value};

use super::{
    error::ScimResult,
    filter::{FilterNode, FilterValue, Operator, format_float, parse_filter},
};

/// Working representation of a resource (or sub-item) for evaluation and projection.
pub type ResourceView = Map<String, Value>;

/// Lowercased attribute and sub-attribute names understood by this server.
static KNOWN_ATTRIBUTES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        // Common
        "id",
        "externalid",
        "schemas",
        "meta",
        "resourcetype",
        "created",
        "lastmodified",
        "location",
        "version",
        // User
        "username",
        "name",
        "displayname",
        "nickname",
        "profileurl",
        "title",
        "usertype",
        "preferredlanguage",
        "locale",
        "timezone",
        "active",
        "password",
        "emails",
        "phonenumbers",
        "ims",
        "photos",
        "addresses",
        "groups",
        "entitlements",
        "roles",
        "x509certificates",
        // Name
        "formatted",
        "familyname",
        "givenname",
        "middlename",
        "honorificprefix",
        "honorificsuffix",
        // Multi-valued item sub-attributes
        "value",
        "display",
        "type",
        "primary",
        "$ref",
        // Address
        "streetaddress",
        "locality",
        "region",
        "postalcode",
        "country",
        // Enterprise extension
        "employeenumber",
        "costcenter",
        "organization",
        "division",
        "department",
        "manager",
        // Group
        "members",
    ]
    .into_iter()
    .collect()
});

/// Whether every segment of `attribute` names a known SCIM attribute.
///
/// Schema URN prefixes are stripped before checking.
pub fn is_known_attribute(attribute: &str) -> bool {
    let (_, local) = split_schema_prefix(attribute);
    if local.is_empty() {
        return false;
    }
    local
        .split('.')
        .all(|segment| KNOWN_ATTRIBUTES.contains(segment.to_lowercase().as_str()))
}

/// Split `urn:...:Schema:attr.sub` into (`Some(urn)`, `attr.sub`).
fn split_schema_prefix(attribute: &str) -> (Option<&str>, &str) {
    if !attribute
        .get(..4)
        .is_some_and(|p| p.eq_ignore_ascii_case("urn:"))
    {
        return (None, attribute);
    }
    // The attribute begins after the last colon; any dot after it separates
    // the sub-attribute. Dots inside the URN (e.g. "2.0") come before it.
    match attribute.rfind(':') {
        Some(pos) => (Some(&attribute[..pos]), &attribute[pos + 1..]),
        None => (None, attribute),
    }
}

/// Case-insensitive key lookup.
pub fn get_ci<'a>(map: &'a ResourceView, key: &str) -> Option<&'a Value> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

/// Collect the non-null values addressed by `attribute` within `item`.
fn resolve<'a>(item: &'a ResourceView, attribute: &str) -> Vec<&'a Value> {
    let (schema, local) = split_schema_prefix(attribute);

    let scope = match schema {
        Some(urn) => match get_ci(item, urn) {
            Some(Value::Object(ext)) => ext,
            _ => return Vec::new(),
        },
        None => item,
    };

    let mut segments = local.splitn(2, '.');
    let Some(head) = segments.next() else {
        return Vec::new();
    };
    let sub = segments.next();

    let Some(value) = get_ci(scope, head) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    collect(value, sub, &mut out);
    out
}

fn collect<'a>(value: &'a Value, sub: Option<&str>, out: &mut Vec<&'a Value>) {
    match (value, sub) {
        (Value::Null, _) => {}
        (Value::Array(items), _) => {
            for item in items {
                match (item, sub) {
                    // Bare multi-valued attribute compares against each item's `value`
                    (Value::Object(obj), None) => {
                        if let Some(v) = get_ci(obj, "value") {
                            collect(v, None, out);
                        }
                    }
                    _ => collect(item, sub, out),
                }
            }
        }
        (Value::Object(obj), Some(sub)) => {
            if let Some(v) = get_ci(obj, sub) {
                collect(v, None, out);
            }
        }
        (_, Some(_)) => {}
        (v, None) => out.push(v),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_lowercase(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) => format_float(f),
            _ => n.to_string(),
        },
        other => other.to_string().to_lowercase(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn compare_one(actual: &Value, operator: Operator, expected: &FilterValue) -> bool {
    if operator.is_ordering() {
        let ordering = match (as_number(actual), expected.as_f64()) {
            (Some(a), Some(e)) => a.partial_cmp(&e),
            _ => Some(render(actual).cmp(&expected.to_comparable())),
        };
        return match (operator, ordering) {
            (_, None) => false,
            (Operator::Gt, Some(o)) => o == Ordering::Greater,
            (Operator::Ge, Some(o)) => o != Ordering::Less,
            (Operator::Lt, Some(o)) => o == Ordering::Less,
            (Operator::Le, Some(o)) => o != Ordering::Greater,
            _ => false,
        };
    }

    let actual = render(actual);
    let expected = expected.to_comparable();
    match operator {
        Operator::Eq => actual == expected,
        Operator::Ne => actual != expected,
        Operator::Co => actual.contains(&expected),
        Operator::Sw => actual.starts_with(&expected),
        Operator::Ew => actual.ends_with(&expected),
        _ => false,
    }
}

fn evaluate_comparison(
    item: &ResourceView,
    attribute: &str,
    operator: Operator,
    value: Option<&FilterValue>,
) -> bool {
    if !is_known_attribute(attribute) {
        return true;
    }

    let candidates = resolve(item, attribute);
    if candidates.is_empty() {
        return false;
    }

    match (operator, value) {
        (Operator::Pr, _) => true,
        (_, None) => false,
        // Multi-valued: "ne" holds only when no element equals the value
        (Operator::Ne, Some(expected)) => candidates
            .iter()
            .all(|actual| compare_one(actual, Operator::Ne, expected)),
        (op, Some(expected)) => candidates
            .iter()
            .any(|actual| compare_one(actual, op, expected)),
    }
}

/// Evaluate a parsed filter against one resource or sub-item.
pub fn evaluate(item: &ResourceView, node: &FilterNode) -> bool {
    match node {
        FilterNode::Comparison {
            attribute,
            operator,
            value,
        } => evaluate_comparison(item, attribute, *operator, value.as_ref()),
        FilterNode::And(left, right) => evaluate(item, left) && evaluate(item, right),
        FilterNode::Or(left, right) => evaluate(item, left) || evaluate(item, right),
        FilterNode::Not(inner) => !evaluate(item, inner),
    }
}

/// Indices of the items matching `node`, in their original order.
pub fn matching_indices(items: &[ResourceView], node: &FilterNode) -> Vec<usize> {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| evaluate(item, node))
        .map(|(i, _)| i)
        .collect()
}

/// Parse `filter` once and return clones of the matching items, order preserved.
pub fn find_matching_items(items: &[ResourceView], filter: &str) -> ScimResult<Vec<ResourceView>> {
    let node = parse_filter(filter)?;
    Ok(items
        .iter()
        .filter(|item| evaluate(item, &node))
        .cloned()
        .collect())
}
