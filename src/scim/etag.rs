//! Resource versioning (RFC 7644 Section 3.14)
//!
//! Versions are weak ETags derived from resource content, so two identical
//! representations always carry the same tag.

use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{
    error::{ScimError, ScimResult},
    evaluator::ResourceView,
};

/// Compute the weak ETag for a resource.
///
/// `meta` (which carries the version itself) and the read-only `groups`
/// back-reference are excluded. Object keys serialize in sorted order.
pub fn generate_etag(resource: &ResourceView) -> String {
    let mut canonical = resource.clone();
    canonical.remove("meta");
    canonical.remove("groups");

    let bytes = serde_json::to_vec(&Value::Object(canonical)).unwrap_or_default();
    let digest = Sha256::digest(&bytes);
    format!("W/\"{}\"", hex::encode(&digest[..16]))
}

/// Strip the weak prefix and surrounding quotes from an entity tag.
fn opaque_tag(tag: &str) -> &str {
    let tag = tag.trim();
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    tag.trim_matches('"')
}

/// Check an `If-Match` header value against the current version.
///
/// An absent or blank header skips the check and `*` matches anything. The
/// header may list several tags separated by commas.
pub fn check_if_match(if_match: Option<&str>, current: &str) -> ScimResult<()> {
    let Some(header) = if_match.map(str::trim).filter(|h| !h.is_empty()) else {
        return Ok(());
    };

    let current = opaque_tag(current);
    let matched = header
        .split(',')
        .map(opaque_tag)
        .any(|tag| tag == "*" || tag == current);

    if matched {
        Ok(())
    } else {
        Err(ScimError::PreconditionFailed(format!(
            "If-Match {} does not match current version",
            header
        )))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn view(value: Value) -> ResourceView {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_etag_is_weak_and_stable() {
        let a = view(json!({"id": "1", "userName": "alice", "active": true}));
        let b = view(json!({"active": true, "userName": "alice", "id": "1"}));

        let tag = generate_etag(&a);
        assert!(tag.starts_with("W/\""));
        assert!(tag.ends_with('"'));
        assert_eq!(tag, generate_etag(&b));
    }

    #[test]
    fn test_etag_ignores_meta_and_changes_with_content() {
        let base = view(json!({"id": "1", "userName": "alice"}));
        let with_meta = view(json!({
            "id": "1",
            "userName": "alice",
            "meta": {"version": "W/\"old\"", "lastModified": "2024-01-01T00:00:00Z"}
        }));
        let changed = view(json!({"id": "1", "userName": "alicia"}));

        assert_eq!(generate_etag(&base), generate_etag(&with_meta));
        assert_ne!(generate_etag(&base), generate_etag(&changed));
    }

    #[test]
    fn test_if_match_absent_or_blank_skips() {
        assert!(check_if_match(None, "W/\"abc\"").is_ok());
        assert!(check_if_match(Some("  "), "W/\"abc\"").is_ok());
    }

    #[test]
    fn test_if_match_forms() {
        let current = "W/\"abc\"";
        assert!(check_if_match(Some("*"), current).is_ok());
        assert!(check_if_match(Some("W/\"abc\""), current).is_ok());
        assert!(check_if_match(Some("\"abc\""), current).is_ok());
        assert!(check_if_match(Some("abc"), current).is_ok());
        assert!(check_if_match(Some("\"zzz\", W/\"abc\""), current).is_ok());
    }

    #[test]
    fn test_if_match_mismatch_is_precondition_failed() {
        let err = check_if_match(Some("W/\"stale\""), "W/\"abc\"").unwrap_err();
        assert!(matches!(err, ScimError::PreconditionFailed(_)));
    }
}
