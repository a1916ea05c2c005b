//! SCIM attribute path parsing (RFC 7644 Section 3.5.2)
//!
//! Three path forms are recognised, tried in this order:
//!
//! | Form | Example |
//! |------|---------|
//! | schema-qualified | `urn:ietf:params:scim:schemas:extension:enterprise:2.0:User:manager` |
//! | filtered | `emails[type eq "work"].value` |
//! | simple | `name.givenName` |
//!
//! The first form whose pattern consumes the whole string wins. Schema-qualified
//! paths never carry a value filter.

use std::sync::LazyLock;

use regex::Regex;

use super::error::{ScimError, ScimResult};

static SCHEMA_QUALIFIED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(urn:[^:]+(?::[^:]+)*):([^.\[]+)(?:\.([^.\[]+))?$").expect("valid regex")
});

static FILTERED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^.\[]+)\[([^\]]+)\](?:\.([^.\[]+))?$").expect("valid regex")
});

static SIMPLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^.\[]+)(?:\.([^.\[]+))?$").expect("valid regex"));

/// A parsed SCIM attribute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPath {
    /// Top-level attribute name (e.g. `emails`, `name`, `manager`)
    pub attribute: String,
    /// Optional sub-attribute after the dot (e.g. `value`, `givenName`)
    pub sub_attribute: Option<String>,
    /// Raw value-filter text between the brackets, if any
    pub filter_expression: Option<String>,
    /// Schema URN prefix for fully qualified paths
    pub schema_uri: Option<String>,
}

/// Parse a SCIM attribute path.
///
/// Returns `InvalidPath` for empty input or when no grammar rule matches.
pub fn parse_path(path: &str) -> ScimResult<ParsedPath> {
    if path.is_empty() {
        return Err(ScimError::invalid_path(path, "path cannot be empty"));
    }

    if let Some(caps) = SCHEMA_QUALIFIED.captures(path) {
        return Ok(ParsedPath {
            attribute: caps[2].to_string(),
            sub_attribute: caps.get(3).map(|m| m.as_str().to_string()),
            filter_expression: None,
            schema_uri: Some(caps[1].to_string()),
        });
    }

    if let Some(caps) = FILTERED.captures(path) {
        return Ok(ParsedPath {
            attribute: caps[1].to_string(),
            sub_attribute: caps.get(3).map(|m| m.as_str().to_string()),
            filter_expression: Some(caps[2].to_string()),
            schema_uri: None,
        });
    }

    if let Some(caps) = SIMPLE.captures(path) {
        return Ok(ParsedPath {
            attribute: caps[1].to_string(),
            sub_attribute: caps.get(2).map(|m| m.as_str().to_string()),
            filter_expression: None,
            schema_uri: None,
        });
    }

    Err(ScimError::invalid_path(
        path,
        "does not match any SCIM path form",
    ))
}
