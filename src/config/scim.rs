use serde::{Deserialize, Serialize};

use crate::scim::filter::MAX_FILTER_LENGTH;

/// SCIM protocol limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScimConfig {
    /// Page size used when a list request carries no `count`.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Upper bound for `count`. Also advertised as `filter.maxResults`.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Longest accepted `filter` query parameter, in bytes.
    #[serde(default = "default_max_filter_length")]
    pub max_filter_length: usize,
}

impl Default for ScimConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            max_filter_length: default_max_filter_length(),
        }
    }
}

impl ScimConfig {
    pub(super) fn validate(&self) -> Result<(), String> {
        if self.max_page_size == 0 {
            return Err("scim.max_page_size must be greater than 0".to_string());
        }
        if self.default_page_size > self.max_page_size {
            return Err(format!(
                "scim.default_page_size ({}) exceeds scim.max_page_size ({})",
                self.default_page_size, self.max_page_size
            ));
        }
        if self.max_filter_length == 0 {
            return Err("scim.max_filter_length must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Effective page size for a requested `count`.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size)
    }
}

fn default_page_size() -> usize {
    100
}

fn default_max_page_size() -> usize {
    1000
}

fn default_max_filter_length() -> usize {
    MAX_FILTER_LENGTH
}
