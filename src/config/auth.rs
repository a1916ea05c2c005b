use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Bearer-token authentication for the SCIM endpoints.
///
/// Every token is bound to an application (`app_id`), which scopes all
/// resources the token can see. Discovery endpoints never require a token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Require a bearer token on resource endpoints.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Application used for every request while authentication is disabled.
    #[serde(default = "default_app_id")]
    pub default_app_id: String,

    /// Accepted tokens.
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_app_id: default_app_id(),
            tokens: Vec::new(),
        }
    }
}

impl AuthConfig {
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.default_app_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "auth.default_app_id cannot be empty".to_string(),
            ));
        }

        if self.enabled && self.tokens.is_empty() {
            return Err(ConfigError::Validation(
                "auth is enabled but no [[auth.tokens]] are configured \
                 (set auth.enabled = false for local development)"
                    .to_string(),
            ));
        }

        for (i, token) in self.tokens.iter_mut().enumerate() {
            token.validate().map_err(|e| {
                ConfigError::Validation(format!("auth.tokens[{}] ({}): {}", i, token.name, e))
            })?;
        }

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tokens
// ─────────────────────────────────────────────────────────────────────────────

/// A single accepted bearer token. Only its SHA-256 digest is configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    /// Human-readable label, used in logs.
    pub name: String,

    /// Hex-encoded SHA-256 digest of the raw token
    /// (see `scimgate hash-token`).
    pub token_hash: String,

    /// Application the token is scoped to.
    pub app_id: String,

    /// Expiry time (RFC 3339). Expired tokens are rejected.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    /// Inactive tokens are rejected.
    #[serde(default = "default_true")]
    pub active: bool,
}

impl TokenConfig {
    fn validate(&mut self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name cannot be empty".to_string());
        }
        if self.app_id.trim().is_empty() {
            return Err("app_id cannot be empty".to_string());
        }

        // Digests are compared against lowercase hex
        self.token_hash = self.token_hash.trim().to_ascii_lowercase();
        if self.token_hash.len() != 64 || !self.token_hash.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err("token_hash must be a 64-character hex SHA-256 digest".to_string());
        }
        Ok(())
    }

    /// Whether the token may be used at `now`.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at.is_none_or(|expires| expires > now)
    }
}

fn default_true() -> bool {
    true
}

fn default_app_id() -> String {
    "default".to_string()
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    const HASH: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    fn token() -> TokenConfig {
        TokenConfig {
            name: "okta".to_string(),
            token_hash: HASH.to_string(),
            app_id: "app-1".to_string(),
            expires_at: None,
            active: true,
        }
    }

    #[test]
    fn test_enabled_without_tokens_rejected() {
        let mut config = AuthConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("no [[auth.tokens]]"));
    }

    #[test]
    fn test_disabled_without_tokens_ok() {
        let mut config = AuthConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.default_app_id, "default");
    }

    #[test]
    fn test_token_hash_normalized() {
        let mut config = AuthConfig {
            tokens: vec![TokenConfig {
                token_hash: format!("  {}  ", HASH.to_uppercase()),
                ..token()
            }],
            ..Default::default()
        };
        config.validate().unwrap();
        assert_eq!(config.tokens[0].token_hash, HASH);
    }

    #[test]
    fn test_malformed_token_hash_rejected() {
        for bad in ["abc", &"z".repeat(64)] {
            let mut config = AuthConfig {
                tokens: vec![TokenConfig {
                    token_hash: bad.to_string(),
                    ..token()
                }],
                ..Default::default()
            };
            let err = config.validate().unwrap_err().to_string();
            assert!(err.contains("auth.tokens[0] (okta)"), "{}", err);
        }
    }

    #[test]
    fn test_token_usable() {
        let now = Utc::now();
        assert!(token().is_usable(now));

        let inactive = TokenConfig {
            active: false,
            ..token()
        };
        assert!(!inactive.is_usable(now));

        let expired = TokenConfig {
            expires_at: Some(now - Duration::minutes(1)),
            ..token()
        };
        assert!(!expired.is_usable(now));

        let future = TokenConfig {
            expires_at: Some(now + Duration::days(1)),
            ..token()
        };
        assert!(future.is_usable(now));
    }

    #[test]
    fn test_token_from_toml() {
        let config: AuthConfig = toml::from_str(&format!(
            r#"
            [[tokens]]
            name = "azure"
            token_hash = "{HASH}"
            app_id = "tenant-a"
            expires_at = "2030-01-01T00:00:00Z"
        "#
        ))
        .unwrap();
        assert!(config.enabled);
        assert_eq!(config.tokens.len(), 1);
        assert!(config.tokens[0].active);
        assert!(config.tokens[0].expires_at.is_some());
    }
}
