//! SCIM Bearer Token Authentication Middleware
//!
//! Tokens are configured as SHA-256 digests in `[[auth.tokens]]`; each one is
//! scoped to an application whose resources it can see.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::{
    AppState,
    models::{digests_match, hash_token},
    scim::ScimErrorResponse,
};

/// Authenticated SCIM context injected into request extensions.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// The application every resource of this request belongs to
    pub app_id: String,
    /// Name of the token used, `None` when authentication is disabled
    pub token_name: Option<String>,
}

/// SCIM bearer token authentication middleware.
///
/// Extracts the bearer token from the Authorization header, matches its
/// digest against the configured tokens, and injects `AuthContext` into
/// request extensions. With `[auth] enabled = false` every request runs as
/// `default_app_id`.
pub async fn scim_auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let auth = &state.config.auth;

    if !auth.enabled {
        request.extensions_mut().insert(AuthContext {
            app_id: auth.default_app_id.clone(),
            token_name: None,
        });
        return next.run(request).await;
    }

    let token = match extract_bearer_token(&request) {
        Ok(token) => token,
        Err(message) => return unauthorized(message),
    };

    let digest = hash_token(token);
    let Some(config) = auth
        .tokens
        .iter()
        .find(|t| digests_match(&digest, &t.token_hash))
    else {
        tracing::debug!("SCIM authentication failed: unknown token");
        return unauthorized("Invalid bearer token");
    };

    if !config.is_usable(Utc::now()) {
        tracing::debug!(token = %config.name, "SCIM authentication failed: token expired or inactive");
        return unauthorized("Token is expired or inactive");
    }

    request.extensions_mut().insert(AuthContext {
        app_id: config.app_id.clone(),
        token_name: Some(config.name.clone()),
    });

    next.run(request).await
}

/// A 401 with the RFC 6750 challenge header.
fn unauthorized(message: &str) -> Response {
    let mut response = ScimErrorResponse::unauthorized(message).into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Bearer realm=\"SCIM API\""),
    );
    response
}

/// Extract bearer token from the Authorization header.
///
/// The scheme is matched case-insensitively; an empty token is rejected.
fn extract_bearer_token(request: &Request<Body>) -> Result<&str, &'static str> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or("Missing Authorization header")?;
    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header")?;

    let (scheme, token) = auth_str
        .split_once(' ')
        .ok_or("Expected: Authorization: Bearer <token>")?;
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err("Expected: Authorization: Bearer <token>");
    }

    let token = token.trim();
    if token.is_empty() {
        return Err("Missing bearer token");
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{Extension, Router, http::StatusCode, routing::get};
    use chrono::Duration;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{GatewayConfig, TokenConfig};

    fn request_with(auth: &str) -> Request<Body> {
        Request::builder()
            .header(header::AUTHORIZATION, auth)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_extract_bearer_token_valid() {
        assert_eq!(
            extract_bearer_token(&request_with("Bearer scim_abc123")),
            Ok("scim_abc123")
        );
    }

    #[test]
    fn test_extract_bearer_token_case_insensitive() {
        assert_eq!(
            extract_bearer_token(&request_with("bearer scim_abc123")),
            Ok("scim_abc123")
        );
        assert_eq!(
            extract_bearer_token(&request_with("BEARER scim_abc123")),
            Ok("scim_abc123")
        );
    }

    #[test]
    fn test_extract_bearer_token_missing_header() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(
            extract_bearer_token(&request),
            Err("Missing Authorization header")
        );
    }

    #[test]
    fn test_extract_bearer_token_wrong_scheme() {
        assert!(extract_bearer_token(&request_with("Basic dXNlcjpwYXNz")).is_err());
    }

    #[test]
    fn test_extract_bearer_token_empty_token() {
        assert_eq!(
            extract_bearer_token(&request_with("Bearer ")),
            Err("Missing bearer token")
        );
    }

    fn token(name: &str, raw: &str, app_id: &str) -> TokenConfig {
        TokenConfig {
            name: name.to_string(),
            token_hash: hash_token(raw),
            app_id: app_id.to_string(),
            expires_at: None,
            active: true,
        }
    }

    fn app(config: GatewayConfig) -> Router {
        let state = AppState::new(Arc::new(config));
        Router::new()
            .route(
                "/whoami",
                get(|Extension(auth): Extension<AuthContext>| async move { auth.app_id }),
            )
            .route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                scim_auth_middleware,
            ))
            .with_state(state)
    }

    fn config_with(tokens: Vec<TokenConfig>) -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.auth.tokens = tokens;
        config
    }

    async fn call(app: Router, auth: Option<&str>) -> (StatusCode, Option<String>, String) {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, challenge, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_valid_token_scopes_app() {
        let app = app(config_with(vec![
            token("okta", "secret-a", "app-a"),
            token("azure", "secret-b", "app-b"),
        ]));
        let (status, _, body) = call(app, Some("Bearer secret-b")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "app-b");
    }

    #[tokio::test]
    async fn test_missing_and_unknown_tokens_rejected() {
        let app = app(config_with(vec![token("okta", "secret-a", "app-a")]));

        for auth in [None, Some("Bearer nope"), Some("Basic abc")] {
            let (status, challenge, body) = call(app.clone(), auth).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(challenge.as_deref(), Some("Bearer realm=\"SCIM API\""));
            let json: Value = serde_json::from_str(&body).unwrap();
            assert_eq!(json["status"], "401");
        }
    }

    #[tokio::test]
    async fn test_expired_and_inactive_tokens_rejected() {
        let mut expired = token("old", "secret-old", "app-a");
        expired.expires_at = Some(Utc::now() - Duration::hours(1));
        let mut inactive = token("off", "secret-off", "app-a");
        inactive.active = false;
        let app = app(config_with(vec![expired, inactive]));

        let (status, _, _) = call(app.clone(), Some("Bearer secret-old")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _, _) = call(app, Some("Bearer secret-off")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_disabled_auth_uses_default_app() {
        let mut config = GatewayConfig::default();
        config.auth.enabled = false;
        config.auth.default_app_id = "local".to_string();

        let (status, _, body) = call(app(config), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "local");
    }
}
