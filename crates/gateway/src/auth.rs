use std::sync::Arc;

use {
    axum::{
        extract::{Request, State},
        http::HeaderMap,
        middleware::Next,
        response::Response,
    },
    secrecy::{ExposeSecret, SecretString},
    tracing::warn,
};

use crate::{error::ApiError, state::GatewayState};

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

// ── Types ────────────────────────────────────────────────────────────────────

/// Resolved gateway auth configuration. No token disables the check.
#[derive(Debug, Clone, Default)]
pub struct ResolvedAuth {
    pub token: Option<SecretString>,
}

/// Result of an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub ok: bool,
    pub reason: Option<&'static str>,
}

impl AuthResult {
    fn allow() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    fn deny(reason: &'static str) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Constant-time string comparison.
fn safe_equal(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let diff = a
        .as_bytes()
        .iter()
        .zip(b.as_bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y));
    diff == 0
}

// ── Auth logic ───────────────────────────────────────────────────────────────

pub fn resolve_auth(token: Option<SecretString>) -> ResolvedAuth {
    ResolvedAuth {
        token: token.filter(|t| !t.expose_secret().is_empty()),
    }
}

/// Check a provided API key against the configured token.
pub fn authorize(auth: &ResolvedAuth, provided: Option<&str>) -> AuthResult {
    let Some(expected) = auth.token.as_ref() else {
        return AuthResult::allow();
    };
    let Some(given) = provided else {
        return AuthResult::deny("api_key_missing");
    };
    if !safe_equal(given, expected.expose_secret()) {
        return AuthResult::deny("api_key_mismatch");
    }
    AuthResult::allow()
}

fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok())
}

/// Router middleware rejecting requests without a valid `x-api-key`.
pub async fn require_api_key(
    State(state): State<Arc<GatewayState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let result = authorize(&state.auth, api_key(request.headers()));
    if !result.ok {
        warn!(
            path = %request.uri().path(),
            reason = result.reason.unwrap_or("denied"),
            "rejected unauthenticated request"
        );
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_token(token: &str) -> ResolvedAuth {
        resolve_auth(Some(SecretString::new(token.into())))
    }

    #[test]
    fn no_token_allows_everything() {
        assert!(authorize(&ResolvedAuth::default(), None).ok);
        assert!(authorize(&resolve_auth(Some(SecretString::new(String::new()))), None).ok);
    }

    #[test]
    fn token_must_match() {
        let auth = with_token("s3cret");
        assert!(authorize(&auth, Some("s3cret")).ok);
        assert_eq!(
            authorize(&auth, Some("s3creT")).reason,
            Some("api_key_mismatch")
        );
        assert_eq!(authorize(&auth, Some("s3")).reason, Some("api_key_mismatch"));
        assert_eq!(authorize(&auth, None).reason, Some("api_key_missing"));
    }

    #[test]
    fn safe_equal_compares_whole_strings() {
        assert!(safe_equal("abc", "abc"));
        assert!(!safe_equal("abc", "abd"));
        assert!(!safe_equal("abc", "abcd"));
        assert!(safe_equal("", ""));
    }
}
