use std::sync::Arc;

use {
    axum::{
        extract::{Request, State},
        http::header::AUTHORIZATION,
        middleware::Next,
        response::Response,
    },
    secrecy::{ExposeSecret, Secret},
    subtle::ConstantTimeEq,
    tracing::debug,
};

use crate::error::ServiceError;

// ── Types ────────────────────────────────────────────────────────────────────

/// Bearer-token check for the `/v1` routes.
///
/// With no token configured every request passes; agents still send their
/// identity token, it just isn't checked.
#[derive(Debug, Clone, Default)]
pub struct BearerAuth {
    token: Option<Secret<String>>,
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

fn safe_equal(a: &str, b: &str) -> bool {
    a.len() == b.len() && bool::from(a.as_bytes().ct_eq(b.as_bytes()))
}

/// Extract the credential from an `Authorization: Bearer <token>` value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

// ── Auth logic ───────────────────────────────────────────────────────────────

impl BearerAuth {
    pub fn new(token: Option<Secret<String>>) -> Self {
        Self { token }
    }

    /// Disabled auth: every request is accepted.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn is_enforced(&self) -> bool {
        self.token.is_some()
    }

    /// Check the raw `Authorization` header value, if any.
    pub fn authorize(&self, authorization: Option<&str>) -> AuthResult {
        let Some(expected) = self.token.as_ref() else {
            return AuthResult::allow();
        };
        let Some(header) = authorization else {
            return AuthResult::deny("token_missing");
        };
        let Some(given) = bearer_token(header) else {
            return AuthResult::deny("token_malformed");
        };
        if !safe_equal(given, expected.expose_secret()) {
            return AuthResult::deny("token_mismatch");
        }
        AuthResult::allow()
    }
}

/// Router middleware rejecting requests that fail [`BearerAuth::authorize`].
pub async fn require_bearer(
    State(auth): State<Arc<BearerAuth>>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let result = auth.authorize(header);
    if !result.ok {
        let reason = result.reason.unwrap_or("unauthorized");
        debug!(path = %request.uri().path(), reason, "rejected request");
        return Err(ServiceError::Unauthorized(reason));
    }
    Ok(next.run(request).await)
}
