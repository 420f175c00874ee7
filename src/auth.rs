//! API token authentication for the management API

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use subtle::ConstantTimeEq;

use crate::error::ApiError;
use crate::state::AppState;

/// Server-held API token
#[derive(Clone)]
pub struct TokenAuth {
    token: Arc<str>,
}

impl TokenAuth {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self { token: token.into() }
    }

    /// Constant-time comparison against the configured token
    pub fn validate(&self, provided: &str) -> bool {
        self.token.as_bytes().ct_eq(provided.as_bytes()).into()
    }

    pub fn authorize(&self, headers: &HeaderMap) -> bool {
        bearer_token(headers).is_some_and(|token| self.validate(token))
    }
}

/// Token from an `Authorization: Bearer <token>` or `Token <token>` header.
///
/// Also accepts the `Token token="<token>"` form.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, credentials) = value.split_once(char::is_whitespace)?;

    if !scheme.eq_ignore_ascii_case("bearer") && !scheme.eq_ignore_ascii_case("token") {
        return None;
    }

    let credentials = credentials.trim();
    let token = match credentials.strip_prefix("token=") {
        Some(quoted) => {
            let quoted = quoted.split(',').next().unwrap_or_default().trim();
            quoted.trim_matches('"')
        }
        None => credentials,
    };

    (!token.is_empty()).then_some(token)
}

/// Extractor that rejects the request unless it carries the API token
pub struct Authenticated;

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if state.auth.authorize(&parts.headers) {
            Ok(Authenticated)
        } else {
            tracing::warn!("Rejected unauthenticated {} {}", parts.method, parts.uri.path());
            Err(ApiError::Unauthorized)
        }
    }
}
