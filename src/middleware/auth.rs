use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::gateway::services::Authenticator;
use crate::models::user::Identity;
use crate::state::AppState;

/// The caller of a REST route, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
}

impl AuthUser {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.user_id,
            email: self.email.clone(),
        }
    }
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Accepts `Bearer <token>` or a bare token.
pub fn strip_bearer(credential: &str) -> &str {
    let credential = credential.trim();
    credential
        .strip_prefix("Bearer ")
        .map(str::trim)
        .unwrap_or(credential)
}

/// Rejection type for when auth fails.
pub struct AuthRejection;

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": "unauthorized",
                "message": "invalid or missing authentication"
            }
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthRejection;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let backend = state.backend.clone();
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        async move {
            let header = auth_header.ok_or(AuthRejection)?;
            if !header.starts_with("Bearer ") {
                return Err(AuthRejection);
            }
            let identity = backend.verify(&header).await.map_err(|e| {
                tracing::debug!("rest auth failed: {e}");
                AuthRejection
            })?;
            Ok(AuthUser {
                user_id: identity.id,
                email: identity.email,
            })
        }
    }
}

/// Helper to create a token hash for token creation and lookup.
pub fn create_token_hash(token: &str) -> String {
    hash_token(token)
}

/// Generate a random token string.
pub fn generate_token() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let random: u64 = rand::random();
    let random2: u64 = rand::random();
    format!("{ts:x}.{random:x}{random2:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bearer_variants() {
        assert_eq!(strip_bearer("Bearer abc"), "abc");
        assert_eq!(strip_bearer("  Bearer   abc "), "abc");
        assert_eq!(strip_bearer("abc"), "abc");
    }

    #[test]
    fn test_hash_is_stable_hex() {
        let a = create_token_hash("token");
        assert_eq!(a, create_token_hash("token"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, create_token_hash("other"));
    }

    #[test]
    fn test_generated_tokens_differ() {
        assert_ne!(generate_token(), generate_token());
    }
}
