//! Session token issuance and verification.
//!
//! Login returns an HS256-signed JWT with a fixed 24-hour expiry. No session
//! state is held server-side beyond the signing secret; a role change makes
//! the role claim stale and the client is expected to re-login.

use crate::api::{error::AuthError, handlers::auth::model::Role};
use anyhow::anyhow;
use axum::http::HeaderMap;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session lifetime.
pub const TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Claims embedded in every session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: account id (UUID string).
    pub sub: String,
    /// Account role at issuance time.
    pub role: Role,
    /// Issued-at (Unix timestamp).
    pub iat: i64,
    /// Expiration (Unix timestamp).
    pub exp: i64,
}

/// Issue a signed session token for a verified account.
///
/// # Errors
///
/// Returns `AuthError::Server` if encoding fails.
pub fn issue_session_token(
    account_id: Uuid,
    role: Role,
    secret: &[u8],
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let claims = SessionClaims {
        sub: account_id.to_string(),
        role,
        iat: now,
        exp: now + TOKEN_TTL_SECONDS,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|err| AuthError::Server(anyhow!("token encode failed: {err}")))
}

/// Decode and verify a session token (signature and expiry).
///
/// # Errors
///
/// Returns `AuthError::Unauthorized` for any invalid or expired token.
pub fn verify_session_token(token: &str, secret: &[u8]) -> Result<SessionClaims, AuthError> {
    let mut validation = Validation::default();
    validation.set_required_spec_claims(&["exp"]);

    decode::<SessionClaims>(token, &DecodingKey::from_secret(secret), &validation)
        .map(|data| data.claims)
        .map_err(|_| AuthError::Unauthorized)
}

/// Extract a bearer token from the Authorization header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Require a token whose subject matches the account being mutated.
///
/// # Errors
///
/// Returns `AuthError::Unauthorized` when the header is missing, the token is
/// invalid, or the subject does not match.
pub fn require_account(
    headers: &HeaderMap,
    account_id: Uuid,
    secret: &[u8],
) -> Result<SessionClaims, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::Unauthorized)?;
    let claims = verify_session_token(token, secret)?;
    if claims.sub != account_id.to_string() {
        return Err(AuthError::Unauthorized);
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &[u8] = b"test-signing-secret";

    #[test]
    fn token_round_trips() -> Result<(), AuthError> {
        let id = Uuid::new_v4();
        let token = issue_session_token(id, Role::Chef, SECRET)?;
        let claims = verify_session_token(&token, SECRET)?;
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.role, Role::Chef);
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_SECONDS);
        Ok(())
    }

    #[test]
    fn wrong_secret_is_rejected() -> Result<(), AuthError> {
        let token = issue_session_token(Uuid::new_v4(), Role::Ordinary, SECRET)?;
        assert!(verify_session_token(&token, b"other-secret").is_err());
        Ok(())
    }

    #[test]
    fn expired_token_is_rejected() -> Result<(), AuthError> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: Uuid::new_v4().to_string(),
            role: Role::Ordinary,
            iat: now - TOKEN_TTL_SECONDS - 120,
            exp: now - 120,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .map_err(|err| AuthError::Server(anyhow!("encode: {err}")))?;
        assert!(verify_session_token(&token, SECRET).is_err());
        Ok(())
    }

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn require_account_checks_subject() -> Result<(), AuthError> {
        let id = Uuid::new_v4();
        let token = issue_session_token(id, Role::Ordinary, SECRET)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|err| AuthError::Server(anyhow!("header: {err}")))?,
        );

        assert!(require_account(&headers, id, SECRET).is_ok());
        assert!(require_account(&headers, Uuid::new_v4(), SECRET).is_err());
        Ok(())
    }
}
