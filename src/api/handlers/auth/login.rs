//! Login: password check and session token issuance.

use crate::api::{
    error::{AuthError, ErrorBody},
    handlers::{
        auth::{
            password::verify_password,
            storage,
            token::issue_session_token,
            types::{LoginRequest, LoginResponse},
        },
        normalize_email,
    },
};
use crate::cli::globals::GlobalArgs;
use axum::{extract::Extension, Json};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument};

/// Authenticate an email and password pair.
///
/// Unknown email and wrong password produce the same error so callers cannot
/// probe which addresses are registered. An account that started registration
/// but never verified is told to finish it first.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 400, description = "Invalid email or password, or unverified account", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    Extension(pool): Extension<PgPool>,
    Extension(globals): Extension<Arc<GlobalArgs>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<LoginResponse>, AuthError> {
    let Some(Json(payload)) = payload else {
        return Err(AuthError::MissingPayload);
    };

    let email = normalize_email(&payload.email);

    let record = storage::fetch_login(&pool, &email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let storage::LoginRecord::Verified {
        account,
        password_hash,
    } = record
    else {
        return Err(AuthError::NotVerified);
    };

    if !verify_password(&payload.password, &password_hash)? {
        return Err(AuthError::InvalidCredentials);
    }

    let token = issue_session_token(
        account.id,
        account.role,
        globals.token_secret.expose_secret().as_bytes(),
    )?;

    info!(account_id = %account.id, "login succeeded");

    Ok(Json(LoginResponse {
        token,
        user: account.into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn login_requires_payload() {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_lazy("postgres://localhost:1/unused")
            .expect("lazy pool");
        let globals = Arc::new(GlobalArgs::new(SecretString::from("secret")));

        let result = login(Extension(pool), Extension(globals), None).await;
        assert!(matches!(result, Err(AuthError::MissingPayload)));
    }
}
