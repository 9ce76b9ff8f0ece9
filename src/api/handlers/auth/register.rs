//! Registration flow: OTP issuance and verification.

use crate::api::{
    email::{Mailer, OtpPurpose},
    error::{AuthError, ErrorBody},
    handlers::{
        auth::{
            otp::{generate_otp, OTP_TTL_SECONDS},
            password::hash_password,
            storage,
            types::{MessageResponse, RegisteredResponse, SendOtpRequest, VerifyOtpRequest},
        },
        normalize_email, valid_email, valid_mobile,
    },
};
use axum::{extract::Extension, Json};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Issue (or re-issue) a registration OTP.
///
/// An unknown email gets a pending account; a pending account gets a fresh
/// code superseding the old one. The code is persisted before delivery, so a
/// failed send leaves a valid challenge behind and the client simply retries.
#[utoipa::path(
    post,
    path = "/auth/send-otp",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "OTP issued and delivery attempted", body = MessageResponse),
        (status = 400, description = "Malformed email or already registered", body = ErrorBody),
        (status = 500, description = "Delivery failure", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn send_otp(
    Extension(pool): Extension<PgPool>,
    Extension(mailer): Extension<Arc<Mailer>>,
    payload: Option<Json<SendOtpRequest>>,
) -> Result<Json<MessageResponse>, AuthError> {
    let Some(Json(payload)) = payload else {
        return Err(AuthError::MissingPayload);
    };

    let email = normalize_email(&payload.email);
    if !valid_email(&email) {
        return Err(AuthError::InvalidFormat);
    }

    let code = generate_otp();
    let expires_at = Utc::now() + Duration::seconds(OTP_TTL_SECONDS);

    let account_id = storage::upsert_registration_challenge(&pool, &email, &code, expires_at)
        .await?;

    info!(account_id = %account_id, "registration otp issued");

    if let Err(err) = mailer
        .send_otp(&email, OtpPurpose::Registration, &code)
        .await
    {
        warn!(account_id = %account_id, "otp delivery failed: {err:?}");
        return Err(AuthError::DeliveryFailed);
    }

    Ok(Json(MessageResponse::new("OTP sent to your email")))
}

/// Consume a registration OTP and promote the account to verified.
#[utoipa::path(
    post,
    path = "/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Account verified", body = RegisteredResponse),
        (status = 400, description = "Invalid or expired code, or duplicate profile field", body = ErrorBody),
        (status = 404, description = "No account for this email", body = ErrorBody),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn verify_otp(
    Extension(pool): Extension<PgPool>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> Result<Json<RegisteredResponse>, AuthError> {
    let Some(Json(payload)) = payload else {
        return Err(AuthError::MissingPayload);
    };

    let email = normalize_email(&payload.email);
    if !valid_email(&email) {
        return Err(AuthError::InvalidFormat);
    }

    let username = payload.username.trim();
    if username.is_empty() || payload.password.is_empty() || payload.otp.is_empty() {
        return Err(AuthError::InvalidFormat);
    }

    let mobile_number = match payload.mobile_number.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(number) if valid_mobile(number) => Some(number.to_string()),
        Some(_) => return Err(AuthError::InvalidFormat),
    };

    let password_hash = hash_password(&payload.password)?;

    let account = storage::finalize_registration(
        &pool,
        &email,
        payload.otp.trim(),
        username,
        &password_hash,
        payload.role,
        mobile_number.as_deref(),
    )
    .await?;

    info!(account_id = %account.id, role = %account.role, "account verified");

    Ok(Json(RegisteredResponse {
        message: "Account verified successfully".to_string(),
        user: account.into(),
    }))
}
