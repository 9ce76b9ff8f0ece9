//! Error taxonomy for the account service.
//!
//! Every validation failure is detected before any mutation and returned with
//! a stable machine-usable kind plus a display message. Unexpected faults are
//! logged server-side and surfaced as a generic 500 without leaking internals.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing payload")]
    MissingPayload,

    #[error("Invalid email format")]
    InvalidFormat,

    #[error("Email already registered")]
    AlreadyRegistered,

    #[error("Account not found")]
    NotFound,

    #[error("Account is not verified")]
    NotVerified,

    #[error("Invalid OTP code")]
    InvalidCode,

    #[error("OTP code has expired")]
    Expired,

    #[error("{0} already taken")]
    DuplicateField(&'static str),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Failed to deliver OTP message")]
    DeliveryFailed,

    #[error("Missing or invalid authorization")]
    Unauthorized,

    #[error("Internal server error")]
    Server(#[from] anyhow::Error),
}

/// JSON body returned on every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    /// Stable machine-usable error kind.
    pub error: &'static str,
    /// Message suitable for direct display.
    pub message: String,
}

impl AuthError {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingPayload | Self::InvalidFormat => "invalid_format",
            Self::AlreadyRegistered => "already_registered",
            Self::NotFound => "not_found",
            Self::NotVerified => "not_verified",
            Self::InvalidCode => "invalid_code",
            Self::Expired => "expired",
            Self::DuplicateField(_) => "duplicate_field",
            Self::PasswordMismatch => "password_mismatch",
            Self::InvalidCredentials => "invalid_credentials",
            Self::DeliveryFailed => "delivery_failed",
            Self::Unauthorized => "unauthorized",
            Self::Server(_) => "server_error",
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingPayload
            | Self::InvalidFormat
            | Self::AlreadyRegistered
            | Self::NotVerified
            | Self::InvalidCode
            | Self::Expired
            | Self::DuplicateField(_)
            | Self::PasswordMismatch
            | Self::InvalidCredentials => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::DeliveryFailed | Self::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        Self::Server(anyhow::Error::new(err))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::Server(err) = &self {
            error!("internal error: {err:?}");
        }

        let body = Json(ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        });

        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(AuthError::InvalidFormat.kind(), "invalid_format");
        assert_eq!(AuthError::AlreadyRegistered.kind(), "already_registered");
        assert_eq!(AuthError::InvalidCode.kind(), "invalid_code");
        assert_eq!(AuthError::Expired.kind(), "expired");
        assert_eq!(
            AuthError::DuplicateField("username").kind(),
            "duplicate_field"
        );
        assert_eq!(AuthError::Server(anyhow!("boom")).kind(), "server_error");
    }

    #[test]
    fn validation_failures_are_bad_request() {
        assert_eq!(AuthError::InvalidFormat.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AuthError::AlreadyRegistered.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AuthError::InvalidCode.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::Expired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AuthError::PasswordMismatch.status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn unknown_account_and_wrong_password_share_one_kind() {
        // Both login failure modes must be indistinguishable to the caller.
        let unknown = AuthError::InvalidCredentials;
        let wrong = AuthError::InvalidCredentials;
        assert_eq!(unknown.kind(), wrong.kind());
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[test]
    fn not_found_maps_to_404() {
        assert_eq!(AuthError::NotFound.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let err = AuthError::Server(anyhow!("password column dropped"));
        assert_eq!(err.to_string(), "Internal server error");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn into_response_carries_status() {
        let response = AuthError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AuthError::DeliveryFailed.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
