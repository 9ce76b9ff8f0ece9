//! Request and response payloads for the auth endpoints.

use crate::api::handlers::auth::model::{Role, VerifiedAccount};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Payload for `POST /auth/send-otp`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SendOtpRequest {
    /// Address to register and deliver the code to.
    #[schema(example = "chef@example.com")]
    pub email: String,
}

/// Payload for `POST /auth/verify-otp`, completing registration.
#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    #[schema(example = "chef@example.com")]
    pub email: String,
    /// Six-digit code from the registration email.
    #[schema(example = "123456")]
    pub otp: String,
    #[schema(example = "chefA")]
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
    /// Optional secondary contact in E.164 form.
    #[serde(default)]
    pub mobile_number: Option<String>,
}

/// Payload for `POST /auth/login`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "chef@example.com")]
    pub email: String,
    pub password: String,
}

/// Payload for `POST /auth/reset/send-otp`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetSendRequest {
    #[schema(example = "chef@example.com")]
    pub email: String,
}

/// Payload for `POST /auth/reset/verify-otp`, setting the new password.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetVerifyRequest {
    #[schema(example = "chef@example.com")]
    pub email: String,
    /// Six-digit code from the reset email.
    #[schema(example = "123456")]
    pub otp: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Generic confirmation body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Public projection of a verified account.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub mobile_number: Option<String>,
    pub role: Role,
    /// Relative URL of the avatar, empty when none was uploaded.
    pub avatar: String,
}

impl From<VerifiedAccount> for UserResponse {
    fn from(account: VerifiedAccount) -> Self {
        Self {
            id: account.id,
            username: account.username,
            email: account.email,
            mobile_number: account.mobile_number,
            role: account.role,
            avatar: account.avatar_path,
        }
    }
}

/// Multipart form fields accepted by the profile update endpoint. Fields left
/// out keep their current value.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateAccountForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub mobile_number: Option<String>,
    pub role: Option<Role>,
    /// Avatar image file.
    #[schema(value_type = Option<String>, format = Binary)]
    pub avatar: Option<String>,
}

/// Successful registration body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisteredResponse {
    pub message: String,
    pub user: UserResponse,
}

/// Successful login body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// Signed session token, valid for 24 hours.
    pub token: String,
    pub user: UserResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn verify_otp_request_defaults() {
        let request: VerifyOtpRequest = serde_json::from_str(
            r#"{"email":"a@b.co","otp":"123456","username":"a","password":"pw"}"#,
        )
        .expect("minimal payload");
        assert_eq!(request.role, Role::Ordinary);
        assert!(request.mobile_number.is_none());
    }

    #[test]
    fn verify_otp_request_full_payload() {
        let request: VerifyOtpRequest = serde_json::from_str(
            r#"{"email":"a@b.co","otp":"123456","username":"a","password":"pw","role":"chef","mobile_number":"+15551234567"}"#,
        )
        .expect("full payload");
        assert_eq!(request.role, Role::Chef);
        assert_eq!(request.mobile_number.as_deref(), Some("+15551234567"));
    }

    #[test]
    fn user_response_from_account() {
        let account = VerifiedAccount {
            id: Uuid::new_v4(),
            email: "chef@example.com".to_string(),
            username: "chefA".to_string(),
            mobile_number: Some("+15551234567".to_string()),
            role: Role::Chef,
            avatar_path: "/uploads/1-a.png".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let id = account.id;
        let user = UserResponse::from(account);
        assert_eq!(user.id, id);
        assert_eq!(user.avatar, "/uploads/1-a.png");

        let json = serde_json::to_value(&user).expect("serialize");
        assert_eq!(json["role"], "chef");
    }
}
