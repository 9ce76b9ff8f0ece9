//! OpenAPI document for the account service.

use crate::api::{
    error::ErrorBody,
    handlers::{account, auth, health},
};
use axum::Json;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ricetta",
        description = "Recipe Finder account verification and credential lifecycle"
    ),
    paths(
        health::health,
        auth::register::send_otp,
        auth::register::verify_otp,
        auth::login::login,
        auth::reset::send_otp,
        auth::reset::verify_otp,
        account::get_account,
        account::update_account,
    ),
    components(schemas(
        ErrorBody,
        auth::model::Role,
        auth::types::SendOtpRequest,
        auth::types::VerifyOtpRequest,
        auth::types::LoginRequest,
        auth::types::LoginResponse,
        auth::types::ResetSendRequest,
        auth::types::ResetVerifyRequest,
        auth::types::MessageResponse,
        auth::types::RegisteredResponse,
        auth::types::UpdateAccountForm,
        auth::types::UserResponse,
    )),
    tags(
        (name = "auth", description = "Registration, login and password reset"),
        (name = "account", description = "Profile lookup and updates"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

/// Serve the generated document as JSON.
pub async fn serve() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_the_auth_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/auth/send-otp"));
        assert!(paths.contains_key("/auth/verify-otp"));
        assert!(paths.contains_key("/auth/login"));
        assert!(paths.contains_key("/auth/reset/send-otp"));
        assert!(paths.contains_key("/auth/reset/verify-otp"));
        assert!(paths.contains_key("/auth/{account_id}"));
        assert!(paths.contains_key("/health"));
    }
}
