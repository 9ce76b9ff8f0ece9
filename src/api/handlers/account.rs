//! Public profile lookup and authenticated profile updates.

use crate::api::{
    error::{AuthError, ErrorBody},
    handlers::{
        auth::{
            model::{Account, Role},
            storage,
            token::require_account,
            types::{UpdateAccountForm, UserResponse},
        },
        normalize_email, valid_email, valid_mobile,
    },
};
use crate::cli::globals::GlobalArgs;
use anyhow::{anyhow, Context};
use axum::{
    extract::{Extension, Multipart, Path},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Fetch a verified account's public profile. A pending account answers 404,
/// indistinguishable from an unknown id.
#[utoipa::path(
    get,
    path = "/auth/{account_id}",
    params(("account_id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account profile", body = UserResponse),
        (status = 404, description = "Unknown or unverified account", body = ErrorBody),
    ),
    tag = "account"
)]
#[instrument(skip_all, fields(account_id = %account_id))]
pub async fn get_account(
    Extension(pool): Extension<PgPool>,
    Path(account_id): Path<Uuid>,
) -> Result<Json<UserResponse>, AuthError> {
    let account = storage::fetch_account_by_id(&pool, account_id)
        .await?
        .and_then(Account::into_verified)
        .ok_or(AuthError::NotFound)?;

    Ok(Json(account.into()))
}

/// Collected multipart fields for a profile update.
#[derive(Debug, Default)]
struct ProfileUpdate {
    username: Option<String>,
    email: Option<String>,
    mobile_number: Option<String>,
    role: Option<Role>,
    avatar: Option<(String, Vec<u8>)>,
}

async fn collect_update(mut multipart: Multipart) -> Result<ProfileUpdate, AuthError> {
    let mut update = ProfileUpdate::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AuthError::Server(anyhow!("multipart read failed: {err}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "avatar" => {
                let file_name = field
                    .file_name()
                    .map(sanitize_file_name)
                    .unwrap_or_else(|| "avatar".to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| AuthError::Server(anyhow!("avatar read failed: {err}")))?;
                if !bytes.is_empty() {
                    update.avatar = Some((file_name, bytes.to_vec()));
                }
            }
            _ => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| AuthError::Server(anyhow!("field read failed: {err}")))?;
                let value = value.trim().to_string();
                if value.is_empty() {
                    continue;
                }
                match name.as_str() {
                    "username" => update.username = Some(value),
                    "email" => update.email = Some(value),
                    "mobile_number" => update.mobile_number = Some(value),
                    "role" => {
                        update.role =
                            Some(value.parse().map_err(|_| AuthError::InvalidFormat)?);
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(update)
}

/// Strip any path components so uploads cannot escape the uploads directory.
fn sanitize_file_name(raw: &str) -> String {
    let base = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw)
        .replace(char::is_whitespace, "_");
    if base.is_empty() {
        "avatar".to_string()
    } else {
        base
    }
}

/// A freshly written avatar: the URL stored on the row and the filesystem
/// location, kept so a failed row update can remove the file again.
struct StoredAvatar {
    url: String,
    path: std::path::PathBuf,
}

async fn store_avatar(
    uploads_dir: &str,
    file_name: &str,
    bytes: &[u8],
) -> Result<StoredAvatar, AuthError> {
    tokio::fs::create_dir_all(uploads_dir)
        .await
        .context("failed to create uploads directory")?;

    let stored_name = format!("{}-{}", Utc::now().timestamp_millis(), file_name);
    let path = std::path::Path::new(uploads_dir).join(&stored_name);

    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("failed to store avatar at {}", path.display()))?;

    Ok(StoredAvatar {
        url: format!("/uploads/{stored_name}"),
        path,
    })
}

/// Update a verified account's profile. Requires a session token whose
/// subject matches the account being updated.
#[utoipa::path(
    put,
    path = "/auth/{account_id}",
    params(("account_id" = Uuid, Path, description = "Account id")),
    request_body(content = UpdateAccountForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated profile", body = UserResponse),
        (status = 400, description = "Malformed field or duplicate username/email", body = ErrorBody),
        (status = 401, description = "Missing or mismatched session token", body = ErrorBody),
        (status = 404, description = "Unknown or unverified account", body = ErrorBody),
    ),
    tag = "account"
)]
#[instrument(skip_all, fields(account_id = %account_id))]
pub async fn update_account(
    Extension(pool): Extension<PgPool>,
    Extension(globals): Extension<Arc<GlobalArgs>>,
    Path(account_id): Path<Uuid>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<UserResponse>, AuthError> {
    require_account(
        &headers,
        account_id,
        globals.token_secret.expose_secret().as_bytes(),
    )?;

    let update = collect_update(multipart).await?;

    let email = match update.email {
        None => None,
        Some(raw) => {
            let email = normalize_email(&raw);
            if !valid_email(&email) {
                return Err(AuthError::InvalidFormat);
            }
            Some(email)
        }
    };

    if let Some(number) = &update.mobile_number {
        if !valid_mobile(number) {
            return Err(AuthError::InvalidFormat);
        }
    }

    let avatar = match &update.avatar {
        Some((file_name, bytes)) => {
            Some(store_avatar(&globals.uploads_dir, file_name, bytes).await?)
        }
        None => None,
    };

    let result = storage::update_profile(
        &pool,
        account_id,
        update.username.as_deref(),
        email.as_deref(),
        update.mobile_number.as_deref(),
        update.role,
        avatar.as_ref().map(|stored| stored.url.as_str()),
    )
    .await;

    let account = match result {
        Ok(account) => account,
        Err(err) => {
            // The row never picked up the new path, so the file is orphaned.
            if let Some(stored) = avatar {
                if let Err(remove_err) = tokio::fs::remove_file(&stored.path).await {
                    warn!(
                        "failed to remove orphaned avatar {}: {remove_err}",
                        stored.path.display()
                    );
                }
            }
            return Err(err);
        }
    };

    info!(account_id = %account.id, "profile updated");

    Ok(Json(account.into()))
}
