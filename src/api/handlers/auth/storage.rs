//! Database helpers for the account lifecycle.
//!
//! OTP consumption is a single conditional UPDATE so that two concurrent
//! submissions of the same code can never both succeed. When the UPDATE
//! matches no row, a follow-up SELECT inside the same transaction classifies
//! the failure (unknown email, already verified, wrong code, expired).

use crate::api::{
    error::AuthError,
    handlers::auth::model::{Account, OtpChallenge, PendingAccount, Role, VerifiedAccount},
};
use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str =
    "id, email, username, mobile_number, role, avatar_path, created_at, updated_at";

/// Challenge state read back when a conditional consume matched no row.
#[derive(Debug)]
struct ChallengeRow {
    verified: bool,
    otp_code: Option<String>,
    otp_expires_at: Option<DateTime<Utc>>,
}

fn account_from_row(row: &sqlx::postgres::PgRow) -> Result<VerifiedAccount, AuthError> {
    let role: String = row.try_get("role")?;
    let role = role
        .parse::<Role>()
        .map_err(|err| AuthError::Server(anyhow!(err)))?;

    Ok(VerifiedAccount {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        username: row.try_get("username")?,
        mobile_number: row.try_get("mobile_number")?,
        role,
        avatar_path: row.try_get("avatar_path")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Map a unique violation to the offending field, if any.
fn duplicate_field(err: &sqlx::Error) -> Option<&'static str> {
    let sqlx::Error::Database(db_err) = err else {
        return None;
    };
    if db_err.code().as_deref() != Some("23505") {
        return None;
    }
    match db_err.constraint() {
        Some("accounts_email_key") => Some("email"),
        Some("accounts_username_key") => Some("username"),
        _ => Some("field"),
    }
}

/// Classify why a conditional registration consume matched no row.
fn classify_registration(row: Option<&ChallengeRow>, otp: &str, now: DateTime<Utc>) -> AuthError {
    let Some(row) = row else {
        return AuthError::NotFound;
    };
    if row.verified {
        return AuthError::AlreadyRegistered;
    }
    classify_challenge(row, otp, now)
}

/// Classify why a conditional reset consume matched no row.
fn classify_reset(row: Option<&ChallengeRow>, otp: &str, now: DateTime<Utc>) -> AuthError {
    let Some(row) = row else {
        return AuthError::NotFound;
    };
    if !row.verified {
        // Pending accounts have no password to reset.
        return AuthError::NotFound;
    }
    classify_challenge(row, otp, now)
}

fn classify_challenge(row: &ChallengeRow, otp: &str, now: DateTime<Utc>) -> AuthError {
    match (&row.otp_code, row.otp_expires_at) {
        (Some(code), Some(expires_at)) if code == otp => {
            if expires_at < now {
                AuthError::Expired
            } else {
                // Matched on re-read but not in the UPDATE: a concurrent
                // request consumed it between the two statements.
                AuthError::InvalidCode
            }
        }
        _ => AuthError::InvalidCode,
    }
}

/// Persist a registration challenge, creating the pending account on first
/// request and superseding any previous code on re-request.
///
/// # Errors
///
/// `AlreadyRegistered` when the email belongs to a verified account.
pub async fn upsert_registration_challenge(
    pool: &PgPool,
    email: &str,
    code: &str,
    expires_at: DateTime<Utc>,
) -> Result<Uuid, AuthError> {
    let query = r"
        INSERT INTO accounts (email, otp_code, otp_expires_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE
            SET otp_code = EXCLUDED.otp_code,
                otp_expires_at = EXCLUDED.otp_expires_at,
                updated_at = NOW()
            WHERE accounts.verified = FALSE
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(code)
        .bind(expires_at)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to upsert registration challenge")?;

    match row {
        Some(row) => Ok(row.try_get("id")?),
        None => Err(AuthError::AlreadyRegistered),
    }
}

/// Persist a password reset challenge for a verified account.
///
/// # Errors
///
/// `NotFound` when the email is unknown or still pending.
pub async fn issue_reset_challenge(
    pool: &PgPool,
    email: &str,
    code: &str,
    expires_at: DateTime<Utc>,
) -> Result<Uuid, AuthError> {
    let query = r"
        UPDATE accounts
        SET otp_code = $2, otp_expires_at = $3, updated_at = NOW()
        WHERE email = $1 AND verified = TRUE
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(code)
        .bind(expires_at)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to issue reset challenge")?;

    match row {
        Some(row) => Ok(row.try_get("id")?),
        None => Err(AuthError::NotFound),
    }
}

async fn fetch_challenge_row(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    email: &str,
) -> Result<Option<ChallengeRow>, AuthError> {
    let query = "SELECT verified, otp_code, otp_expires_at FROM accounts WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await
        .context("failed to read challenge state")?;

    Ok(row
        .map(|row| -> Result<ChallengeRow, sqlx::Error> {
            Ok(ChallengeRow {
                verified: row.try_get("verified")?,
                otp_code: row.try_get("otp_code")?,
                otp_expires_at: row.try_get("otp_expires_at")?,
            })
        })
        .transpose()?)
}

/// Atomically consume a registration challenge and promote the pending
/// account to verified with its full profile.
///
/// # Errors
///
/// `NotFound`, `AlreadyRegistered`, `InvalidCode`, `Expired` or
/// `DuplicateField` depending on what blocked the promotion.
pub async fn finalize_registration(
    pool: &PgPool,
    email: &str,
    otp: &str,
    username: &str,
    password_hash: &str,
    role: Role,
    mobile_number: Option<&str>,
) -> Result<VerifiedAccount, AuthError> {
    let mut tx = pool
        .begin()
        .await
        .context("begin registration transaction")?;

    let query = format!(
        r"
        UPDATE accounts
        SET verified = TRUE,
            username = $3,
            password_hash = $4,
            role = $5,
            mobile_number = $6,
            otp_code = NULL,
            otp_expires_at = NULL,
            updated_at = NOW()
        WHERE email = $1
          AND verified = FALSE
          AND otp_code = $2
          AND otp_expires_at >= NOW()
        RETURNING {ACCOUNT_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .bind(otp)
        .bind(username)
        .bind(password_hash)
        .bind(role.as_str())
        .bind(mobile_number)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await;

    let row = match row {
        Ok(row) => row,
        Err(err) => {
            let _ = tx.rollback().await;
            if let Some(field) = duplicate_field(&err) {
                return Err(AuthError::DuplicateField(field));
            }
            return Err(err.into());
        }
    };

    if let Some(row) = row {
        let account = account_from_row(&row)?;
        tx.commit().await.context("commit registration")?;
        return Ok(account);
    }

    let state = fetch_challenge_row(&mut tx, email).await?;
    let _ = tx.rollback().await;
    Err(classify_registration(state.as_ref(), otp, Utc::now()))
}

/// Atomically consume a reset challenge and replace the password hash.
///
/// # Errors
///
/// `NotFound`, `InvalidCode` or `Expired` depending on what blocked the
/// reset.
pub async fn reset_password(
    pool: &PgPool,
    email: &str,
    otp: &str,
    password_hash: &str,
) -> Result<(), AuthError> {
    let mut tx = pool.begin().await.context("begin reset transaction")?;

    let query = r"
        UPDATE accounts
        SET password_hash = $3,
            otp_code = NULL,
            otp_expires_at = NULL,
            updated_at = NOW()
        WHERE email = $1
          AND verified = TRUE
          AND otp_code = $2
          AND otp_expires_at >= NOW()
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(otp)
        .bind(password_hash)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to reset password")?;

    if row.is_some() {
        tx.commit().await.context("commit reset")?;
        return Ok(());
    }

    let state = fetch_challenge_row(&mut tx, email).await?;
    let _ = tx.rollback().await;
    Err(classify_reset(state.as_ref(), otp, Utc::now()))
}

/// Login lookup result. Pending accounts have no credentials yet.
#[derive(Debug)]
pub enum LoginRecord {
    Pending,
    Verified {
        account: VerifiedAccount,
        password_hash: String,
    },
}

/// Fetch the account and password hash for a login attempt.
pub async fn fetch_login(pool: &PgPool, email: &str) -> Result<Option<LoginRecord>, AuthError> {
    let query = format!(
        "SELECT {ACCOUNT_COLUMNS}, verified, password_hash FROM accounts WHERE email = $1"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch login record")?;

    row.map(|row| {
        let verified: bool = row.try_get("verified")?;
        if !verified {
            return Ok(LoginRecord::Pending);
        }
        Ok(LoginRecord::Verified {
            account: account_from_row(&row)?,
            password_hash: row.try_get("password_hash")?,
        })
    })
    .transpose()
}

/// Fetch an account by id as the pending/verified union.
pub async fn fetch_account_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Account>, AuthError> {
    let query = format!(
        "SELECT {ACCOUNT_COLUMNS}, verified, otp_code, otp_expires_at FROM accounts WHERE id = $1"
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to fetch account")?;

    row.map(|row| {
        let verified: bool = row.try_get("verified")?;
        if verified {
            return Ok(Account::Verified(account_from_row(&row)?));
        }

        let code: Option<String> = row.try_get("otp_code")?;
        let expires_at: Option<DateTime<Utc>> = row.try_get("otp_expires_at")?;
        let challenge = match (code, expires_at) {
            (Some(code), Some(expires_at)) => Some(OtpChallenge { code, expires_at }),
            _ => None,
        };

        Ok(Account::Pending(PendingAccount {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            challenge,
        }))
    })
    .transpose()
}

/// Partially update a verified account's profile. `None` fields are left
/// untouched.
///
/// # Errors
///
/// `NotFound` when the id is unknown or pending, `DuplicateField` when the
/// new username or email collides.
#[allow(clippy::too_many_arguments)]
pub async fn update_profile(
    pool: &PgPool,
    id: Uuid,
    username: Option<&str>,
    email: Option<&str>,
    mobile_number: Option<&str>,
    role: Option<Role>,
    avatar_path: Option<&str>,
) -> Result<VerifiedAccount, AuthError> {
    let query = format!(
        r"
        UPDATE accounts
        SET username = COALESCE($2, username),
            email = COALESCE($3, email),
            mobile_number = COALESCE($4, mobile_number),
            role = COALESCE($5, role),
            avatar_path = COALESCE($6, avatar_path),
            updated_at = NOW()
        WHERE id = $1 AND verified = TRUE
        RETURNING {ACCOUNT_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(id)
        .bind(username)
        .bind(email)
        .bind(mobile_number)
        .bind(role.map(Role::as_str))
        .bind(avatar_path)
        .fetch_optional(pool)
        .instrument(span)
        .await;

    match row {
        Ok(Some(row)) => account_from_row(&row),
        Ok(None) => Err(AuthError::NotFound),
        Err(err) => {
            if let Some(field) = duplicate_field(&err) {
                return Err(AuthError::DuplicateField(field));
            }
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    fn challenge(verified: bool, code: Option<&str>, expires_in: i64) -> ChallengeRow {
        ChallengeRow {
            verified,
            otp_code: code.map(str::to_string),
            otp_expires_at: code.map(|_| Utc::now() + Duration::seconds(expires_in)),
        }
    }

    #[test]
    fn registration_classification() {
        let now = Utc::now();

        assert!(matches!(
            classify_registration(None, "123456", now),
            AuthError::NotFound
        ));
        assert!(matches!(
            classify_registration(Some(&challenge(true, None, 0)), "123456", now),
            AuthError::AlreadyRegistered
        ));
        assert!(matches!(
            classify_registration(Some(&challenge(false, Some("999999"), 60)), "123456", now),
            AuthError::InvalidCode
        ));
        assert!(matches!(
            classify_registration(Some(&challenge(false, Some("123456"), -60)), "123456", now),
            AuthError::Expired
        ));
        assert!(matches!(
            classify_registration(Some(&challenge(false, None, 0)), "123456", now),
            AuthError::InvalidCode
        ));
    }

    #[test]
    fn reset_classification() {
        let now = Utc::now();

        assert!(matches!(
            classify_reset(None, "123456", now),
            AuthError::NotFound
        ));
        // A pending account cannot reset a password it never set.
        assert!(matches!(
            classify_reset(Some(&challenge(false, Some("123456"), 60)), "123456", now),
            AuthError::NotFound
        ));
        assert!(matches!(
            classify_reset(Some(&challenge(true, Some("999999"), 60)), "123456", now),
            AuthError::InvalidCode
        ));
        assert!(matches!(
            classify_reset(Some(&challenge(true, Some("123456"), -60)), "123456", now),
            AuthError::Expired
        ));
    }

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
        constraint: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn constraint(&self) -> Option<&str> {
            self.constraint
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn duplicate_field_maps_constraints() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
            constraint: Some("accounts_username_key"),
        }));
        assert_eq!(duplicate_field(&err), Some("username"));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
            constraint: Some("accounts_email_key"),
        }));
        assert_eq!(duplicate_field(&err), Some("email"));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
            constraint: None,
        }));
        assert_eq!(duplicate_field(&err), Some("field"));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23503"),
            constraint: Some("accounts_email_key"),
        }));
        assert_eq!(duplicate_field(&err), None);

        assert_eq!(duplicate_field(&sqlx::Error::RowNotFound), None);
    }
}
