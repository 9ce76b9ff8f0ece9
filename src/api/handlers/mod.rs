//! HTTP handlers.

pub mod account;
pub mod auth;
pub mod health;

use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
        .unwrap_or_else(|_| unreachable!("static pattern is valid"))
});

static MOBILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+[1-9]\d{7,14}$").unwrap_or_else(|_| unreachable!("static pattern is valid"))
});

/// Canonical form used as the account identity: trimmed and lowercased.
#[must_use]
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[must_use]
pub fn valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// E.164 check for the optional secondary contact number.
#[must_use]
pub fn valid_mobile(number: &str) -> bool {
    MOBILE_RE.is_match(number)
}
