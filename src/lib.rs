//! # Ricetta (Recipe Finder account service)
//!
//! `ricetta` owns the account verification and credential lifecycle for the
//! Recipe Finder application: OTP-based registration, login, password reset,
//! and authenticated profile updates.
//!
//! ## Identity model
//!
//! The canonical identity is an email address; a mobile number is an optional
//! secondary contact field. An account starts as an unverified placeholder the
//! moment a registration OTP is requested and becomes verified exactly once,
//! when a matching unexpired code is submitted together with the remaining
//! profile fields.
//!
//! ## OTP semantics
//!
//! Codes are persisted on the account row (never in process memory), expire
//! ten minutes after issuance, and are consumed by a single atomic conditional
//! update so a code can never be accepted twice. Re-issuing overwrites any
//! outstanding code; only the most recent one validates.
//!
//! ## Enumeration resistance
//!
//! Login collapses "unknown email" and "wrong password" into one
//! indistinguishable `invalid_credentials` response.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
