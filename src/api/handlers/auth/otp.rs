//! OTP generation.

use rand::Rng;

/// Validity window for an issued code, stored as an absolute expiry.
pub const OTP_TTL_SECONDS: i64 = 10 * 60;

/// Generate a uniformly random 6-digit code in [100000, 999999].
///
/// The string form keeps a fixed width with no leading zeros, matching what
/// the delivery templates and the stored column expect.
#[must_use]
pub fn generate_otp() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}
