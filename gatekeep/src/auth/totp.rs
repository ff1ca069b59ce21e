//! Time-based one-time codes (RFC 6238: SHA-1, 6 digits, 30 s step).

use totp_rs::{Algorithm, Secret, TOTP};

pub const DIGITS: usize = 6;
pub const STEP_SECS: u64 = 30;

/// Codes from one step either side of now are accepted
pub const SKEW: u8 = 1;

/// Fresh 160-bit secret, base32 encoded
pub fn generate_secret() -> String {
    Secret::generate_secret().to_encoded().to_string()
}

// Imported secrets may be shorter than the 128 bits `TOTP::new` insists on.
fn totp(secret: &str) -> Option<TOTP> {
    let bytes = Secret::Encoded(secret.trim().to_uppercase()).to_bytes().ok()?;
    Some(TOTP::new_unchecked(Algorithm::SHA1, DIGITS, SKEW, STEP_SECS, bytes))
}

/// Check `code` against `secret` at the current time
pub fn verify_code(secret: &str, code: &str) -> bool {
    let code = code.trim();
    if code.len() != DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    totp(secret).is_some_and(|t| t.check_current(code).unwrap_or(false))
}

/// Code valid right now, `None` when the secret is not valid base32
pub fn current_code(secret: &str) -> Option<String> {
    totp(secret)?.generate_current().ok()
}
