//! Structured security events.
//!
//! Emitted as `tracing` events under the `gatekeep::security` target so hosts
//! can route or alert on them separately from ordinary log output.

/// Security-relevant outcome of a session flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    WrongPassword,
    LockedOut,
    InvalidTwoFactorCode,
    TwoFactorLockedOut,
    ResetThrottled,
    InvalidResetToken,
    /// Connection claimed a premium-bound name without premium verification
    PremiumRequired,
}

impl SecurityEvent {
    /// Stable `event_type` field value
    pub fn as_str(self) -> &'static str {
        match self {
            SecurityEvent::WrongPassword => "wrong_password",
            SecurityEvent::LockedOut => "locked_out",
            SecurityEvent::InvalidTwoFactorCode => "invalid_two_factor_code",
            SecurityEvent::TwoFactorLockedOut => "two_factor_locked_out",
            SecurityEvent::ResetThrottled => "password_reset_throttled",
            SecurityEvent::InvalidResetToken => "invalid_reset_token",
            SecurityEvent::PremiumRequired => "premium_required",
        }
    }

    fn message(self) -> &'static str {
        match self {
            SecurityEvent::WrongPassword => "Wrong password",
            SecurityEvent::LockedOut => "Connection dropped after too many wrong passwords",
            SecurityEvent::InvalidTwoFactorCode => "Invalid two-factor code",
            SecurityEvent::TwoFactorLockedOut => "Connection dropped after too many invalid codes",
            SecurityEvent::ResetThrottled => "Password reset request throttled",
            SecurityEvent::InvalidResetToken => "Invalid password reset token",
            SecurityEvent::PremiumRequired => "Unverified connection to a premium identity refused",
        }
    }
}

/// Emit `event` with the connection's name and address
///
/// # Arguments
///
/// * `event` - What happened
/// * `nickname` - Display name of the connection
/// * `ip_address` - Remote address, if known
/// * `attempts` - Failures so far on this connection, for counted events
pub fn record(event: SecurityEvent, nickname: &str, ip_address: Option<&str>, attempts: Option<u64>) {
    tracing::warn!(
        target: "gatekeep::security",
        event_type = event.as_str(),
        nickname = nickname,
        ip_address = ip_address,
        attempts = attempts,
        "{}",
        event.message()
    );
}
