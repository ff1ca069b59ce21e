//! Authorization error types.

use crate::{crypto::CryptoError, db::DatabaseError, runtime::RuntimeError};
use thiserror::Error;

/// Authorization errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// Storage error
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Credential codec error
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Hashing job could not run
    #[error("Worker error: {0}")]
    Worker(#[from] RuntimeError),

    /// Identity vanished between lookup and mutation
    #[error("Identity not found")]
    IdentityNotFound,

    /// Display name differs from the stored one only by case
    #[error("Invalid name case, please connect as {expected}")]
    NameCaseMismatch { expected: String },

    #[error("Already registered")]
    AlreadyRegistered,

    #[error("Not registered")]
    NotRegistered,

    #[error("Already authenticated")]
    AlreadyAuthenticated,

    #[error("Not authenticated")]
    NotAuthenticated,

    /// Password verification failed
    #[error("Wrong password")]
    WrongPassword,

    /// Password too weak
    #[error("Password too weak: {0}")]
    WeakPassword(String),

    /// Too many failed attempts on this connection
    #[error("Too many failed attempts")]
    TooManyAttempts,

    /// Action throttled
    #[error("Too many requests, try again in {retry_after}s")]
    RateLimited { retry_after: u64 },

    /// A one-time code must be entered first
    #[error("Two-factor authentication code required")]
    TwoFactorPending,

    /// No second factor challenge is pending
    #[error("No two-factor challenge pending")]
    NoPendingChallenge,

    /// Invalid 2FA code
    #[error("Invalid two-factor authentication code")]
    InvalidTwoFactorCode,

    /// Second factors are switched off on this server
    #[error("Two-factor authentication is disabled")]
    TwoFactorDisabled,

    #[error("Two-factor authentication already enabled")]
    TwoFactorAlreadyEnabled,

    #[error("Two-factor authentication not enabled")]
    TwoFactorNotEnabled,

    #[error("Invalid e-mail address")]
    InvalidEmail,

    #[error("No e-mail address set")]
    NoEmail,

    /// Invalid or expired reset token
    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Premium already enabled")]
    AlreadyPremium,

    #[error("Premium not enabled")]
    NotPremium,

    /// No enable-premium request is waiting, or it expired
    #[error("No premium confirmation pending")]
    ConfirmationExpired,

    /// Premium id already bound to another identity
    #[error("Premium account already in use")]
    PremiumTaken,

    /// Identity is bound to a premium id this connection has not proven
    #[error("This account uses premium login; connect with your premium account")]
    PremiumRequired,
}

impl AuthError {
    /// Get a client-safe error message that doesn't leak sensitive information
    ///
    /// Storage, codec and worker failures are collapsed into one generic
    /// message.
    pub fn client_message(&self) -> String {
        match self {
            AuthError::Database(_) | AuthError::Worker(_) => "Internal server error".to_string(),
            AuthError::Crypto(CryptoError::PlaintextTooLong { max, .. }) => {
                format!("Password too weak: must be at most {max} characters")
            }
            AuthError::Crypto(_) => "Authentication failed".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for authorization operations
pub type AuthResult<T> = Result<T, AuthError>;
