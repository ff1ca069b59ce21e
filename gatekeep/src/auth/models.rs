//! Session and settings models.

use crate::{
    identity::{IdCreator, Identity, IdentityId},
    runtime::CancellableTask,
    security::RateLimitConfig,
};
use std::time::Duration;

/// Where a connection stands in the authorization flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    AwaitingSecondFactor,
}

/// Why a second factor is being asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    /// Password accepted; the stored secret must be proven
    Login,

    /// Authenticated player setting up a new secret
    Enable,
}

/// Pending one-time code check
#[derive(Clone)]
pub struct TwoFactorChallenge {
    pub kind: ChallengeKind,
    /// Base32 secret the code is checked against
    pub(crate) secret: String,
    pub attempts: u32,
}

impl std::fmt::Debug for TwoFactorChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoFactorChallenge")
            .field("kind", &self.kind)
            .field("secret", &"[SECRET]")
            .field("attempts", &self.attempts)
            .finish()
    }
}

/// State of one live connection.
///
/// Owned by the connection's command flow and passed by `&mut` into every
/// [`AuthorizationProvider`](super::AuthorizationProvider) operation.
#[derive(Debug)]
pub struct Session {
    pub(crate) identity_id: IdentityId,
    pub(crate) nickname: String,
    pub(crate) ip: Option<String>,
    pub(crate) state: SessionState,
    pub(crate) failed_attempts: u32,
    pub(crate) challenge: Option<TwoFactorChallenge>,
    pub(crate) login_timeout: Option<CancellableTask>,
    pub(crate) tasks: Vec<CancellableTask>,
}

impl Session {
    pub(crate) fn new(identity: &Identity, ip: Option<String>) -> Self {
        Self {
            identity_id: identity.id,
            nickname: identity.last_nickname.clone(),
            ip,
            state: SessionState::Unauthenticated,
            failed_attempts: 0,
            challenge: None,
            login_timeout: None,
            tasks: Vec::new(),
        }
    }

    pub fn identity_id(&self) -> IdentityId {
        self.identity_id
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn ip(&self) -> Option<&str> {
        self.ip.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    pub fn pending_challenge(&self) -> Option<&TwoFactorChallenge> {
        self.challenge.as_ref()
    }

    /// Attach a task cancelled when the connection goes away
    pub fn track(&mut self, task: CancellableTask) {
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(task);
    }

    /// Tracked tasks still running
    pub fn task_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    pub(crate) fn cancel_tasks(&mut self) {
        if let Some(timeout) = self.login_timeout.take() {
            timeout.cancel();
        }
        for task in self.tasks.drain(..) {
            task.cancel();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel_tasks();
    }
}

/// Issued by a password reset request; delivering it is up to the host
#[derive(Clone, PartialEq, Eq)]
pub struct ResetTicket {
    pub email: String,
    pub token: String,
}

impl std::fmt::Debug for ResetTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetTicket")
            .field("email", &self.email)
            .field("token", &"[TOKEN]")
            .finish()
    }
}

/// Policy knobs for the session flows
#[derive(Debug, Clone, PartialEq)]
pub struct AuthSettings {
    pub min_password_length: usize,

    /// Refused passwords, upper-cased; matched case-insensitively
    pub forbidden_passwords: Vec<String>,

    /// Id policy for identities created on first contact
    pub id_creator: IdCreator,

    /// Wrong passwords allowed per connection; `None` never locks
    pub max_password_attempts: Option<u32>,

    pub totp_enabled: bool,

    /// Wrong one-time codes allowed before a challenge is dropped
    pub totp_max_attempts: u32,

    pub remember_last_server: bool,

    /// Servers never persisted as a last server
    pub limbo: Vec<String>,

    pub email_rate_limit: RateLimitConfig,

    pub premium_confirm_window: Duration,

    pub reset_token_ttl: Duration,

    /// Disconnect if still unauthenticated after this long
    pub login_timeout: Option<Duration>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            min_password_length: 4,
            forbidden_passwords: Vec::new(),
            id_creator: IdCreator::Cracked,
            max_password_attempts: None,
            totp_enabled: true,
            totp_max_attempts: 3,
            remember_last_server: false,
            limbo: vec!["limbo".to_string()],
            email_rate_limit: RateLimitConfig::email(),
            premium_confirm_window: Duration::from_secs(300),
            reset_token_ttl: Duration::from_secs(600),
            login_timeout: None,
        }
    }
}

impl AuthSettings {
    pub fn is_limbo(&self, server: &str) -> bool {
        self.limbo.iter().any(|l| l.eq_ignore_ascii_case(server))
    }

    pub fn is_forbidden(&self, password: &str) -> bool {
        let upper = password.to_uppercase();
        self.forbidden_passwords.iter().any(|f| *f == upper)
    }
}
