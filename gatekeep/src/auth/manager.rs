//! Authorization provider implementation.

use super::{
    errors::{AuthError, AuthResult},
    events::{self, SecurityEvent},
    locks::IdentityLocks,
    models::{AuthSettings, ChallengeKind, ResetTicket, Session, SessionState, TwoFactorChallenge},
    totp,
};
use crate::{
    crypto::{CryptoRegistry, HashedPassword, Verification},
    db::{DatabaseError, IdentityStore},
    identity::{Identity, IdentityId},
    platform::PlatformHandle,
    runtime::{Scheduler, WorkerPool},
    security::{ExpiringMap, RateLimitResult, RateLimiter},
};
use chrono::Utc;
use rand::{Rng, distr::Alphanumeric};
use std::{future::Future, sync::Arc, time::Duration};
use uuid::Uuid;

const RESET_TOKEN_LENGTH: usize = 24;

/// Drives every session flow against the identity store.
///
/// One provider serves all connections. Hashing runs on the [`WorkerPool`],
/// identity updates are serialized per identity, and the shared throttle and
/// caches are internally synchronized.
pub struct AuthorizationProvider {
    store: Arc<dyn IdentityStore>,
    crypto: Arc<CryptoRegistry>,
    workers: WorkerPool,
    scheduler: Scheduler,
    platform: Arc<dyn PlatformHandle>,
    settings: AuthSettings,
    locks: IdentityLocks,
    email_limiter: RateLimiter,
    premium_confirmations: ExpiringMap<IdentityId, ()>,
    reset_tokens: ExpiringMap<String, IdentityId>,
}

impl AuthorizationProvider {
    /// Create a provider
    ///
    /// # Arguments
    ///
    /// * `store` - Canonical identity store, schema already validated
    /// * `crypto` - Credential codec with the configured default algorithm
    /// * `workers` - Pool the hashing jobs run on
    /// * `scheduler` - Spawns login timeouts and other deferred work
    /// * `platform` - Host capabilities (disconnect, presence)
    /// * `settings` - Session policy
    pub fn new(
        store: Arc<dyn IdentityStore>,
        crypto: Arc<CryptoRegistry>,
        workers: WorkerPool,
        scheduler: Scheduler,
        platform: Arc<dyn PlatformHandle>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            email_limiter: RateLimiter::new(settings.email_rate_limit),
            premium_confirmations: ExpiringMap::new(settings.premium_confirm_window),
            reset_tokens: ExpiringMap::new(settings.reset_token_ttl),
            locks: IdentityLocks::new(),
            store,
            crypto,
            workers,
            scheduler,
            platform,
            settings,
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    /// Open a session for a new connection
    ///
    /// The identity is created without a credential on first contact. When
    /// the host has confirmed a premium id that is bound to a stored
    /// identity, the session is authenticated right away (or asked for the
    /// second factor).
    ///
    /// # Arguments
    ///
    /// * `nickname` - Display name the player connected with
    /// * `ip` - Remote address, if known
    /// * `confirmed_premium` - Premium id the host verified for this connection
    ///
    /// # Errors
    ///
    /// * `AuthError::NameCaseMismatch` - Name exists with different casing
    /// * `AuthError::PremiumRequired` - Name is bound to a premium id the host
    ///   did not confirm for this connection
    /// * `AuthError::Database` - Storage failure
    pub async fn on_connect(
        &self,
        nickname: &str,
        ip: Option<&str>,
        confirmed_premium: Option<Uuid>,
    ) -> AuthResult<Session> {
        let premium_identity = match confirmed_premium {
            Some(premium_id) => self.store.get_by_premium_id(premium_id).await?,
            None => None,
        };

        let Some(identity) = premium_identity else {
            let identity = self.find_or_create(nickname, confirmed_premium).await?;
            if identity.auto_login_enabled() {
                events::record(SecurityEvent::PremiumRequired, nickname, ip, None);
                return Err(AuthError::PremiumRequired);
            }
            let mut session = Session::new(&identity, ip.map(str::to_string));
            self.arm_login_timeout(&mut session);
            return Ok(session);
        };

        let identity = if identity.last_nickname != nickname {
            log::info!(
                "Premium identity {} now connects as {} (was {})",
                identity.id,
                nickname,
                identity.last_nickname
            );
            let nickname = nickname.to_string();
            self.mutate(identity.id, move |identity| {
                identity.last_nickname = nickname;
                Ok(())
            })
            .await?
        } else {
            identity
        };

        let mut session = Session::new(&identity, ip.map(str::to_string));
        log::info!("{} logged in automatically with a premium id", session.nickname);
        self.enter_authenticated(&mut session, &identity).await?;
        if session.state != SessionState::Authenticated {
            self.arm_login_timeout(&mut session);
        }
        Ok(session)
    }

    /// Register a password for an unregistered identity
    ///
    /// # Errors
    ///
    /// * `AuthError::AlreadyRegistered` - Identity already has a credential
    /// * `AuthError::PremiumRequired` - Identity is bound to a premium id
    /// * `AuthError::WeakPassword` - Password too short or on the forbidden list
    /// * `AuthError::AlreadyAuthenticated` / `AuthError::TwoFactorPending` - Wrong state
    pub async fn register(&self, session: &mut Session, password: &str) -> AuthResult<()> {
        ensure_unauthenticated(session)?;
        self.check_password(password)?;

        ensure_claimable(&self.load(session.identity_id).await?)?;

        let credential = self.hash(password).await?;
        let ip = session.ip.clone();
        self.mutate(session.identity_id, move |identity| {
            ensure_claimable(identity)?;
            identity.credential = Some(credential);
            stamp_authentication(identity, ip);
            Ok(())
        })
        .await?;

        mark_authenticated(session);
        log::info!("{} registered", session.nickname);
        Ok(())
    }

    /// Log in with a password
    ///
    /// A legacy credential that verifies is re-hashed with the default
    /// algorithm. When a second factor is configured the session moves to
    /// [`SessionState::AwaitingSecondFactor`] instead of authenticating.
    ///
    /// # Returns
    ///
    /// * `SessionState` - State the session ended up in
    ///
    /// # Errors
    ///
    /// * `AuthError::NotRegistered` - No credential to check against
    /// * `AuthError::PremiumRequired` - Identity logs in through its premium id only
    /// * `AuthError::WrongPassword` - Mismatch, attempt counted
    /// * `AuthError::TooManyAttempts` - Attempt limit reached, connection dropped
    pub async fn login(&self, session: &mut Session, password: &str) -> AuthResult<SessionState> {
        ensure_unauthenticated(session)?;
        if let Some(max) = self.settings.max_password_attempts
            && session.failed_attempts >= max
        {
            return Err(AuthError::TooManyAttempts);
        }

        let identity = self.load(session.identity_id).await?;
        if identity.auto_login_enabled() {
            self.record(SecurityEvent::PremiumRequired, session, None);
            return Err(AuthError::PremiumRequired);
        }
        let stored = identity.credential.clone().ok_or(AuthError::NotRegistered)?;

        let verification = self.verify(password, &stored).await?;
        if !verification.is_match() {
            session.failed_attempts += 1;
            let failed = Some(u64::from(session.failed_attempts));
            self.record(SecurityEvent::WrongPassword, session, failed);

            if let Some(max) = self.settings.max_password_attempts
                && session.failed_attempts >= max
            {
                self.record(SecurityEvent::LockedOut, session, failed);
                self.platform
                    .disconnect(session.identity_id, "Too many wrong passwords");
                return Err(AuthError::TooManyAttempts);
            }
            return Err(AuthError::WrongPassword);
        }

        session.failed_attempts = 0;
        if verification.needs_upgrade() {
            self.upgrade_credential(session, password, stored).await?;
        }

        self.enter_authenticated(session, &identity).await?;
        Ok(session.state)
    }

    async fn upgrade_credential(
        &self,
        session: &Session,
        password: &str,
        stored: HashedPassword,
    ) -> AuthResult<()> {
        let upgraded = match self.hash(password).await {
            Ok(upgraded) => upgraded,
            // Plaintexts the default algorithm cannot take stay on the legacy hash
            Err(AuthError::Crypto(e)) => {
                log::warn!("Keeping {} credential for {}: {}", stored.algorithm, session.nickname, e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let from = stored.algorithm.clone();
        let to = upgraded.algorithm.clone();
        self.mutate(session.identity_id, move |identity| {
            if identity.credential.as_ref() == Some(&stored) {
                identity.credential = Some(upgraded);
            }
            Ok(())
        })
        .await?;

        log::info!("Upgraded credential of {} from {} to {}", session.nickname, from, to);
        Ok(())
    }

    /// Start setting up a second factor
    ///
    /// # Returns
    ///
    /// * `String` - Base32 secret to show the player; it is stored only once
    ///   a code generated from it has been verified
    ///
    /// # Errors
    ///
    /// * `AuthError::TwoFactorDisabled` - Second factors are switched off
    /// * `AuthError::TwoFactorAlreadyEnabled` - A secret is already stored
    pub async fn begin_two_factor(&self, session: &mut Session) -> AuthResult<String> {
        if !self.settings.totp_enabled {
            return Err(AuthError::TwoFactorDisabled);
        }
        ensure_authenticated(session)?;

        if self.load(session.identity_id).await?.two_factor_enabled() {
            return Err(AuthError::TwoFactorAlreadyEnabled);
        }

        let secret = totp::generate_secret();
        session.challenge = Some(TwoFactorChallenge {
            kind: ChallengeKind::Enable,
            secret: secret.clone(),
            attempts: 0,
        });
        session.state = SessionState::AwaitingSecondFactor;
        Ok(secret)
    }

    /// Answer the pending second factor challenge
    ///
    /// # Errors
    ///
    /// * `AuthError::NoPendingChallenge` - Nothing to answer
    /// * `AuthError::InvalidTwoFactorCode` - Wrong code, challenge kept
    /// * `AuthError::TooManyAttempts` - Retry limit reached, challenge dropped
    pub async fn verify_two_factor(&self, session: &mut Session, code: &str) -> AuthResult<()> {
        if session.state != SessionState::AwaitingSecondFactor {
            return Err(AuthError::NoPendingChallenge);
        }
        let challenge = session
            .challenge
            .as_ref()
            .ok_or(AuthError::NoPendingChallenge)?;

        if totp::verify_code(&challenge.secret, code) {
            let kind = challenge.kind;
            let secret = challenge.secret.clone();
            match kind {
                ChallengeKind::Login => self.complete_authentication(session).await?,
                ChallengeKind::Enable => {
                    self.mutate(session.identity_id, move |identity| {
                        identity.secret = Some(secret);
                        Ok(())
                    })
                    .await?;
                    session.challenge = None;
                    session.state = SessionState::Authenticated;
                    log::info!("{} enabled two-factor authentication", session.nickname);
                }
            }
            return Ok(());
        }

        let Some(challenge) = session.challenge.as_mut() else {
            return Err(AuthError::NoPendingChallenge);
        };
        challenge.attempts += 1;
        let attempts = challenge.attempts;
        let kind = challenge.kind;
        self.record(SecurityEvent::InvalidTwoFactorCode, session, Some(u64::from(attempts)));

        if attempts < self.settings.totp_max_attempts {
            return Err(AuthError::InvalidTwoFactorCode);
        }

        session.challenge = None;
        match kind {
            ChallengeKind::Login => {
                self.record(SecurityEvent::TwoFactorLockedOut, session, Some(u64::from(attempts)));
                session.state = SessionState::Unauthenticated;
                self.platform
                    .disconnect(session.identity_id, "Too many invalid codes");
            }
            ChallengeKind::Enable => session.state = SessionState::Authenticated,
        }
        Err(AuthError::TooManyAttempts)
    }

    /// Remove the stored second factor, proven by a current code
    pub async fn disable_two_factor(&self, session: &mut Session, code: &str) -> AuthResult<()> {
        ensure_authenticated(session)?;
        let identity = self.load(session.identity_id).await?;
        let secret = identity.secret.ok_or(AuthError::TwoFactorNotEnabled)?;

        if !totp::verify_code(&secret, code) {
            self.record(SecurityEvent::InvalidTwoFactorCode, session, None);
            return Err(AuthError::InvalidTwoFactorCode);
        }

        self.mutate(session.identity_id, |identity| {
            identity.secret = None;
            Ok(())
        })
        .await?;
        log::info!("{} disabled two-factor authentication", session.nickname);
        Ok(())
    }

    /// Replace the password, proven by the current one
    ///
    /// # Errors
    ///
    /// * `AuthError::WrongPassword` - `old` does not match
    /// * `AuthError::WeakPassword` - `new` too short
    pub async fn change_password(&self, session: &mut Session, old: &str, new: &str) -> AuthResult<()> {
        ensure_authenticated(session)?;
        self.check_password(new)?;
        self.require_password(session, old).await?;

        let credential = self.hash(new).await?;
        self.mutate(session.identity_id, move |identity| {
            identity.credential = Some(credential);
            Ok(())
        })
        .await?;
        log::info!("{} changed their password", session.nickname);
        Ok(())
    }

    /// Ask to bind the identity to a premium id
    ///
    /// Opens a confirmation window; [`AuthorizationProvider::confirm_premium`]
    /// must follow before it closes.
    pub async fn enable_premium(&self, session: &mut Session, password: &str) -> AuthResult<()> {
        ensure_authenticated(session)?;
        if self.load(session.identity_id).await?.auto_login_enabled() {
            return Err(AuthError::AlreadyPremium);
        }
        self.require_password(session, password).await?;

        self.premium_confirmations.insert(session.identity_id, ());
        log::info!("{} requested premium auto-login", session.nickname);
        Ok(())
    }

    /// Bind the host-confirmed premium id and drop the connection so the
    /// player reconnects through premium auto-login
    ///
    /// # Errors
    ///
    /// * `AuthError::ConfirmationExpired` - No pending enable request
    /// * `AuthError::PremiumTaken` - Another identity owns this premium id
    pub async fn confirm_premium(&self, session: &mut Session, premium_id: Uuid) -> AuthResult<()> {
        ensure_authenticated(session)?;
        if self.premium_confirmations.take(&session.identity_id).is_none() {
            return Err(AuthError::ConfirmationExpired);
        }

        if let Some(owner) = self.store.get_by_premium_id(premium_id).await?
            && owner.id != session.identity_id
        {
            return Err(AuthError::PremiumTaken);
        }

        self.mutate(session.identity_id, move |identity| {
            identity.premium_id = Some(premium_id);
            Ok(())
        })
        .await?;

        log::info!("{} enabled premium auto-login", session.nickname);
        self.platform
            .disconnect(session.identity_id, "Premium auto-login enabled, please reconnect");
        Ok(())
    }

    pub async fn disable_premium(&self, session: &mut Session) -> AuthResult<()> {
        ensure_authenticated(session)?;
        self.mutate(session.identity_id, |identity| {
            if identity.premium_id.take().is_none() {
                return Err(AuthError::NotPremium);
            }
            Ok(())
        })
        .await?;
        log::info!("{} disabled premium auto-login", session.nickname);
        Ok(())
    }

    /// Set the recovery e-mail address, proven by the password
    pub async fn set_email(&self, session: &mut Session, email: &str, password: &str) -> AuthResult<()> {
        ensure_authenticated(session)?;
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        self.require_password(session, password).await?;

        let email = email.to_string();
        self.mutate(session.identity_id, move |identity| {
            identity.email = Some(email);
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Issue a password reset token
    ///
    /// # Returns
    ///
    /// * `ResetTicket` - Address and token; the host delivers the e-mail
    ///
    /// # Errors
    ///
    /// * `AuthError::NoEmail` - No recovery address on file
    /// * `AuthError::RateLimited` - A request was made too recently
    pub async fn request_password_reset(&self, session: &mut Session) -> AuthResult<ResetTicket> {
        let identity = self.load(session.identity_id).await?;
        let email = identity.email.ok_or(AuthError::NoEmail)?;

        if let RateLimitResult::Locked { retry_after } =
            self.email_limiter.try_acquire(&session.identity_id.to_string())
        {
            self.record(SecurityEvent::ResetThrottled, session, None);
            return Err(AuthError::RateLimited { retry_after });
        }

        let token = generate_token();
        self.reset_tokens.insert(token.clone(), session.identity_id);
        log::info!("Password reset requested for {}", session.nickname);
        Ok(ResetTicket { email, token })
    }

    /// Set a new password using a token from
    /// [`AuthorizationProvider::request_password_reset`]
    ///
    /// # Errors
    ///
    /// * `AuthError::InvalidResetToken` - Unknown, expired or another identity's token
    pub async fn reset_password(&self, session: &mut Session, token: &str, password: &str) -> AuthResult<()> {
        self.check_password(password)?;

        let token = token.trim().to_string();
        match self.reset_tokens.get(&token) {
            Some(owner) if owner == session.identity_id => self.reset_tokens.remove(&token),
            _ => {
                self.record(SecurityEvent::InvalidResetToken, session, None);
                return Err(AuthError::InvalidResetToken);
            }
        }

        let credential = self.hash(password).await?;
        self.mutate(session.identity_id, move |identity| {
            identity.credential = Some(credential);
            Ok(())
        })
        .await?;

        session.failed_attempts = 0;
        log::info!("{} reset their password", session.nickname);
        Ok(())
    }

    /// Run `task` after `after`, cancelled if the connection goes away first
    pub fn defer<F>(&self, session: &mut Session, after: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        session.track(self.scheduler.delay(after, task));
    }

    /// Run `task` every `period` until the connection goes away
    pub fn repeat<F, Fut>(&self, session: &mut Session, period: Duration, task: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        session.track(self.scheduler.repeat(period, period, task));
    }

    /// Close a session
    ///
    /// Cancels every task the connection owns, then remembers the server the
    /// player left from unless it is a limbo server.
    pub async fn on_disconnect(&self, mut session: Session) -> AuthResult<()> {
        session.cancel_tasks();

        if !self.settings.remember_last_server || !session.is_authenticated() {
            return Ok(());
        }
        let Some(server) = self.platform.current_server(session.identity_id) else {
            return Ok(());
        };
        if self.settings.is_limbo(&server) {
            return Ok(());
        }

        self.mutate(session.identity_id, move |identity| {
            identity.last_server = Some(server);
            identity.last_seen = Some(Utc::now());
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn find_or_create(&self, nickname: &str, premium_id: Option<Uuid>) -> AuthResult<Identity> {
        if let Some(identity) = self.store.get_by_name(nickname).await? {
            return check_case(identity, nickname);
        }

        let id = self.settings.id_creator.new_id(nickname, premium_id);
        let identity = Identity::new(id, nickname);
        match self.store.insert(&identity).await {
            Ok(()) => {
                log::debug!("Created identity {} for {}", identity.id, nickname);
                Ok(identity)
            }
            // Another connection created it first
            Err(DatabaseError::Conflict(_)) => {
                let identity = self
                    .store
                    .get_by_name(nickname)
                    .await?
                    .ok_or(AuthError::IdentityNotFound)?;
                check_case(identity, nickname)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Password or premium accepted: authenticate, or challenge the stored
    /// second factor first
    async fn enter_authenticated(&self, session: &mut Session, identity: &Identity) -> AuthResult<()> {
        if self.settings.totp_enabled
            && let Some(secret) = identity.secret.clone()
        {
            session.challenge = Some(TwoFactorChallenge {
                kind: ChallengeKind::Login,
                secret,
                attempts: 0,
            });
            session.state = SessionState::AwaitingSecondFactor;
            return Ok(());
        }
        self.complete_authentication(session).await
    }

    async fn complete_authentication(&self, session: &mut Session) -> AuthResult<()> {
        let ip = session.ip.clone();
        self.mutate(session.identity_id, move |identity| {
            stamp_authentication(identity, ip);
            Ok(())
        })
        .await?;
        mark_authenticated(session);
        Ok(())
    }

    fn arm_login_timeout(&self, session: &mut Session) {
        let Some(after) = self.settings.login_timeout else {
            return;
        };
        let platform = self.platform.clone();
        let id = session.identity_id;
        session.login_timeout = Some(self.scheduler.delay(after, async move {
            platform.disconnect(id, "Login timed out");
        }));
    }

    fn check_password(&self, password: &str) -> AuthResult<()> {
        if password.chars().count() < self.settings.min_password_length {
            return Err(AuthError::WeakPassword(format!(
                "must be at least {} characters",
                self.settings.min_password_length
            )));
        }
        if self.settings.is_forbidden(password) {
            return Err(AuthError::WeakPassword("this password is not allowed".to_string()));
        }
        Ok(())
    }

    fn record(&self, event: SecurityEvent, session: &Session, attempts: Option<u64>) {
        events::record(event, &session.nickname, session.ip.as_deref(), attempts);
    }

    async fn require_password(&self, session: &Session, password: &str) -> AuthResult<()> {
        let identity = self.load(session.identity_id).await?;
        let stored = identity.credential.ok_or(AuthError::NotRegistered)?;
        if !self.verify(password, &stored).await?.is_match() {
            self.record(SecurityEvent::WrongPassword, session, None);
            return Err(AuthError::WrongPassword);
        }
        Ok(())
    }

    async fn load(&self, id: IdentityId) -> AuthResult<Identity> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or(AuthError::IdentityNotFound)
    }

    /// Read-modify-write one identity under its lock
    async fn mutate<F>(&self, id: IdentityId, change: F) -> AuthResult<Identity>
    where
        F: FnOnce(&mut Identity) -> AuthResult<()> + Send,
    {
        let _guard = self.locks.lock(id).await;
        let mut identity = self.load(id).await?;
        change(&mut identity)?;
        self.store.update(&identity).await?;
        Ok(identity)
    }

    async fn hash(&self, password: &str) -> AuthResult<HashedPassword> {
        let crypto = self.crypto.clone();
        let password = password.to_string();
        Ok(self
            .workers
            .run_blocking(move || crypto.hash(&password))
            .await??)
    }

    async fn verify(&self, password: &str, stored: &HashedPassword) -> AuthResult<Verification> {
        let crypto = self.crypto.clone();
        let password = password.to_string();
        let stored = stored.clone();
        Ok(self
            .workers
            .run_blocking(move || crypto.verify(&password, &stored))
            .await??)
    }
}

fn ensure_unauthenticated(session: &Session) -> AuthResult<()> {
    match session.state {
        SessionState::Unauthenticated => Ok(()),
        SessionState::Authenticated => Err(AuthError::AlreadyAuthenticated),
        SessionState::AwaitingSecondFactor => Err(AuthError::TwoFactorPending),
    }
}

fn ensure_authenticated(session: &Session) -> AuthResult<()> {
    match session.state {
        SessionState::Authenticated => Ok(()),
        SessionState::Unauthenticated => Err(AuthError::NotAuthenticated),
        SessionState::AwaitingSecondFactor => Err(AuthError::TwoFactorPending),
    }
}

/// A credential may be attached only to an unregistered identity that does
/// not log in through a premium id
fn ensure_claimable(identity: &Identity) -> AuthResult<()> {
    if identity.auto_login_enabled() {
        return Err(AuthError::PremiumRequired);
    }
    if identity.is_registered() {
        return Err(AuthError::AlreadyRegistered);
    }
    Ok(())
}

fn mark_authenticated(session: &mut Session) {
    session.state = SessionState::Authenticated;
    session.challenge = None;
    session.failed_attempts = 0;
    if let Some(timeout) = session.login_timeout.take() {
        timeout.cancel();
    }
}

fn stamp_authentication(identity: &mut Identity, ip: Option<String>) {
    let now = Utc::now();
    identity.last_authentication = Some(now);
    identity.last_seen = Some(now);
    if ip.is_some() {
        identity.ip = ip;
    }
}

fn check_case(identity: Identity, nickname: &str) -> AuthResult<Identity> {
    if identity.last_nickname != nickname {
        return Err(AuthError::NameCaseMismatch {
            expected: identity.last_nickname,
        });
    }
    Ok(identity)
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    email.len() <= 254
        && !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(RESET_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::DatabaseResult,
        identity::{IdCreator, offline_id},
        platform::StaticPlatform,
        security::RateLimitConfig,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};

    /// In-memory store with the same conflict and not-found rules as the SQL one
    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<HashMap<IdentityId, Identity>>,
    }

    #[async_trait]
    impl IdentityStore for MemoryStore {
        fn store_id(&self) -> String {
            "memory".to_string()
        }

        async fn get_by_id(&self, id: IdentityId) -> DatabaseResult<Option<Identity>> {
            Ok(self.rows.lock().get(&id).cloned())
        }

        async fn get_by_name(&self, name: &str) -> DatabaseResult<Option<Identity>> {
            Ok(self
                .rows
                .lock()
                .values()
                .find(|i| i.last_nickname.eq_ignore_ascii_case(name))
                .cloned())
        }

        async fn get_by_premium_id(&self, premium_id: Uuid) -> DatabaseResult<Option<Identity>> {
            Ok(self
                .rows
                .lock()
                .values()
                .find(|i| i.premium_id == Some(premium_id))
                .cloned())
        }

        async fn get_by_address(&self, ip: &str) -> DatabaseResult<HashSet<Identity>> {
            Ok(self
                .rows
                .lock()
                .values()
                .filter(|i| i.ip.as_deref() == Some(ip))
                .cloned()
                .collect())
        }

        async fn insert(&self, identity: &Identity) -> DatabaseResult<()> {
            let mut rows = self.rows.lock();
            if rows.contains_key(&identity.id) {
                return Err(DatabaseError::Conflict(identity.id.to_string()));
            }
            rows.insert(identity.id, identity.clone());
            Ok(())
        }

        async fn insert_many(&self, identities: &[Identity]) -> DatabaseResult<u64> {
            let mut rows = self.rows.lock();
            let mut inserted = 0;
            for identity in identities {
                if !rows.contains_key(&identity.id) {
                    rows.insert(identity.id, identity.clone());
                    inserted += 1;
                }
            }
            Ok(inserted)
        }

        async fn update(&self, identity: &Identity) -> DatabaseResult<()> {
            match self.rows.lock().get_mut(&identity.id) {
                Some(row) => {
                    *row = identity.clone();
                    Ok(())
                }
                None => Err(DatabaseError::NotFound(identity.id)),
            }
        }

        async fn delete(&self, id: IdentityId) -> DatabaseResult<bool> {
            Ok(self.rows.lock().remove(&id).is_some())
        }

        async fn count(&self) -> DatabaseResult<u64> {
            Ok(self.rows.lock().len() as u64)
        }

        async fn get_all(&self) -> DatabaseResult<Vec<Identity>> {
            Ok(self.rows.lock().values().cloned().collect())
        }

        async fn validate_schema(&self) -> DatabaseResult<()> {
            Ok(())
        }
    }

    struct Fixture {
        provider: AuthorizationProvider,
        store: Arc<MemoryStore>,
        platform: Arc<StaticPlatform>,
        crypto: Arc<CryptoRegistry>,
    }

    fn fixture(settings: AuthSettings) -> Fixture {
        let store = Arc::new(MemoryStore::default());
        let platform = Arc::new(StaticPlatform::new("/tmp/gatekeep-test", "test"));
        let crypto = Arc::new(CryptoRegistry::with_builtin("SHA-256").unwrap());
        let provider = AuthorizationProvider::new(
            store.clone(),
            crypto.clone(),
            WorkerPool::current(2),
            Scheduler::current(),
            platform.clone(),
            settings,
        );
        Fixture {
            provider,
            store,
            platform,
            crypto,
        }
    }

    async fn registered(fx: &Fixture, name: &str, password: &str) -> Session {
        let mut session = fx.provider.on_connect(name, Some("10.0.0.1"), None).await.unwrap();
        fx.provider.register(&mut session, password).await.unwrap();
        fx.provider.on_disconnect(session).await.unwrap();
        fx.provider.on_connect(name, Some("10.0.0.1"), None).await.unwrap()
    }

    #[tokio::test]
    async fn test_connect_creates_unregistered_identity() {
        let fx = fixture(AuthSettings::default());
        let session = fx.provider.on_connect("Bob", None, None).await.unwrap();

        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(session.identity_id(), offline_id("Bob"));
        let stored = fx.store.get_by_id(offline_id("Bob")).await.unwrap().unwrap();
        assert!(!stored.is_registered());
    }

    #[tokio::test]
    async fn test_connect_rejects_case_mismatch() {
        let fx = fixture(AuthSettings::default());
        fx.provider.on_connect("Bob", None, None).await.unwrap();

        match fx.provider.on_connect("bob", None, None).await {
            Err(AuthError::NameCaseMismatch { expected }) => assert_eq!(expected, "Bob"),
            other => panic!("expected NameCaseMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_authenticates_and_stamps() {
        let fx = fixture(AuthSettings::default());
        let mut session = fx.provider.on_connect("Bob", Some("10.0.0.7"), None).await.unwrap();

        fx.provider.register(&mut session, "hunter22").await.unwrap();

        assert!(session.is_authenticated());
        let stored = fx.store.get_by_id(session.identity_id()).await.unwrap().unwrap();
        assert!(stored.is_registered());
        assert_eq!(stored.ip.as_deref(), Some("10.0.0.7"));
        assert!(stored.last_authentication.is_some());
    }

    #[tokio::test]
    async fn test_register_guards() {
        let fx = fixture(AuthSettings::default());
        let mut session = fx.provider.on_connect("Bob", None, None).await.unwrap();

        assert!(matches!(
            fx.provider.register(&mut session, "abc").await,
            Err(AuthError::WeakPassword(_))
        ));

        fx.provider.register(&mut session, "hunter22").await.unwrap();
        assert!(matches!(
            fx.provider.register(&mut session, "hunter22").await,
            Err(AuthError::AlreadyAuthenticated)
        ));

        let mut second = fx.provider.on_connect("Bob", None, None).await.unwrap();
        assert!(matches!(
            fx.provider.register(&mut second, "other-pass").await,
            Err(AuthError::AlreadyRegistered)
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_forbidden_password() {
        let fx = fixture(AuthSettings {
            forbidden_passwords: vec!["PASSWORD".to_string()],
            ..AuthSettings::default()
        });
        let mut session = fx.provider.on_connect("Bob", None, None).await.unwrap();

        assert!(matches!(
            fx.provider.register(&mut session, "PassWord").await,
            Err(AuthError::WeakPassword(_))
        ));
        assert!(!session.is_authenticated());
        fx.provider.register(&mut session, "hunter22").await.unwrap();

        assert!(matches!(
            fx.provider.change_password(&mut session, "hunter22", "password").await,
            Err(AuthError::WeakPassword(_))
        ));
    }

    #[tokio::test]
    async fn test_new_identity_id_follows_creator_policy() {
        let premium = Uuid::new_v4();

        let fx = fixture(AuthSettings {
            id_creator: IdCreator::Mojang,
            ..AuthSettings::default()
        });
        let session = fx.provider.on_connect("Bob", None, Some(premium)).await.unwrap();
        assert_eq!(session.identity_id(), premium);
        let session = fx.provider.on_connect("Alice", None, None).await.unwrap();
        assert_eq!(session.identity_id(), offline_id("Alice"));

        let fx = fixture(AuthSettings {
            id_creator: IdCreator::Random,
            ..AuthSettings::default()
        });
        let session = fx.provider.on_connect("Bob", None, Some(premium)).await.unwrap();
        assert_ne!(session.identity_id(), premium);
        assert_ne!(session.identity_id(), offline_id("Bob"));
        let again = fx.provider.on_connect("Bob", None, None).await.unwrap();
        assert_eq!(again.identity_id(), session.identity_id());

        let fx = fixture(AuthSettings::default());
        let session = fx.provider.on_connect("Bob", None, Some(premium)).await.unwrap();
        assert_eq!(session.identity_id(), offline_id("Bob"));
    }

    #[tokio::test]
    async fn test_premium_identity_refuses_unverified_connection() {
        let fx = fixture(AuthSettings::default());
        let premium_id = Uuid::new_v4();
        let mut identity = Identity::new(offline_id("Notch"), "Notch");
        identity.premium_id = Some(premium_id);
        fx.store.insert(&identity).await.unwrap();

        assert!(matches!(
            fx.provider.on_connect("Notch", Some("10.0.0.9"), None).await,
            Err(AuthError::PremiumRequired)
        ));
        assert!(matches!(
            fx.provider.on_connect("Notch", None, Some(Uuid::new_v4())).await,
            Err(AuthError::PremiumRequired)
        ));

        let verified = fx.provider.on_connect("Notch", None, Some(premium_id)).await.unwrap();
        assert!(verified.is_authenticated());
        let stored = fx.store.get_by_id(identity.id).await.unwrap().unwrap();
        assert!(!stored.is_registered());
    }

    #[tokio::test]
    async fn test_register_and_login_refused_once_premium_is_bound() {
        let fx = fixture(AuthSettings::default());
        let mut session = fx.provider.on_connect("Notch", None, None).await.unwrap();

        // Bound by another connection after this one was opened
        let mut identity = fx.store.get_by_id(session.identity_id()).await.unwrap().unwrap();
        identity.premium_id = Some(Uuid::new_v4());
        fx.store.update(&identity).await.unwrap();

        assert!(matches!(
            fx.provider.register(&mut session, "attacker-pw").await,
            Err(AuthError::PremiumRequired)
        ));
        assert!(matches!(
            fx.provider.login(&mut session, "attacker-pw").await,
            Err(AuthError::PremiumRequired)
        ));
        assert!(!session.is_authenticated());
        let stored = fx.store.get_by_id(session.identity_id()).await.unwrap().unwrap();
        assert!(stored.credential.is_none());
    }

    #[tokio::test]
    async fn test_wrong_password_counts_attempts() {
        let fx = fixture(AuthSettings::default());
        let mut session = registered(&fx, "Bob", "hunter22").await;

        for expected in 1..=5 {
            assert!(matches!(
                fx.provider.login(&mut session, "wrong").await,
                Err(AuthError::WrongPassword)
            ));
            assert_eq!(session.failed_attempts(), expected);
            assert_eq!(session.state(), SessionState::Unauthenticated);
        }

        assert_eq!(
            fx.provider.login(&mut session, "hunter22").await.unwrap(),
            SessionState::Authenticated
        );
        assert_eq!(session.failed_attempts(), 0);
    }

    #[tokio::test]
    async fn test_max_attempts_locks_and_disconnects() {
        let fx = fixture(AuthSettings {
            max_password_attempts: Some(2),
            ..AuthSettings::default()
        });
        let mut session = registered(&fx, "Bob", "hunter22").await;

        assert!(matches!(
            fx.provider.login(&mut session, "wrong").await,
            Err(AuthError::WrongPassword)
        ));
        assert!(matches!(
            fx.provider.login(&mut session, "wrong").await,
            Err(AuthError::TooManyAttempts)
        ));
        assert!(matches!(
            fx.provider.login(&mut session, "hunter22").await,
            Err(AuthError::TooManyAttempts)
        ));
        assert_eq!(fx.platform.kicked().len(), 1);
    }

    #[tokio::test]
    async fn test_login_requires_registration() {
        let fx = fixture(AuthSettings::default());
        let mut session = fx.provider.on_connect("Bob", None, None).await.unwrap();
        assert!(matches!(
            fx.provider.login(&mut session, "whatever").await,
            Err(AuthError::NotRegistered)
        ));
    }

    #[tokio::test]
    async fn test_legacy_credential_upgraded_on_login() {
        let fx = fixture(AuthSettings::default());
        let session = fx.provider.on_connect("Bob", None, None).await.unwrap();

        let sha512 = fx.crypto.provider("SHA-512").unwrap().create_hash("hunter22").unwrap();
        let mut identity = fx.store.get_by_id(session.identity_id()).await.unwrap().unwrap();
        identity.credential = Some(sha512);
        fx.store.update(&identity).await.unwrap();

        let mut session = fx.provider.on_connect("Bob", None, None).await.unwrap();
        fx.provider.login(&mut session, "hunter22").await.unwrap();

        let stored = fx.store.get_by_id(session.identity_id()).await.unwrap().unwrap();
        assert_eq!(stored.credential.unwrap().algorithm, "SHA-256");
    }

    #[tokio::test]
    async fn test_two_factor_enable_flow() {
        let fx = fixture(AuthSettings::default());
        let mut session = registered(&fx, "Bob", "hunter22").await;
        fx.provider.login(&mut session, "hunter22").await.unwrap();

        let secret = fx.provider.begin_two_factor(&mut session).await.unwrap();
        assert_eq!(session.state(), SessionState::AwaitingSecondFactor);

        assert!(matches!(
            fx.provider.verify_two_factor(&mut session, "abcdef").await,
            Err(AuthError::InvalidTwoFactorCode)
        ));
        assert_eq!(session.state(), SessionState::AwaitingSecondFactor);
        assert!(matches!(
            fx.provider.change_password(&mut session, "hunter22", "hunter23").await,
            Err(AuthError::TwoFactorPending)
        ));

        let code = totp::current_code(&secret).unwrap();
        fx.provider.verify_two_factor(&mut session, &code).await.unwrap();
        assert!(session.is_authenticated());

        let stored = fx.store.get_by_id(session.identity_id()).await.unwrap().unwrap();
        assert_eq!(stored.secret.as_deref(), Some(secret.as_str()));
    }

    #[tokio::test]
    async fn test_two_factor_login_challenge() {
        let fx = fixture(AuthSettings::default());
        let session = registered(&fx, "Bob", "hunter22").await;
        let secret = totp::generate_secret();
        let mut identity = fx.store.get_by_id(session.identity_id()).await.unwrap().unwrap();
        identity.secret = Some(secret.clone());
        fx.store.update(&identity).await.unwrap();

        let mut session = fx.provider.on_connect("Bob", None, None).await.unwrap();
        assert_eq!(
            fx.provider.login(&mut session, "hunter22").await.unwrap(),
            SessionState::AwaitingSecondFactor
        );
        assert!(matches!(
            fx.provider.login(&mut session, "hunter22").await,
            Err(AuthError::TwoFactorPending)
        ));

        let code = totp::current_code(&secret).unwrap();
        fx.provider.verify_two_factor(&mut session, &code).await.unwrap();
        assert!(session.is_authenticated());
        assert!(session.pending_challenge().is_none());
    }

    #[tokio::test]
    async fn test_two_factor_retry_limit_drops_login() {
        let fx = fixture(AuthSettings {
            totp_max_attempts: 2,
            ..AuthSettings::default()
        });
        let session = registered(&fx, "Bob", "hunter22").await;
        let mut identity = fx.store.get_by_id(session.identity_id()).await.unwrap().unwrap();
        identity.secret = Some(totp::generate_secret());
        fx.store.update(&identity).await.unwrap();

        let mut session = fx.provider.on_connect("Bob", None, None).await.unwrap();
        fx.provider.login(&mut session, "hunter22").await.unwrap();

        // "abcdef" is never a valid code
        assert!(matches!(
            fx.provider.verify_two_factor(&mut session, "abcdef").await,
            Err(AuthError::InvalidTwoFactorCode)
        ));
        assert_eq!(session.state(), SessionState::AwaitingSecondFactor);
        assert!(matches!(
            fx.provider.verify_two_factor(&mut session, "abcdef").await,
            Err(AuthError::TooManyAttempts)
        ));
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert_eq!(fx.platform.kicked()[0].1, "Too many invalid codes");
    }

    #[tokio::test]
    async fn test_two_factor_disabled_globally() {
        let fx = fixture(AuthSettings {
            totp_enabled: false,
            ..AuthSettings::default()
        });
        let mut session = registered(&fx, "Bob", "hunter22").await;
        fx.provider.login(&mut session, "hunter22").await.unwrap();
        assert!(matches!(
            fx.provider.begin_two_factor(&mut session).await,
            Err(AuthError::TwoFactorDisabled)
        ));
    }

    #[tokio::test]
    async fn test_change_password() {
        let fx = fixture(AuthSettings::default());
        let mut session = registered(&fx, "Bob", "hunter22").await;

        assert!(matches!(
            fx.provider.change_password(&mut session, "hunter22", "hunter23").await,
            Err(AuthError::NotAuthenticated)
        ));

        fx.provider.login(&mut session, "hunter22").await.unwrap();
        assert!(matches!(
            fx.provider.change_password(&mut session, "wrong", "hunter23").await,
            Err(AuthError::WrongPassword)
        ));
        fx.provider
            .change_password(&mut session, "hunter22", "hunter23")
            .await
            .unwrap();

        let mut next = fx.provider.on_connect("Bob", None, None).await.unwrap();
        assert!(fx.provider.login(&mut next, "hunter23").await.is_ok());
    }

    #[tokio::test]
    async fn test_premium_enable_confirm_and_auto_login() {
        let fx = fixture(AuthSettings::default());
        let mut session = registered(&fx, "Bob", "hunter22").await;
        fx.provider.login(&mut session, "hunter22").await.unwrap();
        let premium_id = Uuid::new_v4();

        assert!(matches!(
            fx.provider.confirm_premium(&mut session, premium_id).await,
            Err(AuthError::ConfirmationExpired)
        ));

        fx.provider.enable_premium(&mut session, "hunter22").await.unwrap();
        fx.provider.confirm_premium(&mut session, premium_id).await.unwrap();

        let auto = fx.provider.on_connect("Bob", None, Some(premium_id)).await.unwrap();
        assert!(auto.is_authenticated());

        let mut auto = auto;
        fx.provider.disable_premium(&mut auto).await.unwrap();
        assert!(matches!(
            fx.provider.disable_premium(&mut auto).await,
            Err(AuthError::NotPremium)
        ));
        let fresh = fx.provider.on_connect("Bob", None, Some(premium_id)).await.unwrap();
        assert!(!fresh.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_premium_confirmation_expires() {
        let fx = fixture(AuthSettings {
            premium_confirm_window: Duration::from_secs(30),
            ..AuthSettings::default()
        });
        let mut session = registered(&fx, "Bob", "hunter22").await;
        fx.provider.login(&mut session, "hunter22").await.unwrap();

        fx.provider.enable_premium(&mut session, "hunter22").await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(matches!(
            fx.provider.confirm_premium(&mut session, Uuid::new_v4()).await,
            Err(AuthError::ConfirmationExpired)
        ));
    }

    #[tokio::test]
    async fn test_premium_id_taken() {
        let fx = fixture(AuthSettings::default());
        let premium_id = Uuid::new_v4();

        let alice = fx.provider.on_connect("Alice", None, None).await.unwrap();
        let mut identity = fx.store.get_by_id(alice.identity_id()).await.unwrap().unwrap();
        identity.premium_id = Some(premium_id);
        fx.store.update(&identity).await.unwrap();

        let mut bob = registered(&fx, "Bob", "hunter22").await;
        fx.provider.login(&mut bob, "hunter22").await.unwrap();
        fx.provider.enable_premium(&mut bob, "hunter22").await.unwrap();
        assert!(matches!(
            fx.provider.confirm_premium(&mut bob, premium_id).await,
            Err(AuthError::PremiumTaken)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_password_reset_flow_is_throttled() {
        let fx = fixture(AuthSettings {
            email_rate_limit: RateLimitConfig::new(1, Duration::from_secs(60)).unwrap(),
            ..AuthSettings::default()
        });
        let mut session = registered(&fx, "Bob", "hunter22").await;

        assert!(matches!(
            fx.provider.request_password_reset(&mut session).await,
            Err(AuthError::NoEmail)
        ));

        fx.provider.login(&mut session, "hunter22").await.unwrap();
        assert!(matches!(
            fx.provider.set_email(&mut session, "not-an-email", "hunter22").await,
            Err(AuthError::InvalidEmail)
        ));
        fx.provider
            .set_email(&mut session, "bob@example.com", "hunter22")
            .await
            .unwrap();

        let ticket = fx.provider.request_password_reset(&mut session).await.unwrap();
        assert_eq!(ticket.email, "bob@example.com");
        assert_eq!(ticket.token.len(), RESET_TOKEN_LENGTH);

        assert!(matches!(
            fx.provider.request_password_reset(&mut session).await,
            Err(AuthError::RateLimited { retry_after: 60 })
        ));

        assert!(matches!(
            fx.provider.reset_password(&mut session, "bogus", "newpass1").await,
            Err(AuthError::InvalidResetToken)
        ));
        fx.provider
            .reset_password(&mut session, &ticket.token, "newpass1")
            .await
            .unwrap();
        assert!(matches!(
            fx.provider.reset_password(&mut session, &ticket.token, "newpass2").await,
            Err(AuthError::InvalidResetToken)
        ));

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(fx.provider.request_password_reset(&mut session).await.is_ok());
    }

    #[tokio::test]
    async fn test_disconnect_remembers_last_server_outside_limbo() {
        let fx = fixture(AuthSettings {
            remember_last_server: true,
            ..AuthSettings::default()
        });

        let mut session = registered(&fx, "Bob", "hunter22").await;
        fx.provider.login(&mut session, "hunter22").await.unwrap();
        fx.platform.join(session.identity_id(), Some("survival".to_string()));
        let id = session.identity_id();
        fx.provider.on_disconnect(session).await.unwrap();
        let stored = fx.store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.last_server.as_deref(), Some("survival"));

        let mut session = fx.provider.on_connect("Bob", None, None).await.unwrap();
        fx.provider.login(&mut session, "hunter22").await.unwrap();
        fx.platform.join(id, Some("Limbo".to_string()));
        fx.provider.on_disconnect(session).await.unwrap();
        let stored = fx.store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.last_server.as_deref(), Some("survival"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_deferred_tasks() {
        let fx = fixture(AuthSettings::default());
        let mut session = fx.provider.on_connect("Bob", None, None).await.unwrap();
        let fired = Arc::new(Mutex::new(false));

        let flag = fired.clone();
        fx.provider.defer(&mut session, Duration::from_secs(10), async move {
            *flag.lock() = true;
        });
        assert_eq!(session.task_count(), 1);

        fx.provider.on_disconnect(session).await.unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(!*fired.lock());
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_timeout_disconnects_idle_connection() {
        let fx = fixture(AuthSettings {
            login_timeout: Some(Duration::from_secs(30)),
            ..AuthSettings::default()
        });

        let idle = fx.provider.on_connect("Idle", None, None).await.unwrap();
        let mut active = fx.provider.on_connect("Active", None, None).await.unwrap();
        fx.provider.register(&mut active, "hunter22").await.unwrap();

        tokio::time::sleep(Duration::from_secs(31)).await;
        let kicked = fx.platform.kicked();
        assert_eq!(kicked, vec![(idle.identity_id(), "Login timed out".to_string())]);
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("bob@example.com"));
        assert!(!is_valid_email("bob@localhost"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("bob@@example.com"));
        assert!(!is_valid_email("bob @example.com"));
    }
}
