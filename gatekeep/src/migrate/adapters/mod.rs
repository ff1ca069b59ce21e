//! Built-in format adapters.

pub mod authme;
pub mod authy;
pub mod canonical;
pub mod jpremium;
pub mod limboauth;
pub mod loginsecurity;
pub mod logit;
pub mod nlogin;

pub use authme::AuthMeAdapter;
pub use authy::AuthyAdapter;
pub use canonical::CanonicalAdapter;
pub use jpremium::JPremiumAdapter;
pub use limboauth::LimboAuthAdapter;
pub use loginsecurity::LoginSecurityAdapter;
pub use logit::LogItAdapter;
pub use nlogin::NLoginAdapter;

use crate::{
    crypto::HashedPassword,
    identity::{Identity, IdentityId},
};

pub(crate) const BCRYPT: &str = "BCrypt-2A";
pub(crate) const ARGON2ID: &str = "Argon2ID";

/// Identity carrying only what every legacy table has
pub(crate) fn imported(id: IdentityId, nickname: &str) -> Identity {
    Identity {
        id,
        premium_id: None,
        credential: None,
        last_nickname: nickname.to_string(),
        join_date: None,
        last_seen: None,
        secret: None,
        ip: None,
        last_authentication: None,
        last_server: None,
        email: None,
    }
}

/// Self-describing bcrypt string kept as is
pub(crate) fn bcrypt_verbatim(raw: &str) -> Option<HashedPassword> {
    ["$2a$", "$2b$", "$2y$"]
        .iter()
        .any(|prefix| raw.starts_with(prefix))
        .then(|| HashedPassword::new(raw, None, BCRYPT))
}

#[cfg(test)]
pub(crate) fn text(value: &str) -> crate::migrate::models::LegacyValue {
    crate::migrate::models::LegacyValue::Text(value.to_string())
}
