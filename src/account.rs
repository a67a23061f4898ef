//! Own-account Autocrypt settings and key material.

use crate::aheader::EncryptPreference;

/// Immutable snapshot of the account's Autocrypt setup.
///
/// Setting changes produce a new value via [`AccountState::with_enabled`]
/// or [`AccountState::with_prefer_encrypt`]; the store always holds a
/// complete snapshot, never a partial update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    /// Whether outgoing messages advertise Autocrypt at all.
    pub enabled: bool,

    /// Serialized OpenPGP secret key, interpreted only by the
    /// [`PgpEngine`](crate::pgp::PgpEngine).
    pub secret_key: Vec<u8>,

    /// Preference announced in outgoing `Autocrypt` headers.
    pub prefer_encrypt: EncryptPreference,
}

impl AccountState {
    pub fn new(secret_key: Vec<u8>, settings: &DefaultSettings) -> Self {
        AccountState {
            enabled: settings.enabled,
            secret_key,
            prefer_encrypt: settings.prefer_encrypt,
        }
    }

    pub fn with_enabled(&self, enabled: bool) -> Self {
        AccountState {
            enabled,
            ..self.clone()
        }
    }

    pub fn with_prefer_encrypt(&self, prefer_encrypt: EncryptPreference) -> Self {
        AccountState {
            prefer_encrypt,
            ..self.clone()
        }
    }
}

/// Settings applied when an account is set up for the first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultSettings {
    pub enabled: bool,
    pub prefer_encrypt: EncryptPreference,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        DefaultSettings {
            enabled: true,
            prefer_encrypt: EncryptPreference::NoPreference,
        }
    }
}
