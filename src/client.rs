//! The high-level client tying account setup, header processing and
//! recommendations together.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use anyhow::{ensure, Result};
use parking_lot::Mutex;

use crate::account::{AccountState, DefaultSettings};
use crate::aheader::Aheader;
use crate::gossip::GossipUpdate;
use crate::peerstate::PeerStateManager;
use crate::pgp::PgpEngine;
use crate::recommendation::Recommendation;
use crate::storage::{AccountStateStore, PeerStateStore};

/// One Autocrypt-capable account plus its view of all peers.
///
/// The client is cheap to share behind an [`Arc`] and all methods take
/// `&self`. Account setup is lazy: the first operation that needs key
/// material generates it, exactly once, and persists it.
pub struct AutocryptClient<S, E> {
    user_id: String,
    storage: Arc<S>,
    engine: Arc<E>,
    default_settings: DefaultSettings,
    peer_state_manager: PeerStateManager<Arc<S>, Arc<E>>,
    // Cache of the stored account state; the lock also serializes the
    // generate-then-persist path so only one key is ever created.
    account_state: Mutex<Option<AccountState>>,
}

impl<S, E> fmt::Debug for AutocryptClient<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutocryptClient")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

impl<S, E> AutocryptClient<S, E>
where
    S: PeerStateStore + AccountStateStore,
    E: PgpEngine,
{
    pub fn new(user_id: impl Into<String>, storage: Arc<S>, engine: Arc<E>) -> Self {
        Self::with_default_settings(user_id, storage, engine, DefaultSettings::default())
    }

    pub fn with_default_settings(
        user_id: impl Into<String>,
        storage: Arc<S>,
        engine: Arc<E>,
        default_settings: DefaultSettings,
    ) -> Self {
        let peer_state_manager =
            PeerStateManager::new(Arc::clone(&storage), Arc::clone(&engine));
        AutocryptClient {
            user_id: user_id.into(),
            storage,
            engine,
            default_settings,
            peer_state_manager,
            account_state: Mutex::new(None),
        }
    }

    /// Processes one received message's `Autocrypt` header values.
    pub fn process_autocrypt_headers(
        &self,
        from: &str,
        effective_date: i64,
        raw_headers: &[String],
    ) -> Result<()> {
        self.peer_state_manager
            .process_autocrypt_headers(from, effective_date, raw_headers)
    }

    /// Processes the `Autocrypt-Gossip` header values found in a decrypted
    /// message addressed to `recipients`.
    pub fn process_gossip_headers(
        &self,
        recipients: &HashSet<String>,
        effective_date: i64,
        raw_headers: &[String],
    ) -> Result<()> {
        let updates = GossipUpdate::collect(raw_headers, effective_date);
        self.peer_state_manager
            .process_gossip_header(recipients, &updates)
    }

    /// Loads the account state, creating and persisting it with freshly
    /// generated key material on first use.
    pub fn get_or_create_account_state(&self) -> Result<AccountState> {
        let mut cached = self.account_state.lock();
        if let Some(account_state) = cached.as_ref() {
            return Ok(account_state.clone());
        }
        let account_state = match self.storage.get_account_state(&self.user_id)? {
            Some(account_state) => account_state,
            None => {
                let secret_key = self.engine.generate_identity_key(&self.user_id)?;
                let account_state = AccountState::new(secret_key, &self.default_settings);
                self.storage
                    .set_account_state(&self.user_id, &account_state)?;
                account_state
            }
        };
        *cached = Some(account_state.clone());
        Ok(account_state)
    }

    /// Makes sure key material exists without changing anything else.
    ///
    /// Useful right after account creation so the first outgoing message
    /// does not pay the key generation cost.
    pub fn ensure_everything_is_setup(&self) -> Result<()> {
        self.get_or_create_account_state()?;
        Ok(())
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<AccountState> {
        self.modify_account_state(|account_state| account_state.with_enabled(enabled))
    }

    pub fn set_encryption_preference(
        &self,
        prefer_encrypt: crate::aheader::EncryptPreference,
    ) -> Result<AccountState> {
        self.modify_account_state(|account_state| {
            account_state.with_prefer_encrypt(prefer_encrypt)
        })
    }

    /// Returns the serialized secret key of the account, creating it first
    /// if needed.
    pub fn export_secret_key(&self) -> Result<Vec<u8>> {
        Ok(self.get_or_create_account_state()?.secret_key)
    }

    /// Replaces the account key with externally generated secret key
    /// material, keeping the other settings.
    ///
    /// The key must yield a public certificate with an encryption-capable
    /// subkey. Importing into a not-yet-set-up account does not generate
    /// and discard a key first.
    pub fn import_secret_key(&self, secret_key: Vec<u8>) -> Result<AccountState> {
        let public_key = self.engine.public_key_data(&secret_key)?;
        ensure!(
            self.engine.is_suitable_for_encryption(&public_key),
            "imported key has no encryption-capable subkey"
        );
        let mut cached = self.account_state.lock();
        let existing = match cached.clone() {
            Some(account_state) => Some(account_state),
            None => self.storage.get_account_state(&self.user_id)?,
        };
        let account_state = match existing {
            Some(account_state) => AccountState {
                secret_key,
                ..account_state
            },
            None => AccountState::new(secret_key, &self.default_settings),
        };
        self.storage.set_account_state(&self.user_id, &account_state)?;
        *cached = Some(account_state.clone());
        Ok(account_state)
    }

    fn modify_account_state(
        &self,
        modification: impl FnOnce(&AccountState) -> AccountState,
    ) -> Result<AccountState> {
        let current = self.get_or_create_account_state()?;
        let modified = modification(&current);
        self.storage.set_account_state(&self.user_id, &modified)?;
        *self.account_state.lock() = Some(modified.clone());
        Ok(modified)
    }

    /// Returns the `Autocrypt` header value to add to an outgoing message,
    /// or `None` while the account has Autocrypt disabled.
    pub fn get_autocrypt_header(&self) -> Result<Option<String>> {
        self.get_autocrypt_header_for(&self.user_id)
    }

    /// Like [`Self::get_autocrypt_header`], for messages sent from an alias
    /// address. The advertised key stays the account key.
    pub fn get_autocrypt_header_for(&self, from: &str) -> Result<Option<String>> {
        let account_state = self.get_or_create_account_state()?;
        if !account_state.enabled {
            return Ok(None);
        }
        let key_data = self.engine.public_key_data(&account_state.secret_key)?;
        let header = Aheader::new(from, key_data, Some(account_state.prefer_encrypt));
        Ok(Some(header.to_string()))
    }

    /// Computes the recommendation for one recipient of a draft.
    pub fn get_recommendation(
        &self,
        address: &str,
        is_reply_to_encrypted: bool,
    ) -> Result<Recommendation> {
        let account_state = self.get_or_create_account_state()?;
        let pre_recommendation = self
            .peer_state_manager
            .get_preliminary_recommendation(address)?;
        Ok(Recommendation::recommend(
            &account_state,
            is_reply_to_encrypted,
            pre_recommendation,
        ))
    }

    /// Computes the recommendations for all recipients of a draft.
    ///
    /// [`Recommendation::combine`] folds the result into one decision for
    /// the whole message.
    pub fn get_recommendations(
        &self,
        addresses: &[String],
        is_reply_to_encrypted: bool,
    ) -> Result<Vec<Recommendation>> {
        addresses
            .iter()
            .map(|address| self.get_recommendation(address, is_reply_to_encrypted))
            .collect()
    }
}
