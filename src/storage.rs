//! Storage traits and the bundled in-memory implementation.
//!
//! Persistent backends implement [`PeerStateStore`] and
//! [`AccountStateStore`]; the timestamp gates live here so that the
//! check and the write happen under one lock.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;

use crate::account::AccountState;
use crate::aheader::EncryptPreference;
use crate::peerstate::Peerstate;

/// Per-peer state persistence.
///
/// All addresses passed in are already normalized. Each method must be
/// atomic per address.
pub trait PeerStateStore: Send + Sync {
    /// Loads the state for one address.
    fn get_peerstate(&self, addr: &str) -> Result<Option<Peerstate>>;

    /// Advances `last_seen` for a message with the given effective date,
    /// creating fresh state on first contact.
    ///
    /// Returns false, without any change, if the message predates the
    /// stored `autocrypt_timestamp`. `last_seen` itself never moves
    /// backwards.
    fn update_last_seen(&self, addr: &str, effective_date: i64) -> Result<bool>;

    /// Replaces key, preference and `autocrypt_timestamp` after a
    /// successful header update. No-op if the peer is unknown.
    fn update_autocrypt(
        &self,
        addr: &str,
        effective_date: i64,
        key_data: &[u8],
        prefer_encrypt: EncryptPreference,
    ) -> Result<()>;

    /// Stores a gossiped key unless the stored gossip is newer. Returns
    /// whether the key was stored. Creates state if the address is
    /// unknown; gossip alone does not count as having seen the peer.
    fn update_gossip(&self, addr: &str, effective_date: i64, key_data: &[u8]) -> Result<bool>;
}

impl<T: PeerStateStore + ?Sized> PeerStateStore for Arc<T> {
    fn get_peerstate(&self, addr: &str) -> Result<Option<Peerstate>> {
        (**self).get_peerstate(addr)
    }

    fn update_last_seen(&self, addr: &str, effective_date: i64) -> Result<bool> {
        (**self).update_last_seen(addr, effective_date)
    }

    fn update_autocrypt(
        &self,
        addr: &str,
        effective_date: i64,
        key_data: &[u8],
        prefer_encrypt: EncryptPreference,
    ) -> Result<()> {
        (**self).update_autocrypt(addr, effective_date, key_data, prefer_encrypt)
    }

    fn update_gossip(&self, addr: &str, effective_date: i64, key_data: &[u8]) -> Result<bool> {
        (**self).update_gossip(addr, effective_date, key_data)
    }
}

/// Own-account persistence, keyed by the account's user id.
pub trait AccountStateStore: Send + Sync {
    fn get_account_state(&self, user_id: &str) -> Result<Option<AccountState>>;

    fn set_account_state(&self, user_id: &str, account_state: &AccountState) -> Result<()>;
}

impl<T: AccountStateStore + ?Sized> AccountStateStore for Arc<T> {
    fn get_account_state(&self, user_id: &str) -> Result<Option<AccountState>> {
        (**self).get_account_state(user_id)
    }

    fn set_account_state(&self, user_id: &str, account_state: &AccountState) -> Result<()> {
        (**self).set_account_state(user_id, account_state)
    }
}

/// Non-persistent store, suitable for tests and short-lived processes.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    peers: RwLock<HashMap<String, Peerstate>>,
    accounts: RwLock<HashMap<String, AccountState>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PeerStateStore for InMemoryStorage {
    fn get_peerstate(&self, addr: &str) -> Result<Option<Peerstate>> {
        Ok(self.peers.read().get(addr).cloned())
    }

    fn update_last_seen(&self, addr: &str, effective_date: i64) -> Result<bool> {
        let mut peers = self.peers.write();
        let Some(peerstate) = peers.get_mut(addr) else {
            peers.insert(addr.to_string(), Peerstate::fresh(addr, effective_date));
            return Ok(true);
        };
        if effective_date < peerstate.autocrypt_timestamp {
            return Ok(false);
        }
        if effective_date > peerstate.last_seen {
            peerstate.last_seen = effective_date;
        }
        Ok(true)
    }

    fn update_autocrypt(
        &self,
        addr: &str,
        effective_date: i64,
        key_data: &[u8],
        prefer_encrypt: EncryptPreference,
    ) -> Result<()> {
        let mut peers = self.peers.write();
        if let Some(peerstate) = peers.get_mut(addr) {
            peerstate.autocrypt_timestamp = effective_date;
            peerstate.public_key = Some(key_data.to_vec());
            peerstate.prefer_encrypt = prefer_encrypt;
        }
        Ok(())
    }

    fn update_gossip(&self, addr: &str, effective_date: i64, key_data: &[u8]) -> Result<bool> {
        let mut peers = self.peers.write();
        let peerstate = peers
            .entry(addr.to_string())
            .or_insert_with(|| Peerstate::fresh(addr, 0));
        if effective_date < peerstate.gossip_timestamp {
            return Ok(false);
        }
        peerstate.gossip_timestamp = effective_date;
        peerstate.gossip_key = Some(key_data.to_vec());
        Ok(true)
    }
}

impl AccountStateStore for InMemoryStorage {
    fn get_account_state(&self, user_id: &str) -> Result<Option<AccountState>> {
        Ok(self.accounts.read().get(user_id).cloned())
    }

    fn set_account_state(&self, user_id: &str, account_state: &AccountState) -> Result<()> {
        self.accounts
            .write()
            .insert(user_id.to_string(), account_state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::account::DefaultSettings;

    use super::*;

    const T0: i64 = 1_500_000_000;

    #[test]
    fn test_update_last_seen_creates_fresh_state() {
        let storage = InMemoryStorage::new();
        assert!(storage.update_last_seen("a@b.example", T0).unwrap());
        let peerstate = storage.get_peerstate("a@b.example").unwrap().unwrap();
        assert_eq!(peerstate, Peerstate::fresh("a@b.example", T0));
    }

    #[test]
    fn test_update_last_seen_never_regresses() {
        let storage = InMemoryStorage::new();
        storage.update_last_seen("a@b.example", T0).unwrap();
        assert!(storage.update_last_seen("a@b.example", T0 - 10).unwrap());
        let peerstate = storage.get_peerstate("a@b.example").unwrap().unwrap();
        assert_eq!(peerstate.last_seen, T0);
    }

    #[test]
    fn test_update_last_seen_gates_on_autocrypt_timestamp() {
        let storage = InMemoryStorage::new();
        storage.update_last_seen("a@b.example", T0).unwrap();
        storage
            .update_autocrypt("a@b.example", T0, b"key", EncryptPreference::Mutual)
            .unwrap();
        assert!(!storage.update_last_seen("a@b.example", T0 - 1).unwrap());
        // The same effective date as the stored key update is fine.
        assert!(storage.update_last_seen("a@b.example", T0).unwrap());
    }

    #[test]
    fn test_update_autocrypt_requires_existing_peer() {
        let storage = InMemoryStorage::new();
        storage
            .update_autocrypt("a@b.example", T0, b"key", EncryptPreference::Mutual)
            .unwrap();
        assert!(storage.get_peerstate("a@b.example").unwrap().is_none());
    }

    #[test]
    fn test_update_gossip_creates_unseen_peer() {
        let storage = InMemoryStorage::new();
        assert!(storage.update_gossip("a@b.example", T0, b"key").unwrap());
        let peerstate = storage.get_peerstate("a@b.example").unwrap().unwrap();
        assert_eq!(peerstate.last_seen, 0);
        assert_eq!(peerstate.gossip_timestamp, T0);
        assert_eq!(peerstate.gossip_key.as_deref(), Some(&b"key"[..]));
        assert_eq!(peerstate.public_key, None);
    }

    #[test]
    fn test_update_gossip_gates_on_gossip_timestamp() {
        let storage = InMemoryStorage::new();
        storage.update_gossip("a@b.example", T0, b"new").unwrap();
        assert!(!storage.update_gossip("a@b.example", T0 - 1, b"old").unwrap());
        let peerstate = storage.get_peerstate("a@b.example").unwrap().unwrap();
        assert_eq!(peerstate.gossip_key.as_deref(), Some(&b"new"[..]));
    }

    #[test]
    fn test_account_state_round_trip() {
        let storage = InMemoryStorage::new();
        assert!(storage.get_account_state("me@example.com").unwrap().is_none());
        let state = AccountState::new(b"secret".to_vec(), &DefaultSettings::default());
        storage.set_account_state("me@example.com", &state).unwrap();
        assert_eq!(
            storage.get_account_state("me@example.com").unwrap(),
            Some(state)
        );
    }
}
