//! # [Autocrypt Peer State](https://autocrypt.org/level1.html#peer-state-management) module.
//!
//! All updates are ordered by the message's effective date: state created
//! from a newer message is never overwritten by a replayed older one.

use std::collections::HashSet;

use anyhow::Result;
use autocrypt_contact_tools::addr_normalize;
use log::{info, warn};

use crate::aheader::{Aheader, EncryptPreference};
use crate::gossip::GossipUpdate;
use crate::pgp::PgpEngine;
use crate::recommendation::Decision;
use crate::storage::PeerStateStore;

/// How long a stored Autocrypt key counts as current, in seconds.
///
/// If the peer has been seen more recently than this without an `Autocrypt`
/// header, their stored key is considered stale and encryption is only
/// discouraged, not offered.
pub const AUTOCRYPT_HEADER_EXPIRY: i64 = 35 * 24 * 60 * 60;

/// Peerstate represents the state of an Autocrypt peer.
///
/// One exists per normalized address; it is owned by the
/// [`PeerStateStore`] and mutated only through it.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Peerstate {
    /// Normalized e-mail address of the contact.
    pub addr: String,

    /// Timestamp of the latest processed message from the contact,
    /// with or without an `Autocrypt` header.
    pub last_seen: i64,

    /// Timestamp of the latest `Autocrypt` header reception.
    pub autocrypt_timestamp: i64,

    /// Encryption preference of the contact.
    pub prefer_encrypt: EncryptPreference,

    /// Public key of the contact received in an `Autocrypt` header.
    pub public_key: Option<Vec<u8>>,

    /// Timestamp of the latest `Autocrypt-Gossip` header reception.
    ///
    /// It is stored to avoid applying an outdated gossiped key
    /// from delayed or reordered messages.
    pub gossip_timestamp: i64,

    /// Public key of the contact received in an `Autocrypt-Gossip` header.
    pub gossip_key: Option<Vec<u8>>,
}

impl Peerstate {
    /// Creates state for an address contacted for the first time.
    ///
    /// Timestamps other than `last_seen` start at the epoch, so any header
    /// carried by the same message still applies.
    pub fn fresh(addr: &str, last_seen: i64) -> Self {
        Peerstate {
            addr: addr.to_string(),
            last_seen,
            autocrypt_timestamp: 0,
            prefer_encrypt: EncryptPreference::NoPreference,
            public_key: None,
            gossip_timestamp: 0,
            gossip_key: None,
        }
    }
}

/// Preliminary recommendation derived purely from stored peer state,
/// before account settings and reply context are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreRecommendation {
    /// Decision derivable from the stored keys and timestamps alone.
    pub decision: Decision,

    /// Key to carry into the final recommendation, if any.
    pub public_key: Option<Vec<u8>>,

    /// Stored encryption preference of the peer.
    pub prefer_encrypt: EncryptPreference,
}

impl PreRecommendation {
    /// No usable key material: encryption cannot be offered.
    pub fn disable() -> Self {
        PreRecommendation {
            decision: Decision::Disable,
            public_key: None,
            prefer_encrypt: EncryptPreference::NoPreference,
        }
    }

    /// A key exists but is gossip or stale: encryption works but is not
    /// suggested.
    pub fn discourage(public_key: Vec<u8>) -> Self {
        PreRecommendation {
            decision: Decision::Discourage,
            public_key: Some(public_key),
            prefer_encrypt: EncryptPreference::NoPreference,
        }
    }

    /// A current key exists: encryption can be offered.
    pub fn available(public_key: Vec<u8>, prefer_encrypt: EncryptPreference) -> Self {
        PreRecommendation {
            decision: Decision::Available,
            public_key: Some(public_key),
            prefer_encrypt,
        }
    }
}

/// Why a message yielded no single applicable `Autocrypt` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ambiguity {
    /// No parseable header matched the message's From address.
    NoMatch,

    /// More than one header matched; the protocol requires skipping the
    /// update entirely.
    Multiple(usize),
}

/// Resolves the `Autocrypt` header values of one message to the single
/// applicable header.
///
/// Malformed values are ignored; of the remaining ones only those count
/// whose `addr` equals the message's literal From address (case-sensitive,
/// before normalization). Exactly one must remain.
pub fn resolve_update_header(
    from: &str,
    raw_headers: &[String],
) -> std::result::Result<Aheader, Ambiguity> {
    let mut matching: Vec<Aheader> = raw_headers
        .iter()
        .filter_map(|raw| raw.parse::<Aheader>().ok())
        .filter(|header| header.addr == from)
        .collect();
    match matching.len() {
        1 => Ok(matching.remove(0)),
        0 => Err(Ambiguity::NoMatch),
        n => Err(Ambiguity::Multiple(n)),
    }
}

/// The timestamp-ordered state machine: applies incoming headers against
/// stored per-peer state and computes preliminary recommendations.
///
/// Calls for the same address must be serialized by the store; calls for
/// different addresses are independent.
#[derive(Debug)]
pub struct PeerStateManager<S, E> {
    storage: S,
    engine: E,
}

impl<S: PeerStateStore, E: PgpEngine> PeerStateManager<S, E> {
    /// Creates a manager on top of the given store and OpenPGP engine.
    pub fn new(storage: S, engine: E) -> Self {
        PeerStateManager { storage, engine }
    }

    /// Processes the `Autocrypt` header values of one received message.
    ///
    /// If the message predates the last applied key update, nothing
    /// changes. Otherwise `last_seen` moves forward, and if the message
    /// carries exactly one valid header matching `from` whose key is
    /// suitable for encryption, the stored key, preference and
    /// `autocrypt_timestamp` are replaced.
    pub fn process_autocrypt_headers(
        &self,
        from: &str,
        effective_date: i64,
        raw_headers: &[String],
    ) -> Result<()> {
        let addr = addr_normalize(from)?;
        if !self.storage.update_last_seen(&addr, effective_date)? {
            // Replay of old mail must be a no-op.
            return Ok(());
        }
        let header = match resolve_update_header(from, raw_headers) {
            Ok(header) => header,
            Err(Ambiguity::NoMatch) => return Ok(()),
            Err(Ambiguity::Multiple(count)) => {
                warn!("ignoring {count} conflicting Autocrypt headers from {addr}");
                return Ok(());
            }
        };
        if !self.engine.is_suitable_for_encryption(&header.key_data) {
            info!("key advertised by {addr} is not suitable for encryption, ignoring");
            return Ok(());
        }
        self.storage.update_autocrypt(
            &addr,
            effective_date,
            &header.key_data,
            header.prefer_encrypt.unwrap_or_default(),
        )
    }

    /// Stores gossiped keys for the given updates.
    ///
    /// Gossip about an address that is not among the message's recipients
    /// is rejected: a sender must not vouch for arbitrary third parties.
    /// Stale gossip (older than the stored gossip timestamp) is ignored by
    /// the store.
    pub fn process_gossip_header(
        &self,
        recipients: &HashSet<String>,
        gossip_updates: &[GossipUpdate],
    ) -> Result<()> {
        for update in gossip_updates {
            let addr = match addr_normalize(&update.from) {
                Ok(addr) => addr,
                Err(err) => {
                    warn!("ignoring gossip for unusable address {:?}: {err:#}", update.from);
                    continue;
                }
            };
            if !recipients.contains(&addr) {
                warn!(
                    "{:?} did not appear in the list of recipients, ignoring gossip",
                    update.from
                );
                continue;
            }
            if !self.engine.is_suitable_for_encryption(&update.key_data) {
                info!("gossiped key for {addr} is not suitable for encryption, ignoring");
                continue;
            }
            if !self.storage.update_gossip(&addr, update.effective_date, &update.key_data)? {
                info!("gossiped key for {addr} is older than the stored one, ignoring");
            }
        }
        Ok(())
    }

    /// Computes the recommendation derivable from stored state alone.
    pub fn get_preliminary_recommendation(&self, address: &str) -> Result<PreRecommendation> {
        let addr = addr_normalize(address)?;
        let Some(peerstate) = self.storage.get_peerstate(&addr)? else {
            return Ok(PreRecommendation::disable());
        };
        // Keys that no longer parse or cannot encrypt are treated as absent.
        let public_key = peerstate
            .public_key
            .filter(|key| self.engine.is_suitable_for_encryption(key));
        let gossip_key = peerstate
            .gossip_key
            .filter(|key| self.engine.is_suitable_for_encryption(key));
        let Some(public_key) = public_key else {
            return Ok(match gossip_key {
                // Gossip is never strong enough for "available".
                Some(gossip_key) => PreRecommendation::discourage(gossip_key),
                None => PreRecommendation::disable(),
            });
        };
        if peerstate.autocrypt_timestamp > peerstate.last_seen - AUTOCRYPT_HEADER_EXPIRY {
            Ok(PreRecommendation::available(
                public_key,
                peerstate.prefer_encrypt,
            ))
        } else {
            Ok(PreRecommendation::discourage(public_key))
        }
    }
}
