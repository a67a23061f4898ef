//! Opportunistic e-mail encryption following [Autocrypt Level 1](https://autocrypt.org/level1.html).
//!
//! The crate covers the protocol core: parsing and producing `Autocrypt`
//! and `Autocrypt-Gossip` headers, tracking per-peer key state ordered by
//! message date, and deriving encryption recommendations for drafts.
//! Transport, MIME handling and the actual encryption and decryption of
//! message bodies stay with the caller.
//!
//! The usual entry point is [`AutocryptClient`] over an
//! [`InMemoryStorage`](storage::InMemoryStorage) or a custom
//! [`PeerStateStore`](storage::PeerStateStore) and
//! [`AccountStateStore`](storage::AccountStateStore).
#![warn(
    unused,
    clippy::correctness,
    missing_debug_implementations,
    clippy::all,
    clippy::wildcard_imports,
    clippy::needless_borrow,
    clippy::cast_lossless,
    clippy::explicit_iter_loop,
    clippy::cloned_instead_of_copied
)]
#![cfg_attr(not(test), warn(clippy::indexing_slicing))]
#![forbid(unsafe_code)]

pub mod account;
pub mod aheader;
pub mod attribute;
pub mod client;
pub mod gossip;
pub mod peerstate;
pub mod pgp;
pub mod recommendation;
pub mod storage;

#[cfg(test)]
mod test_utils;

pub use account::{AccountState, DefaultSettings};
pub use aheader::{Aheader, EncryptPreference};
pub use client::AutocryptClient;
pub use gossip::GossipUpdate;
pub use peerstate::{PeerStateManager, Peerstate};
pub use pgp::{PgpEngine, RpgpEngine};
pub use recommendation::{Decision, Recommendation};
pub use storage::{AccountStateStore, InMemoryStorage, PeerStateStore};
