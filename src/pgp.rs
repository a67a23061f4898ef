//! OpenPGP engine collaborator, implemented with [rPGP facilities](https://github.com/rpgp/rpgp).
//!
//! The rest of the crate treats key material as opaque byte blobs; this
//! module is the only place that interprets them. Alternative OpenPGP
//! backends plug in through the [`PgpEngine`] trait.

use std::io::Cursor;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use autocrypt_contact_tools::EmailAddress;
use pgp::composed::{
    Deserializable, KeyType as PgpKeyType, SecretKeyParamsBuilder, SignedPublicKey,
    SignedPublicSubKey, SignedSecretKey, SubkeyParamsBuilder,
};
use pgp::crypto::ecc_curve::ECCCurve;
use pgp::crypto::hash::HashAlgorithm;
use pgp::crypto::sym::SymmetricKeyAlgorithm;
use pgp::types::{CompressionAlgorithm, PublicKeyTrait, SecretKeyTrait};
use rand::thread_rng;
use smallvec::smallvec;

/// Interface to the OpenPGP implementation.
///
/// Key generation, suitability checks and secret-to-public splitting are all
/// the core ever needs; encryption and decryption streams stay entirely with
/// the caller.
pub trait PgpEngine: Send + Sync {
    /// Returns true if the given key material parses as an OpenPGP public
    /// key that contains an encryption-capable (sub)key.
    ///
    /// Keys failing this check are treated as absent by the state machine.
    fn is_suitable_for_encryption(&self, key_data: &[u8]) -> bool;

    /// Generates a fresh identity keypair for the given address and returns
    /// the serialized secret key.
    fn generate_identity_key(&self, user_id: &str) -> Result<Vec<u8>>;

    /// Splits the public certificate out of serialized secret key material,
    /// for advertising in an `Autocrypt` header.
    fn public_key_data(&self, secret_key_data: &[u8]) -> Result<Vec<u8>>;
}

impl<T: PgpEngine + ?Sized> PgpEngine for Arc<T> {
    fn is_suitable_for_encryption(&self, key_data: &[u8]) -> bool {
        (**self).is_suitable_for_encryption(key_data)
    }

    fn generate_identity_key(&self, user_id: &str) -> Result<Vec<u8>> {
        (**self).generate_identity_key(user_id)
    }

    fn public_key_data(&self, secret_key_data: &[u8]) -> Result<Vec<u8>> {
        (**self).public_key_data(secret_key_data)
    }
}

/// The default [`PgpEngine`] backed by rPGP.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpgpEngine;

impl PgpEngine for RpgpEngine {
    fn is_suitable_for_encryption(&self, key_data: &[u8]) -> bool {
        match SignedPublicKey::from_bytes(Cursor::new(key_data)) {
            Ok(key) => has_encryption_key(&key),
            Err(_) => false,
        }
    }

    fn generate_identity_key(&self, user_id: &str) -> Result<Vec<u8>> {
        let addr = EmailAddress::new(user_id)
            .with_context(|| format!("cannot generate a key for user id {user_id:?}"))?;
        let keypair = create_keypair(&addr)?;
        key_to_bytes(&keypair.secret)
    }

    fn public_key_data(&self, secret_key_data: &[u8]) -> Result<Vec<u8>> {
        let secret_key = SignedSecretKey::from_bytes(Cursor::new(secret_key_data))
            .context("failed to parse stored secret key")?;
        let public_key = split_public_key(&secret_key)?;
        key_to_bytes(&public_key)
    }
}

/// Returns true if the key itself or one of its subkeys can be used for
/// encryption.
///
/// TODO: take key flags and expiration dates into account
fn has_encryption_key(key: &SignedPublicKey) -> bool {
    key.public_subkeys
        .iter()
        .any(|subkey| subkey.is_encryption_key())
        || key.is_encryption_key()
}

/// A PGP keypair.
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyPair {
    public: SignedPublicKey,
    secret: SignedSecretKey,
}

/// Create a new key pair.
///
/// Both secret and public key consist of signing primary key and encryption subkey
/// as [described in the Autocrypt standard](https://autocrypt.org/level1.html#openpgp-based-key-data).
fn create_keypair(addr: &EmailAddress) -> Result<KeyPair> {
    let user_id = format!("<{addr}>");
    let key_params = SecretKeyParamsBuilder::default()
        .key_type(PgpKeyType::EdDSALegacy)
        .can_certify(true)
        .can_sign(true)
        .primary_user_id(user_id)
        .passphrase(None)
        .preferred_symmetric_algorithms(smallvec![
            SymmetricKeyAlgorithm::AES256,
            SymmetricKeyAlgorithm::AES192,
            SymmetricKeyAlgorithm::AES128,
        ])
        .preferred_hash_algorithms(smallvec![
            HashAlgorithm::SHA2_256,
            HashAlgorithm::SHA2_384,
            HashAlgorithm::SHA2_512,
            HashAlgorithm::SHA2_224,
            HashAlgorithm::SHA1,
        ])
        .preferred_compression_algorithms(smallvec![
            CompressionAlgorithm::ZLIB,
            CompressionAlgorithm::ZIP,
        ])
        .subkey(
            SubkeyParamsBuilder::default()
                .key_type(PgpKeyType::ECDH(ECCCurve::Curve25519))
                .can_encrypt(true)
                .passphrase(None)
                .build()
                .context("failed to build subkey parameters")?,
        )
        .build()
        .context("failed to build key parameters")?;

    let mut rng = thread_rng();
    let secret = key_params
        .generate(&mut rng)
        .context("failed to generate the key")?
        .sign(&mut rng, || "".into())
        .context("failed to sign secret key")?;
    secret.verify().context("invalid secret key generated")?;

    let public = split_public_key(&secret)?;
    public.verify().context("invalid public key generated")?;
    Ok(KeyPair { public, secret })
}

/// Splits the public certificate off a secret key.
fn split_public_key(secret_key: &SignedSecretKey) -> Result<SignedPublicKey> {
    secret_key.verify()?;
    let public_key = SignedPublicKey {
        primary_key: secret_key.primary_key.public_key(),
        details: secret_key.details.clone(),
        public_subkeys: secret_key
            .secret_subkeys
            .iter()
            .map(|subkey| SignedPublicSubKey {
                key: subkey.key.public_key(),
                signatures: subkey.signatures.clone(),
            })
            .collect(),
    };
    Ok(public_key)
}

fn key_to_bytes(key: &impl pgp::ser::Serialize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    key.to_writer(&mut buf)
        .context("failed to serialize key")?;
    Ok(buf)
}
