//! Parse and create [Autocrypt headers](https://autocrypt.org/en/latest/level1.html#the-autocrypt-header).
//!
//! The same value grammar is used for the `Autocrypt` and the
//! `Autocrypt-Gossip` headers.

use std::fmt;
use std::str;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::attribute::{self, Attribute};

/// Errors of the header codec.
///
/// All of these are recoverable for the message-level caller: a header value
/// that fails to parse is treated as if the header were absent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The attribute list itself is malformed.
    #[error(transparent)]
    Attribute(#[from] attribute::Error),

    /// `keydata=` with nothing after the equals sign.
    #[error("Value for keydata can not be empty")]
    EmptyKeyData,

    /// Key data is not valid base64.
    #[error("Could not decode base64")]
    Base64Decode(#[from] base64::DecodeError),

    /// `prefer-encrypt` carries a token other than `mutual`/`nopreference`.
    #[error("{0:?} is not a known encryption preference")]
    UnknownEncryptionPreference(String),

    /// Unknown attribute not starting with `_`; the header must be treated
    /// as invalid (critical-extension rejection).
    #[error("Unexpected attribute {0}")]
    UnexpectedAttribute(String),

    /// No `addr` attribute.
    #[error("Required attribute addr is missing")]
    MissingAddress,

    /// No `keydata` attribute.
    #[error("Required attribute keydata is missing")]
    MissingKeyData,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Possible values for encryption preference.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum EncryptPreference {
    /// The peer wants to encrypt whenever both sides prefer it.
    Mutual,

    /// The peer has not expressed a preference. This is the default.
    #[default]
    NoPreference,
}

impl fmt::Display for EncryptPreference {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EncryptPreference::Mutual => write!(fmt, "mutual"),
            EncryptPreference::NoPreference => write!(fmt, "nopreference"),
        }
    }
}

impl str::FromStr for EncryptPreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mutual" => Ok(EncryptPreference::Mutual),
            "nopreference" => Ok(EncryptPreference::NoPreference),
            other => Err(Error::UnknownEncryptionPreference(other.to_string())),
        }
    }
}

/// A parsed `Autocrypt` or `Autocrypt-Gossip` header value.
///
/// Key data is carried as an opaque OpenPGP blob; interpreting it is the job
/// of the [`PgpEngine`](crate::pgp::PgpEngine) collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aheader {
    /// Address as written in the `addr` attribute, verbatim. Callers
    /// normalize separately for state lookup.
    pub addr: String,

    /// Raw OpenPGP public key material from the `keydata` attribute.
    pub key_data: Vec<u8>,

    /// Value of the `prefer-encrypt` attribute, if any. Must be absent in
    /// gossip headers.
    pub prefer_encrypt: Option<EncryptPreference>,
}

impl Aheader {
    pub fn new(
        addr: impl Into<String>,
        key_data: Vec<u8>,
        prefer_encrypt: Option<EncryptPreference>,
    ) -> Self {
        Aheader {
            addr: addr.into(),
            key_data,
            prefer_encrypt,
        }
    }
}

/// One attribute of a header value, classified in a single pass so that
/// consumers match on a closed set instead of comparing key strings.
enum HeaderAttribute {
    Address(String),
    KeyData(Vec<u8>),
    Preference(EncryptPreference),
    IgnoredExtension,
}

impl HeaderAttribute {
    fn classify(attribute: Attribute) -> Result<Self> {
        match attribute.key.as_str() {
            "addr" => Ok(HeaderAttribute::Address(
                attribute.value.unwrap_or_default(),
            )),
            "prefer-encrypt" => {
                let token = attribute.value.unwrap_or_default();
                Ok(HeaderAttribute::Preference(token.parse()?))
            }
            "keydata" => {
                // base64 is whitespace-tolerant: folded header lines carry
                // space and CRLF inside the value.
                let cleaned: String = attribute
                    .value
                    .unwrap_or_default()
                    .split_whitespace()
                    .collect();
                if cleaned.is_empty() {
                    return Err(Error::EmptyKeyData);
                }
                Ok(HeaderAttribute::KeyData(BASE64.decode(cleaned.as_bytes())?))
            }
            key if key.starts_with('_') => {
                // Unknown attributes starting with an underscore are
                // non-critical and can be safely ignored.
                Ok(HeaderAttribute::IgnoredExtension)
            }
            key => Err(Error::UnexpectedAttribute(key.to_string())),
        }
    }
}

impl str::FromStr for Aheader {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut addr = None;
        let mut key_data = None;
        let mut prefer_encrypt = None;

        for attribute in attribute::parse(s)? {
            match HeaderAttribute::classify(attribute)? {
                HeaderAttribute::Address(value) => addr = Some(value),
                HeaderAttribute::KeyData(value) => key_data = Some(value),
                HeaderAttribute::Preference(value) => prefer_encrypt = Some(value),
                HeaderAttribute::IgnoredExtension => {}
            }
        }

        Ok(Aheader {
            addr: addr.ok_or(Error::MissingAddress)?,
            key_data: key_data.ok_or(Error::MissingKeyData)?,
            prefer_encrypt,
        })
    }
}

impl fmt::Display for Aheader {
    /// Emits the canonical attribute order: `addr`, `keydata`,
    /// `prefer-encrypt`. Round trips are only order-preserving for headers
    /// already in this order.
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let mut attributes = vec![
            Attribute::new("addr", &self.addr),
            Attribute::new("keydata", BASE64.encode(&self.key_data)),
        ];
        if let Some(prefer_encrypt) = self.prefer_encrypt {
            attributes.push(Attribute::new("prefer-encrypt", prefer_encrypt.to_string()));
        }
        write!(fmt, "{}", attribute::format(&attributes))
    }
}
