//! Utilities to help writing tests.
//!
//! This module is only compiled for test runs.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;

use crate::pgp::PgpEngine;

/// Engine double with deterministic key material and a call counter for
/// key generation.
#[derive(Debug, Default)]
pub struct FakeEngine {
    reject_all: bool,
    generated: AtomicUsize,
}

impl FakeEngine {
    /// An engine that deems every key unsuitable for encryption.
    pub fn rejecting() -> Self {
        FakeEngine {
            reject_all: true,
            generated: AtomicUsize::new(0),
        }
    }

    pub fn generated_keys(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }
}

impl PgpEngine for FakeEngine {
    fn is_suitable_for_encryption(&self, _key_data: &[u8]) -> bool {
        !self.reject_all
    }

    fn generate_identity_key(&self, user_id: &str) -> Result<Vec<u8>> {
        self.generated.fetch_add(1, Ordering::SeqCst);
        Ok(format!("secret:{user_id}").into_bytes())
    }

    fn public_key_data(&self, secret_key_data: &[u8]) -> Result<Vec<u8>> {
        let secret = std::str::from_utf8(secret_key_data)?;
        let user_id = secret.strip_prefix("secret:").unwrap_or(secret);
        Ok(format!("public:{user_id}").into_bytes())
    }
}
