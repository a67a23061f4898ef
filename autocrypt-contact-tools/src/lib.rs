//! Email address tools: normalizing and comparing addresses.
//!
//! Autocrypt peer state is keyed by the normalized form of the peer's
//! address, so every lookup and every update must agree on one canonical
//! spelling. Normalization lowercases the whole address and encodes the
//! domain part with IDNA ("punycode"), so that `Test@Bücher.example` and
//! `test@xn--bcher-kva.example` select the same peer.

#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::correctness,
    missing_debug_implementations,
    missing_docs,
    clippy::all,
    clippy::wildcard_imports,
    clippy::needless_borrow,
    clippy::cast_lossless,
    clippy::explicit_iter_loop,
    clippy::explicit_into_iter_loop,
    clippy::cloned_instead_of_copied
)]
#![cfg_attr(not(test), warn(clippy::indexing_slicing))]

use std::fmt;

use anyhow::{bail, Context as _, Result};

/// Returns the canonical form of an email address: trimmed, lowercased,
/// with the domain part encoded to ASCII via IDNA.
///
/// Inputs without `@` are returned lowercased and trimmed, unchanged
/// otherwise. The part after the *last* `@` is treated as the domain, so
/// addresses with a quoted local part containing `@` still normalize
/// correctly.
///
/// Fails if the domain cannot be IDNA-encoded; the error names the
/// offending domain.
pub fn addr_normalize(addr: &str) -> Result<String> {
    let norm = addr.trim().to_lowercase();
    let Some(at_position) = norm.rfind('@') else {
        return Ok(norm);
    };
    let (mailbox, domain) = norm.split_at(at_position);
    let domain = domain.get(1..).unwrap_or_default();
    let domain = idna::domain_to_ascii(domain)
        .ok()
        .with_context(|| format!("cannot IDNA-encode domain {domain:?}"))?;
    Ok(format!("{mailbox}@{domain}"))
}

/// Compares two email addresses, normalizing them beforehand.
///
/// Addresses that cannot be normalized only compare equal to themselves.
pub fn addr_cmp(addr1: &str, addr2: &str) -> bool {
    match (addr_normalize(addr1), addr_normalize(addr2)) {
        (Ok(norm1), Ok(norm2)) => norm1 == norm2,
        _ => addr1.trim().to_lowercase() == addr2.trim().to_lowercase(),
    }
}

/// Represents an email address, right now just the `local@domain` portion.
///
/// # Example
///
/// ```
/// use autocrypt_contact_tools::EmailAddress;
/// let email = match EmailAddress::new("someone@example.com") {
///     Ok(addr) => addr,
///     Err(e) => panic!("Error parsing address, error was {}", e),
/// };
/// assert_eq!(&email.local, "someone");
/// assert_eq!(&email.domain, "example.com");
/// assert_eq!(email.to_string(), "someone@example.com");
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct EmailAddress {
    /// Local part of the email address.
    pub local: String,

    /// Email address domain.
    pub domain: String,
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

impl EmailAddress {
    /// Performs a dead-simple parse of an email address.
    pub fn new(input: &str) -> Result<EmailAddress> {
        if input.is_empty() {
            bail!("empty string is not valid");
        }
        let parts: Vec<&str> = input.rsplitn(2, '@').collect();

        if input
            .chars()
            .any(|c| c.is_whitespace() || c == '<' || c == '>')
        {
            bail!("Email {:?} must not contain whitespaces, '>' or '<'", input);
        }

        match &parts[..] {
            [domain, local] => {
                if local.is_empty() {
                    bail!("empty string is not valid for local part in {:?}", input);
                }
                if domain.is_empty() {
                    bail!("missing domain after '@' in {:?}", input);
                }
                if domain.ends_with('.') {
                    bail!("Domain {domain:?} should not contain the dot in the end");
                }
                Ok(EmailAddress {
                    local: (*local).to_string(),
                    domain: (*domain).to_string(),
                })
            }
            _ => bail!("Email {:?} must contain '@' character", input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addr_normalize() {
        assert_eq!(addr_normalize("Test@Example.com").unwrap(), "test@example.com");
        assert_eq!(addr_normalize(" hello@mail.com ").unwrap(), "hello@mail.com");
        assert_eq!(addr_normalize("Test").unwrap(), "test");
        assert_eq!(addr_normalize("@test").unwrap(), "@test");
    }

    #[test]
    fn test_addr_normalize_idna() {
        assert_eq!(
            addr_normalize("Test@bücher.example").unwrap(),
            "test@xn--bcher-kva.example"
        );
        assert_eq!(
            addr_normalize("test@XN--BCHER-KVA.example").unwrap(),
            "test@xn--bcher-kva.example"
        );
    }

    #[test]
    fn test_addr_normalize_quoted_local_part() {
        // Only the part after the last `@` is the domain.
        assert_eq!(
            addr_normalize("\"a@b\"@example.com").unwrap(),
            "\"a@b\"@example.com"
        );
    }

    #[test]
    fn test_addr_normalize_bad_domain() {
        let err = addr_normalize("test@xn----").unwrap_err();
        assert!(err.to_string().contains("xn----"));
    }

    #[test]
    fn test_addr_cmp() {
        assert!(addr_cmp("AA@example.com", "aa@example.com"));
        assert!(addr_cmp("aa@example.com", " aa@example.com"));
        assert!(!addr_cmp("aa@example.com", "bb@example.com"));
    }

    #[test]
    fn test_parse_email_address() {
        assert_eq!(EmailAddress::new("").is_ok(), false);
        assert_eq!(
            EmailAddress::new("user@domain.tld").unwrap(),
            EmailAddress {
                local: "user".into(),
                domain: "domain.tld".into(),
            }
        );
        assert_eq!(EmailAddress::new("uuu").is_ok(), false);
        assert!(EmailAddress::new("tt.dd@uu").is_ok());
        assert!(EmailAddress::new("u@d").is_ok());
        assert!(EmailAddress::new("u@d.").is_err());
        assert!(EmailAddress::new("u@d.t").is_ok());
        assert_eq!(EmailAddress::new("@d.tt").is_ok(), false);
    }
}
