//! Collect [`Autocrypt-Gossip`](https://autocrypt.org/level1.html#key-gossip)
//! header values from a decrypted message.

use std::collections::BTreeMap;

use log::warn;

use crate::aheader::Aheader;

/// A gossiped key for one third-party address, ready to apply against peer
/// state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipUpdate {
    /// Address the gossiping sender vouches for, verbatim from the header.
    pub from: String,

    /// Effective date of the message carrying the gossip.
    pub effective_date: i64,

    /// Raw OpenPGP public key material.
    pub key_data: Vec<u8>,
}

impl GossipUpdate {
    /// Parses the `Autocrypt-Gossip` header values of one message.
    ///
    /// Malformed values are dropped. A `prefer-encrypt` attribute is not
    /// allowed in gossip and invalidates the value. If several values claim
    /// the same address the message contradicts itself and none of them is
    /// kept; other addresses of the same message are unaffected.
    pub fn collect(raw_headers: &[String], effective_date: i64) -> Vec<GossipUpdate> {
        let mut by_addr: BTreeMap<String, Vec<Aheader>> = BTreeMap::new();
        for raw in raw_headers {
            let header = match raw.parse::<Aheader>() {
                Ok(header) => header,
                Err(err) => {
                    warn!("ignoring malformed gossip header: {err}");
                    continue;
                }
            };
            if header.prefer_encrypt.is_some() {
                warn!(
                    "gossip header for {:?} carries prefer-encrypt, ignoring",
                    header.addr
                );
                continue;
            }
            by_addr.entry(header.addr.clone()).or_default().push(header);
        }
        by_addr
            .into_iter()
            .filter_map(|(addr, mut headers)| {
                if headers.len() != 1 {
                    warn!("multiple gossip headers for {addr:?}, ignoring all of them");
                    return None;
                }
                let header = headers.remove(0);
                Some(GossipUpdate {
                    from: header.addr,
                    effective_date,
                    key_data: header.key_data,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_500_000_000;

    #[test]
    fn test_collect_two_distinct_addresses() {
        let headers = vec![
            "addr=a@b.example; keydata=AAo=".to_string(),
            "addr=c@d.example; keydata=AAo=".to_string(),
        ];
        let updates = GossipUpdate::collect(&headers, T0);
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].from, "a@b.example");
        assert_eq!(updates[0].effective_date, T0);
        assert_eq!(updates[0].key_data, b"\x00\x0a");
        assert_eq!(updates[1].from, "c@d.example");
    }

    #[test]
    fn test_collect_duplicate_address_drops_both() {
        let headers = vec![
            "addr=a@b.example; keydata=AAo=".to_string(),
            "addr=a@b.example; keydata=AAs=".to_string(),
        ];
        assert_eq!(GossipUpdate::collect(&headers, T0), vec![]);
    }

    #[test]
    fn test_collect_duplicate_does_not_affect_others() {
        let headers = vec![
            "addr=a@b.example; keydata=AAo=".to_string(),
            "addr=a@b.example; keydata=AAs=".to_string(),
            "addr=c@d.example; keydata=AAo=".to_string(),
        ];
        let updates = GossipUpdate::collect(&headers, T0);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].from, "c@d.example");
    }

    #[test]
    fn test_collect_skips_malformed() {
        let headers = vec![
            "not a header".to_string(),
            "addr=a@b.example; keydata=AAo=".to_string(),
        ];
        let updates = GossipUpdate::collect(&headers, T0);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].from, "a@b.example");
    }

    #[test]
    fn test_collect_rejects_prefer_encrypt() {
        let headers = vec![
            "addr=a@b.example; keydata=AAo=; prefer-encrypt=mutual".to_string(),
        ];
        assert_eq!(GossipUpdate::collect(&headers, T0), vec![]);
    }

    #[test]
    fn test_rejected_header_does_not_cause_ambiguity() {
        // The dropped value no longer counts towards its address group.
        let headers = vec![
            "addr=a@b.example; keydata=AAo=; prefer-encrypt=mutual".to_string(),
            "addr=a@b.example; keydata=AAs=".to_string(),
        ];
        let updates = GossipUpdate::collect(&headers, T0);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].key_data, b"\x00\x0b");

        // Same for a value with an unrecognized critical attribute.
        let headers = vec![
            "addr=a@b.example; keydata=AAo=; unknown=1".to_string(),
            "addr=a@b.example; keydata=AAs=".to_string(),
        ];
        let updates = GossipUpdate::collect(&headers, T0);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].key_data, b"\x00\x0b");
    }

    #[test]
    fn test_collect_empty() {
        assert_eq!(GossipUpdate::collect(&[], T0), vec![]);
    }
}
