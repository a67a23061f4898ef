//! Encryption recommendations.
//!
//! A [`Decision`] says whether and how strongly to encrypt to one
//! recipient; [`Decision::combine`] folds the per-recipient decisions of a
//! draft into a single message-level decision.

use crate::account::AccountState;
use crate::aheader::EncryptPreference;
use crate::peerstate::PreRecommendation;

/// Whether and how strongly to encrypt.
///
/// The variants are ordered from "hide the encryption UI" to "encrypt by
/// default", but combining decisions follows the lattice in
/// [`Decision::combine`], not this ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Encryption is not possible or the account disabled it.
    Disable,

    /// Encryption is possible but should not be suggested: the only known
    /// key is gossip or stale.
    Discourage,

    /// Encryption is possible and may be offered.
    Available,

    /// Encrypt by default.
    Encrypt,
}

impl Decision {
    /// Combines per-recipient decisions into one message-level decision.
    ///
    /// A single `Disable` disables the whole message; only unanimous
    /// `Encrypt` yields `Encrypt`. A mix of `Encrypt` and `Available`
    /// resolves to `Available`.
    pub fn combine(decisions: impl IntoIterator<Item = Decision>) -> Decision {
        let decisions: Vec<Decision> = decisions.into_iter().collect();
        // Most clients want to hide the encryption UI entirely until
        // recipients have been entered.
        if decisions.is_empty() {
            return Decision::Disable;
        }
        if decisions.contains(&Decision::Disable) {
            return Decision::Disable;
        }
        if decisions
            .iter()
            .all(|decision| *decision == Decision::Encrypt)
        {
            return Decision::Encrypt;
        }
        if decisions.contains(&Decision::Discourage) {
            return Decision::Discourage;
        }
        Decision::Available
    }
}

/// Final per-recipient recommendation: the decision plus the key material to
/// encrypt with if the caller goes ahead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    /// The decision for this recipient.
    pub decision: Decision,

    /// Key to encrypt with, absent for [`Decision::Disable`].
    pub public_key: Option<Vec<u8>>,

    /// The peer's stored encryption preference, if any key is known.
    pub prefer_encrypt: Option<EncryptPreference>,
}

impl Recommendation {
    pub(crate) fn disable() -> Self {
        Recommendation {
            decision: Decision::Disable,
            public_key: None,
            prefer_encrypt: None,
        }
    }

    fn encrypt(pre_recommendation: PreRecommendation) -> Self {
        Recommendation {
            decision: Decision::Encrypt,
            public_key: pre_recommendation.public_key,
            prefer_encrypt: Some(pre_recommendation.prefer_encrypt),
        }
    }

    fn copy_of(pre_recommendation: PreRecommendation) -> Self {
        Recommendation {
            decision: pre_recommendation.decision,
            public_key: pre_recommendation.public_key,
            prefer_encrypt: Some(pre_recommendation.prefer_encrypt),
        }
    }

    /// Derives the final recommendation for one recipient from the account
    /// settings, the reply context and the preliminary recommendation
    /// computed from stored peer state.
    pub fn recommend(
        account_state: &AccountState,
        is_reply_to_encrypted: bool,
        pre_recommendation: PreRecommendation,
    ) -> Recommendation {
        if !account_state.enabled {
            return Recommendation::disable();
        }
        // Replying inside an encrypted thread forces encryption, even over
        // a discouraged (gossip or stale) key.
        if matches!(
            pre_recommendation.decision,
            Decision::Available | Decision::Discourage
        ) && is_reply_to_encrypted
        {
            return Recommendation::encrypt(pre_recommendation);
        }
        if account_state.prefer_encrypt == EncryptPreference::Mutual
            && pre_recommendation.prefer_encrypt == EncryptPreference::Mutual
            && pre_recommendation.decision == Decision::Available
        {
            return Recommendation::encrypt(pre_recommendation);
        }
        Recommendation::copy_of(pre_recommendation)
    }

    /// Combines the recommendations for all recipients of a draft into one
    /// message-level decision.
    pub fn combine<'a>(recommendations: impl IntoIterator<Item = &'a Recommendation>) -> Decision {
        Decision::combine(
            recommendations
                .into_iter()
                .map(|recommendation| recommendation.decision),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(enabled: bool, prefer_encrypt: EncryptPreference) -> AccountState {
        AccountState {
            enabled,
            secret_key: b"secret".to_vec(),
            prefer_encrypt,
        }
    }

    #[test]
    fn test_combine_empty() {
        assert_eq!(Decision::combine([]), Decision::Disable);
    }

    #[test]
    fn test_combine_disable_wins() {
        assert_eq!(
            Decision::combine([Decision::Available, Decision::Discourage, Decision::Disable]),
            Decision::Disable
        );
    }

    #[test]
    fn test_combine_unanimous_encrypt() {
        assert_eq!(
            Decision::combine([Decision::Encrypt, Decision::Encrypt, Decision::Encrypt]),
            Decision::Encrypt
        );
    }

    #[test]
    fn test_combine_encrypt_is_not_sticky() {
        assert_eq!(
            Decision::combine([Decision::Encrypt, Decision::Encrypt, Decision::Available]),
            Decision::Available
        );
    }

    #[test]
    fn test_combine_discourage_beats_available() {
        assert_eq!(
            Decision::combine([Decision::Available, Decision::Discourage, Decision::Encrypt]),
            Decision::Discourage
        );
    }

    #[test]
    fn test_recommend_disabled_account() {
        let pre = PreRecommendation::available(b"key".to_vec(), EncryptPreference::Mutual);
        let recommendation =
            Recommendation::recommend(&account(false, EncryptPreference::Mutual), false, pre);
        assert_eq!(recommendation.decision, Decision::Disable);
        assert_eq!(recommendation.public_key, None);
    }

    #[test]
    fn test_recommend_reply_to_encrypted_promotes() {
        let pre = PreRecommendation::available(b"key".to_vec(), EncryptPreference::NoPreference);
        let recommendation =
            Recommendation::recommend(&account(true, EncryptPreference::NoPreference), true, pre);
        assert_eq!(recommendation.decision, Decision::Encrypt);
        assert_eq!(recommendation.public_key.as_deref(), Some(&b"key"[..]));
    }

    #[test]
    fn test_recommend_reply_promotes_discouraged_key() {
        let pre = PreRecommendation::discourage(b"stale".to_vec());
        let recommendation =
            Recommendation::recommend(&account(true, EncryptPreference::NoPreference), true, pre);
        assert_eq!(recommendation.decision, Decision::Encrypt);
        assert_eq!(recommendation.public_key.as_deref(), Some(&b"stale"[..]));
    }

    #[test]
    fn test_recommend_reply_does_not_promote_disable() {
        let recommendation = Recommendation::recommend(
            &account(true, EncryptPreference::Mutual),
            true,
            PreRecommendation::disable(),
        );
        assert_eq!(recommendation.decision, Decision::Disable);
    }

    #[test]
    fn test_recommend_mutual_preference() {
        let pre = PreRecommendation::available(b"key".to_vec(), EncryptPreference::Mutual);
        let recommendation =
            Recommendation::recommend(&account(true, EncryptPreference::Mutual), false, pre);
        assert_eq!(recommendation.decision, Decision::Encrypt);
    }

    #[test]
    fn test_recommend_mutual_needs_both_sides() {
        let pre = PreRecommendation::available(b"key".to_vec(), EncryptPreference::NoPreference);
        let recommendation =
            Recommendation::recommend(&account(true, EncryptPreference::Mutual), false, pre.clone());
        assert_eq!(recommendation.decision, Decision::Available);

        let recommendation =
            Recommendation::recommend(&account(true, EncryptPreference::NoPreference), false, pre);
        assert_eq!(recommendation.decision, Decision::Available);
    }

    #[test]
    fn test_recommend_mutual_does_not_promote_discouraged() {
        let pre = PreRecommendation::discourage(b"gossip".to_vec());
        let recommendation =
            Recommendation::recommend(&account(true, EncryptPreference::Mutual), false, pre);
        assert_eq!(recommendation.decision, Decision::Discourage);
    }

    #[test]
    fn test_combine_recommendations() {
        let recommendations = vec![
            Recommendation::recommend(
                &account(true, EncryptPreference::NoPreference),
                false,
                PreRecommendation::available(b"a".to_vec(), EncryptPreference::NoPreference),
            ),
            Recommendation::disable(),
        ];
        assert_eq!(Recommendation::combine(&recommendations), Decision::Disable);
    }
}
