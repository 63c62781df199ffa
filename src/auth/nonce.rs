//! Sign-in nonce store
//!
//! Issues single-use nonces that a wallet must sign to log in. Nonces are
//! kept in memory, keyed by normalized wallet address, and expire after a
//! configurable TTL.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use tracing::debug;

use crate::config::MAX_TTL_SECS;

/// Issued challenge for a wallet login
#[derive(Debug, Clone)]
pub struct IssuedNonce {
    pub nonce: String,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct NonceEntry {
    message: String,
    expires_at: DateTime<Utc>,
}

/// In-memory nonce store
pub struct NonceStore {
    entries: DashMap<String, NonceEntry>,
    ttl: Duration,
}

/// Build the exact message a wallet signs for a nonce
pub fn sign_in_message(wallet_address: &str, nonce: &str) -> String {
    format!(
        "Sign in to Starlight\nWallet: {}\nNonce: {}",
        wallet_address, nonce
    )
}

impl NonceStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64),
        }
    }

    /// Issue a fresh nonce, replacing any outstanding one for the wallet
    pub fn issue(&self, wallet_address: &str, now: DateTime<Utc>) -> IssuedNonce {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        let nonce = hex::encode(bytes);
        let message = sign_in_message(wallet_address, &nonce);
        let expires_at = now + self.ttl;

        self.entries.insert(
            wallet_address.to_string(),
            NonceEntry {
                message: message.clone(),
                expires_at,
            },
        );
        debug!("Issued sign-in nonce for {}", wallet_address);

        IssuedNonce {
            nonce,
            message,
            expires_at,
        }
    }

    /// Consume the outstanding message for a wallet.
    ///
    /// Returns None if no nonce was issued or it has expired. A nonce can be
    /// taken at most once.
    pub fn take(&self, wallet_address: &str, now: DateTime<Utc>) -> Option<String> {
        let (_, entry) = self.entries.remove(wallet_address)?;
        if entry.expires_at <= now {
            return None;
        }
        Some(entry.message)
    }

    /// Drop expired nonces, returning how many were removed
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_take_once() {
        let store = NonceStore::new(300);
        let now = Utc::now();

        let issued = store.issue("0xabc", now);
        assert_eq!(issued.nonce.len(), 32);
        assert!(issued.message.contains(&issued.nonce));

        assert_eq!(store.take("0xabc", now), Some(issued.message));
        assert_eq!(store.take("0xabc", now), None);
    }

    #[test]
    fn test_expired_nonce_rejected() {
        let store = NonceStore::new(60);
        let now = Utc::now();
        store.issue("0xabc", now);

        assert_eq!(store.take("0xabc", now + Duration::seconds(61)), None);
    }

    #[test]
    fn test_reissue_replaces() {
        let store = NonceStore::new(60);
        let now = Utc::now();
        let first = store.issue("0xabc", now);
        let second = store.issue("0xabc", now);

        assert_ne!(first.nonce, second.nonce);
        assert_eq!(store.len(), 1);
        assert_eq!(store.take("0xabc", now), Some(second.message));
    }

    #[test]
    fn test_prune() {
        let store = NonceStore::new(10);
        let now = Utc::now();
        store.issue("a", now);
        store.issue("b", now);

        assert_eq!(store.prune(now + Duration::seconds(5)), 0);
        assert_eq!(store.prune(now + Duration::seconds(11)), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_oversized_ttl_is_clamped() {
        let store = NonceStore::new(u64::MAX);
        let now = Utc::now();
        let issued = store.issue("0xabc", now);
        assert_eq!(issued.expires_at, now + Duration::seconds(MAX_TTL_SECS as i64));
    }
}
