//! AR challenge sessions
//!
//! A challenge is the short-lived AR interaction a discoverer performs before
//! claiming a star. At most one challenge exists per (user, star); starting
//! again replaces it.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

use crate::config::MAX_TTL_SECS;
use crate::db::schemas::{Rarity, StarType};

/// Gesture the client asks the player to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Orbit,
    Trace,
    Rune,
    Tap,
    Resonate,
}

impl From<StarType> for InteractionKind {
    fn from(star_type: StarType) -> Self {
        match star_type {
            StarType::Cosmic => Self::Orbit,
            StarType::Elemental => Self::Trace,
            StarType::Mystical => Self::Rune,
            StarType::Digital => Self::Tap,
            StarType::Crystal => Self::Resonate,
        }
    }
}

/// Difficulty 1 (common) through 5 (legendary)
pub fn difficulty_for(rarity: Rarity) -> u8 {
    match rarity {
        Rarity::Common => 1,
        Rarity::Uncommon => 2,
        Rarity::Rare => 3,
        Rarity::Epic => 4,
        Rarity::Legendary => 5,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArPayload {
    pub rarity: Rarity,
    pub star_type: StarType,
    pub interaction: InteractionKind,
    pub difficulty: u8,
}

impl ArPayload {
    pub fn new(rarity: Rarity, star_type: StarType) -> Self {
        Self {
            rarity,
            star_type,
            interaction: star_type.into(),
            difficulty: difficulty_for(rarity),
        }
    }
}

/// Active challenge handed to the client
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeDescriptor {
    pub id: String,
    pub star_id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub ar_payload: ArPayload,
}

impl ChallengeDescriptor {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// In-memory challenge sessions keyed by (user, star)
pub struct ChallengeStore {
    ttl: Duration,
    active: DashMap<(String, String), ChallengeDescriptor>,
}

impl ChallengeStore {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64),
            active: DashMap::new(),
        }
    }

    /// Start (or restart) a challenge
    pub fn start(&self, user_id: &str, star_id: &str, payload: ArPayload, now: DateTime<Utc>) -> ChallengeDescriptor {
        let descriptor = ChallengeDescriptor {
            id: Uuid::new_v4().to_string(),
            star_id: star_id.to_string(),
            user_id: user_id.to_string(),
            started_at: now,
            expires_at: now + self.ttl,
            ar_payload: payload,
        };
        self.active
            .insert((user_id.to_string(), star_id.to_string()), descriptor.clone());
        descriptor
    }

    /// The unexpired challenge for (user, star), if any
    pub fn active(&self, user_id: &str, star_id: &str, now: DateTime<Utc>) -> Option<ChallengeDescriptor> {
        self.active
            .get(&(user_id.to_string(), star_id.to_string()))
            .filter(|c| !c.is_expired(now))
            .map(|c| c.clone())
    }

    pub fn finish(&self, user_id: &str, star_id: &str) {
        self.active.remove(&(user_id.to_string(), star_id.to_string()));
    }

    /// Drop expired challenges, returning how many were removed
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let before = self.active.len();
        self.active.retain(|_, c| !c.is_expired(now));
        before - self.active.len()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> ArPayload {
        ArPayload::new(Rarity::Epic, StarType::Crystal)
    }

    #[test]
    fn test_payload_derivation() {
        let p = payload();
        assert_eq!(p.interaction, InteractionKind::Resonate);
        assert_eq!(p.difficulty, 4);
        assert_eq!(difficulty_for(Rarity::Common), 1);
        assert_eq!(difficulty_for(Rarity::Legendary), 5);
    }

    #[test]
    fn test_restart_replaces() {
        let store = ChallengeStore::new(300);
        let now = Utc::now();
        let first = store.start("alice", "s1", payload(), now);
        let second = store.start("alice", "s1", payload(), now);

        assert_ne!(first.id, second.id);
        assert_eq!(store.len(), 1);
        assert_eq!(store.active("alice", "s1", now).map(|c| c.id), Some(second.id));
    }

    #[test]
    fn test_expiry_and_prune() {
        let store = ChallengeStore::new(300);
        let now = Utc::now();
        store.start("alice", "s1", payload(), now);
        store.start("bob", "s1", payload(), now + Duration::seconds(200));

        let later = now + Duration::seconds(301);
        assert!(store.active("alice", "s1", later).is_none());
        assert!(store.active("bob", "s1", later).is_some());

        assert_eq!(store.prune(later), 1);
        assert_eq!(store.len(), 1);

        store.finish("bob", "s1");
        assert!(store.is_empty());
    }

    #[test]
    fn test_oversized_ttl_is_clamped() {
        let store = ChallengeStore::new(u64::MAX);
        let now = Utc::now();
        let challenge = store.start("alice", "s1", payload(), now);
        assert_eq!(challenge.expires_at, now + Duration::seconds(MAX_TTL_SECS as i64));
    }
}
