//! Reward settlement
//!
//! Credits are keyed by an event key (`discover:<star>` / `claim:<star>`)
//! that is written to the user document in the same compare-and-set write as
//! the counters. Replaying a credit whose key is already recorded changes
//! nothing, which makes out-of-band retries safe.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::db::schemas::{StarDoc, StarRewards, UserDoc};
use crate::game::leveling::{apply_leveling, LevelOutcome};
use crate::store::GameStore;
use crate::types::{Result, StarlightError};

/// Lost compare-and-set races tolerated before giving up
const MAX_WRITE_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardKind {
    Discovery,
    Claim,
}

impl RewardKind {
    pub fn event_key(&self, star_id: &str) -> String {
        match self {
            Self::Discovery => format!("discover:{}", star_id),
            Self::Claim => format!("claim:{}", star_id),
        }
    }
}

/// One credit owed to a user
#[derive(Debug, Clone)]
pub struct RewardCredit {
    pub user_id: String,
    pub star_id: String,
    pub kind: RewardKind,
    pub rewards: StarRewards,
}

impl RewardCredit {
    pub fn discovery(user_id: &str, star_id: &str, rewards: &StarRewards) -> Self {
        Self {
            user_id: user_id.to_string(),
            star_id: star_id.to_string(),
            kind: RewardKind::Discovery,
            rewards: rewards.clone(),
        }
    }

    pub fn claim(user_id: &str, star_id: &str, rewards: &StarRewards) -> Self {
        Self {
            user_id: user_id.to_string(),
            star_id: star_id.to_string(),
            kind: RewardKind::Claim,
            rewards: rewards.clone(),
        }
    }

    pub fn event_key(&self) -> String {
        self.kind.event_key(&self.star_id)
    }
}

/// What a credit changed on the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardReceipt {
    pub experience: u64,
    pub tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_item: Option<String>,
    pub leveled_up: bool,
    pub level: u32,
    pub streak: u32,
}

/// Result of settling a credit against the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Credited(RewardReceipt),
    /// The event key was already recorded
    AlreadyCredited,
}

/// Every credit a persisted star owes: one discovery credit per discoverer
/// and a claim credit for the claimant
pub fn credits_owed(star: &StarDoc) -> Vec<RewardCredit> {
    let star_id = star.id_hex();
    let mut credits: Vec<RewardCredit> = star
        .discoverers
        .iter()
        .map(|user_id| RewardCredit::discovery(user_id, &star_id, &star.rewards))
        .collect();
    if let Some(claimant) = &star.claimed_by {
        credits.push(RewardCredit::claim(claimant, &star_id, &star.rewards));
    }
    credits
}

/// Update the daily discovery streak for a discovery made on `today`
pub fn advance_streak(user: &mut UserDoc, today: NaiveDate) {
    user.streak = match user.last_discovery_on {
        Some(last) if last == today => user.streak.max(1),
        Some(last) if last.succ_opt() == Some(today) => user.streak + 1,
        _ => 1,
    };
    user.last_discovery_on = Some(today);
}

/// Apply a credit to `user` in place. Returns `None` if the event key was
/// already credited.
pub fn apply_credit(user: &mut UserDoc, credit: &RewardCredit, now: DateTime<Utc>) -> Option<RewardReceipt> {
    let key = credit.event_key();
    if user.has_credited(&key) {
        return None;
    }

    let rewards = &credit.rewards;
    let mut tokens = 0;
    let mut special_item = None;

    user.experience = user.experience.saturating_add(rewards.experience);
    match credit.kind {
        RewardKind::Discovery => {
            user.stars_discovered = user.stars_discovered.saturating_add(1);
            advance_streak(user, now.date_naive());
        }
        RewardKind::Claim => {
            tokens = rewards.tokens.unwrap_or(0);
            user.tokens = user.tokens.saturating_add(tokens);
            user.stars_collected = user.stars_collected.saturating_add(1);
            if let Some(item) = &rewards.special_item {
                user.inventory.push(item.clone());
                special_item = Some(item.clone());
            }
        }
    }

    let LevelOutcome { leveled_up, level } = apply_leveling(&mut user.level, &mut user.experience);
    user.credited_events.push(key);

    Some(RewardReceipt {
        experience: rewards.experience,
        tokens,
        special_item,
        leveled_up,
        level,
        streak: user.streak,
    })
}

/// Persists credits with compare-and-set on the user document
#[derive(Clone)]
pub struct RewardSettlement {
    store: Arc<dyn GameStore>,
}

impl RewardSettlement {
    pub fn new(store: Arc<dyn GameStore>) -> Self {
        Self { store }
    }

    /// Credit `credit` exactly once
    pub async fn settle(&self, credit: &RewardCredit, now: DateTime<Utc>) -> Result<Settlement> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut user = self
                .store
                .find_user(&credit.user_id)
                .await?
                .ok_or_else(|| StarlightError::NotFound("User not found".into()))?;

            let receipt = match apply_credit(&mut user, credit, now) {
                Some(receipt) => receipt,
                None => {
                    debug!("Credit {} already applied to {}", credit.event_key(), credit.user_id);
                    return Ok(Settlement::AlreadyCredited);
                }
            };

            match self.store.replace_user(&user).await {
                Ok(_) => {
                    info!(
                        user = %credit.user_id,
                        event = %credit.event_key(),
                        experience = receipt.experience,
                        level = receipt.level,
                        "Reward credited"
                    );
                    return Ok(Settlement::Credited(receipt));
                }
                Err(StarlightError::Conflict(_)) => {
                    debug!("User {} changed during credit (attempt {})", credit.user_id, attempt);
                }
                Err(e) => return Err(e),
            }
        }

        Err(StarlightError::Conflict(
            "User was modified concurrently too many times".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryGameStore;
    use chrono::TimeZone;

    fn rewards(experience: u64, tokens: Option<u64>, item: Option<&str>) -> StarRewards {
        StarRewards {
            experience,
            tokens,
            special_item: item.map(String::from),
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_discovery_credit() {
        let mut user = UserDoc::new("0xabc".into());
        let credit = RewardCredit::discovery("u1", "s1", &rewards(250, Some(9), None));

        let receipt = apply_credit(&mut user, &credit, day(1)).unwrap();
        assert_eq!(receipt.experience, 250);
        assert_eq!(receipt.tokens, 0);
        assert!(receipt.leveled_up);
        assert_eq!(user.level, 2);
        assert_eq!(user.experience, 150);
        assert_eq!(user.stars_discovered, 1);
        assert_eq!(user.tokens, 0);
        assert_eq!(user.streak, 1);
        assert!(user.has_credited("discover:s1"));
    }

    #[test]
    fn test_replayed_credit_is_noop() {
        let mut user = UserDoc::new("0xabc".into());
        let credit = RewardCredit::discovery("u1", "s1", &rewards(40, None, None));

        assert!(apply_credit(&mut user, &credit, day(1)).is_some());
        assert!(apply_credit(&mut user, &credit, day(1)).is_none());
        assert_eq!(user.experience, 40);
        assert_eq!(user.stars_discovered, 1);
    }

    #[test]
    fn test_claim_credit() {
        let mut user = UserDoc::new("0xabc".into());
        let credit = RewardCredit::claim("u1", "s1", &rewards(10, Some(25), Some("comet-shard")));

        let receipt = apply_credit(&mut user, &credit, day(1)).unwrap();
        assert_eq!(receipt.tokens, 25);
        assert_eq!(receipt.special_item.as_deref(), Some("comet-shard"));
        assert_eq!(user.tokens, 25);
        assert_eq!(user.stars_collected, 1);
        assert!(user.has_item("comet-shard"));
        // Claims do not touch the discovery streak
        assert_eq!(user.streak, 0);
    }

    #[test]
    fn test_oversized_rewards_saturate() {
        let mut user = UserDoc::new("0xabc".into());
        user.experience = 10;
        user.tokens = u64::MAX - 5;

        let discovery = RewardCredit::discovery("u1", "s1", &rewards(u64::MAX, None, None));
        let receipt = apply_credit(&mut user, &discovery, day(1)).unwrap();
        assert!(receipt.leveled_up);
        assert!(user.experience < crate::game::leveling::required_experience(user.level));

        let claim = RewardCredit::claim("u1", "s1", &rewards(0, Some(25), None));
        apply_credit(&mut user, &claim, day(1)).unwrap();
        assert_eq!(user.tokens, u64::MAX);
        assert_eq!(user.stars_collected, 1);
    }

    #[test]
    fn test_streak() {
        let mut user = UserDoc::new("0xabc".into());
        let d = |n| day(n).date_naive();

        advance_streak(&mut user, d(1));
        assert_eq!(user.streak, 1);
        advance_streak(&mut user, d(1));
        assert_eq!(user.streak, 1);
        advance_streak(&mut user, d(2));
        assert_eq!(user.streak, 2);
        advance_streak(&mut user, d(3));
        assert_eq!(user.streak, 3);
        advance_streak(&mut user, d(5));
        assert_eq!(user.streak, 1);
    }

    #[test]
    fn test_credits_owed() {
        let mut star = StarDoc::new(
            "Vega".into(),
            crate::db::schemas::Rarity::Rare,
            crate::db::schemas::StarType::Crystal,
            crate::game::GeoPoint::new(1.0, 1.0).unwrap(),
            rewards(60, Some(5), None),
        );
        assert!(credits_owed(&star).is_empty());

        star.discoverers = vec!["alice".into(), "bob".into()];
        star.claimed_by = Some("alice".into());
        let keys: Vec<_> = credits_owed(&star)
            .iter()
            .map(|c| format!("{}@{}", c.event_key(), c.user_id))
            .collect();
        let id = star.id_hex();
        assert_eq!(
            keys,
            vec![
                format!("discover:{}@alice", id),
                format!("discover:{}@bob", id),
                format!("claim:{}@alice", id),
            ]
        );
    }

    #[tokio::test]
    async fn test_settle_is_idempotent() {
        let store = Arc::new(MemoryGameStore::new());
        let user = store.insert_user(UserDoc::new("0xabc".into())).await.unwrap();
        let settlement = RewardSettlement::new(store.clone());
        let credit = RewardCredit::discovery(&user.id_hex(), "s1", &rewards(30, None, None));

        let first = settlement.settle(&credit, day(1)).await.unwrap();
        assert!(matches!(first, Settlement::Credited(_)));
        let second = settlement.settle(&credit, day(1)).await.unwrap();
        assert_eq!(second, Settlement::AlreadyCredited);

        let stored = store.find_user(&user.id_hex()).await.unwrap().unwrap();
        assert_eq!(stored.experience, 30);
        assert_eq!(stored.stars_discovered, 1);
    }

    #[tokio::test]
    async fn test_settle_unknown_user() {
        let store = Arc::new(MemoryGameStore::new());
        let settlement = RewardSettlement::new(store);
        let credit = RewardCredit::claim("missing", "s1", &StarRewards::default());
        let err = settlement.settle(&credit, day(1)).await.unwrap_err();
        assert!(matches!(err, StarlightError::NotFound(_)));
    }
}
