//! In-memory game store
//!
//! Backs dev mode when MongoDB is unreachable and every test. Each map entry
//! is updated under its DashMap shard lock, which gives the same
//! compare-and-set guarantee the MongoDB store gets from a filtered replace.

use bson::DateTime;
use dashmap::DashMap;
use tracing::debug;

use super::{leaderboard_cmp, GameStore, LeaderboardKind};
use crate::db::schemas::{QuestDoc, StarDoc, StarStatus, UserDoc};
use crate::game::geo::BoundingBox;
use crate::types::{Result, StarlightError};

/// In-memory store with concurrent access
#[derive(Default)]
pub struct MemoryGameStore {
    stars: DashMap<String, StarDoc>,
    users: DashMap<String, UserDoc>,
    /// wallet address -> user id
    wallets: DashMap<String, String>,
    quests: DashMap<String, QuestDoc>,
}

fn ensure_id(id: &mut Option<bson::oid::ObjectId>) -> String {
    id.get_or_insert_with(bson::oid::ObjectId::new).to_hex()
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl GameStore for MemoryGameStore {
    async fn find_star(&self, star_id: &str) -> Result<Option<StarDoc>> {
        Ok(self
            .stars
            .get(star_id)
            .filter(|s| !s.metadata.is_deleted)
            .map(|s| s.clone()))
    }

    async fn insert_star(&self, mut star: StarDoc) -> Result<String> {
        let id = ensure_id(&mut star._id);
        star.metadata.touch();
        if star.metadata.created_at.is_none() {
            star.metadata.created_at = star.metadata.updated_at;
        }
        self.stars.insert(id.clone(), star);
        Ok(id)
    }

    async fn replace_star(&self, star: &StarDoc) -> Result<StarDoc> {
        let id = star.id_hex();
        let mut entry = self
            .stars
            .get_mut(&id)
            .ok_or_else(|| StarlightError::NotFound("Star not found".into()))?;

        if entry.revision != star.revision {
            debug!(
                "Star {} revision conflict (stored {}, expected {})",
                id, entry.revision, star.revision
            );
            return Err(StarlightError::Conflict("Star was modified concurrently".into()));
        }

        let mut updated = star.clone();
        updated.revision += 1;
        updated.metadata.touch();
        *entry = updated.clone();
        Ok(updated)
    }

    async fn stars_in_box(&self, bbox: &BoundingBox, statuses: &[StarStatus]) -> Result<Vec<StarDoc>> {
        Ok(self
            .stars
            .iter()
            .filter(|s| !s.metadata.is_deleted)
            .filter(|s| statuses.contains(&s.status))
            .filter(|s| bbox.contains(&s.location))
            .map(|s| s.clone())
            .collect())
    }

    async fn expire_due_stars(&self, now: DateTime) -> Result<u64> {
        let mut expired = 0;
        for mut entry in self.stars.iter_mut() {
            if entry.expire(now) {
                entry.revision += 1;
                entry.metadata.touch();
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn recently_discovered_stars(&self, since: DateTime, limit: usize) -> Result<Vec<StarDoc>> {
        let mut stars: Vec<StarDoc> = self
            .stars
            .iter()
            .filter(|s| !s.metadata.is_deleted)
            .filter(|s| matches!(s.status, StarStatus::Discovered | StarStatus::Claimed))
            .filter(|s| s.metadata.updated_at.is_some_and(|at| at >= since))
            .map(|s| s.clone())
            .collect();
        stars.sort_by(|a, b| b.metadata.updated_at.cmp(&a.metadata.updated_at));
        stars.truncate(limit);
        Ok(stars)
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserDoc>> {
        Ok(self
            .users
            .get(user_id)
            .filter(|u| !u.metadata.is_deleted)
            .map(|u| u.clone()))
    }

    async fn find_user_by_wallet(&self, wallet_address: &str) -> Result<Option<UserDoc>> {
        let user_id = match self.wallets.get(wallet_address) {
            Some(id) => id.clone(),
            None => return Ok(None),
        };
        self.find_user(&user_id).await
    }

    async fn insert_user(&self, mut user: UserDoc) -> Result<UserDoc> {
        let id = ensure_id(&mut user._id);

        match self.wallets.entry(user.wallet_address.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(StarlightError::Conflict(
                    "An account with this wallet already exists".into(),
                ))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(id.clone());
            }
        }

        user.metadata.touch();
        if user.metadata.created_at.is_none() {
            user.metadata.created_at = user.metadata.updated_at;
        }
        self.users.insert(id, user.clone());
        Ok(user)
    }

    async fn replace_user(&self, user: &UserDoc) -> Result<UserDoc> {
        let id = user.id_hex();
        let mut entry = self
            .users
            .get_mut(&id)
            .ok_or_else(|| StarlightError::NotFound("User not found".into()))?;

        if entry.revision != user.revision {
            return Err(StarlightError::Conflict("User was modified concurrently".into()));
        }

        let mut updated = user.clone();
        updated.revision += 1;
        updated.metadata.touch();
        *entry = updated.clone();
        Ok(updated)
    }

    async fn top_users(&self, kind: LeaderboardKind, limit: usize) -> Result<Vec<UserDoc>> {
        let mut users: Vec<UserDoc> = self
            .users
            .iter()
            .filter(|u| !u.metadata.is_deleted)
            .map(|u| u.clone())
            .collect();
        users.sort_by(|a, b| leaderboard_cmp(kind, a, b));
        users.truncate(limit);
        Ok(users)
    }

    async fn list_quests(&self, active_only: bool) -> Result<Vec<QuestDoc>> {
        let mut quests: Vec<QuestDoc> = self
            .quests
            .iter()
            .filter(|q| !q.metadata.is_deleted)
            .filter(|q| !active_only || q.active)
            .map(|q| q.clone())
            .collect();
        quests.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(quests)
    }

    async fn find_quest(&self, quest_id: &str) -> Result<Option<QuestDoc>> {
        Ok(self
            .quests
            .get(quest_id)
            .filter(|q| !q.metadata.is_deleted)
            .map(|q| q.clone()))
    }

    async fn insert_quest(&self, mut quest: QuestDoc) -> Result<String> {
        let id = ensure_id(&mut quest._id);
        quest.metadata.touch();
        self.quests.insert(id.clone(), quest);
        Ok(id)
    }

    async fn replace_quest(&self, quest: &QuestDoc) -> Result<QuestDoc> {
        let id = quest.id_hex();
        let mut entry = self
            .quests
            .get_mut(&id)
            .ok_or_else(|| StarlightError::NotFound("Quest not found".into()))?;

        if entry.revision != quest.revision {
            return Err(StarlightError::Conflict("Quest was modified concurrently".into()));
        }

        let mut updated = quest.clone();
        updated.revision += 1;
        updated.metadata.touch();
        *entry = updated.clone();
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{Rarity, StarRewards, StarType};
    use crate::game::geo::{bounding_box, GeoPoint};

    fn star_at(lat: f64, lon: f64) -> StarDoc {
        StarDoc::new(
            "Deneb".into(),
            Rarity::Common,
            StarType::Elemental,
            GeoPoint::new(lat, lon).unwrap(),
            StarRewards::default(),
        )
    }

    #[tokio::test]
    async fn test_star_compare_and_set() {
        let store = MemoryGameStore::new();
        let id = store.insert_star(star_at(1.0, 1.0)).await.unwrap();

        let loaded = store.find_star(&id).await.unwrap().unwrap();
        let mut first = loaded.clone();
        first.name = "First".into();
        let saved = store.replace_star(&first).await.unwrap();
        assert_eq!(saved.revision, loaded.revision + 1);

        // A writer holding the stale revision loses
        let mut stale = loaded;
        stale.name = "Stale".into();
        let err = store.replace_star(&stale).await.unwrap_err();
        assert!(matches!(err, StarlightError::Conflict(_)));

        let current = store.find_star(&id).await.unwrap().unwrap();
        assert_eq!(current.name, "First");
    }

    #[tokio::test]
    async fn test_unique_wallet() {
        let store = MemoryGameStore::new();
        store.insert_user(UserDoc::new("0xabc".into())).await.unwrap();
        let err = store
            .insert_user(UserDoc::new("0xabc".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, StarlightError::Conflict(_)));

        let found = store.find_user_by_wallet("0xabc").await.unwrap();
        assert!(found.is_some());
        let everyone = store.top_users(LeaderboardKind::Level, 10).await.unwrap();
        assert_eq!(everyone.len(), 1);
    }

    #[tokio::test]
    async fn test_stars_in_box_filters_status() {
        let store = MemoryGameStore::new();
        store.insert_star(star_at(10.0, 10.0)).await.unwrap();
        let mut claimed = star_at(10.0001, 10.0);
        claimed.status = StarStatus::Claimed;
        store.insert_star(claimed).await.unwrap();
        store.insert_star(star_at(20.0, 20.0)).await.unwrap();

        let center = GeoPoint::new(10.0, 10.0).unwrap();
        let found = store
            .stars_in_box(&bounding_box(&center, 500.0), &[StarStatus::Hidden])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].status, StarStatus::Hidden);
    }

    #[tokio::test]
    async fn test_expire_due_stars() {
        let store = MemoryGameStore::new();
        let mut due = star_at(0.0, 0.0);
        due.expires_at = Some(DateTime::from_millis(1_000));
        let id = store.insert_star(due).await.unwrap();
        store.insert_star(star_at(0.0, 0.0)).await.unwrap();

        let moved = store.expire_due_stars(DateTime::from_millis(2_000)).await.unwrap();
        assert_eq!(moved, 1);

        let star = store.find_star(&id).await.unwrap().unwrap();
        assert_eq!(star.status, StarStatus::Expired);
        assert_eq!(star.revision, 1);
    }

    #[tokio::test]
    async fn test_recently_discovered_stars() {
        let store = MemoryGameStore::new();
        store.insert_star(star_at(0.0, 0.0)).await.unwrap();
        for status in [StarStatus::Discovered, StarStatus::Claimed, StarStatus::Expired] {
            let mut star = star_at(0.0, 0.0);
            star.status = status;
            store.insert_star(star).await.unwrap();
        }

        let recent = store
            .recently_discovered_stars(DateTime::from_millis(0), 10)
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent
            .iter()
            .all(|s| matches!(s.status, StarStatus::Discovered | StarStatus::Claimed)));

        let limited = store
            .recently_discovered_stars(DateTime::from_millis(0), 1)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);

        let future = DateTime::from_millis(DateTime::now().timestamp_millis() + 60_000);
        assert!(store.recently_discovered_stars(future, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_leaderboard_order() {
        let store = MemoryGameStore::new();
        for (wallet, level, exp) in [("a", 2, 10), ("b", 3, 0), ("c", 2, 50)] {
            let mut user = UserDoc::new(wallet.into());
            user.level = level;
            user.experience = exp;
            store.insert_user(user).await.unwrap();
        }

        let top = store.top_users(LeaderboardKind::Level, 2).await.unwrap();
        let wallets: Vec<_> = top.iter().map(|u| u.wallet_address.as_str()).collect();
        assert_eq!(wallets, vec!["b", "c"]);
    }
}
