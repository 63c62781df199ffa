//! MongoDB-backed game store

use bson::{doc, oid::ObjectId, DateTime, Document};
use tracing::{debug, info};

use super::{GameStore, LeaderboardKind};
use crate::db::schemas::{
    QuestDoc, StarDoc, StarStatus, UserDoc, QUEST_COLLECTION, STAR_COLLECTION, USER_COLLECTION,
};
use crate::db::{MongoClient, MongoCollection};
use crate::game::geo::BoundingBox;
use crate::types::{Result, StarlightError};

/// Game store over the `stars`, `users` and `quests` collections
#[derive(Clone)]
pub struct MongoGameStore {
    stars: MongoCollection<StarDoc>,
    users: MongoCollection<UserDoc>,
    quests: MongoCollection<QuestDoc>,
}

impl MongoGameStore {
    /// Open the collections, creating indexes as needed
    pub async fn new(client: &MongoClient) -> Result<Self> {
        let stars = client.collection::<StarDoc>(STAR_COLLECTION).await?;
        let users = client.collection::<UserDoc>(USER_COLLECTION).await?;
        let quests = client.collection::<QuestDoc>(QUEST_COLLECTION).await?;

        info!("Game collections ready in '{}'", client.db_name());

        Ok(Self { stars, users, quests })
    }
}

/// Parse a hex id, treating malformed ids as "no such document"
fn parse_id(id: &str) -> Option<ObjectId> {
    ObjectId::parse_str(id).ok()
}

/// Filter matching a document only at the revision the caller loaded
fn revision_filter(id: Option<ObjectId>, revision: i64) -> Result<Document> {
    let id = id.ok_or_else(|| StarlightError::Internal("Document has no id".into()))?;
    Ok(doc! { "_id": id, "revision": revision })
}

fn is_duplicate_key(err: &StarlightError) -> bool {
    matches!(err, StarlightError::Database(msg) if msg.contains("E11000"))
}

fn box_filter(bbox: &BoundingBox, statuses: &[StarStatus]) -> Document {
    let statuses: Vec<&str> = statuses.iter().map(|s| s.as_str()).collect();

    let mut filter = doc! {
        "status": { "$in": statuses },
        "location.latitude": { "$gte": bbox.min_lat, "$lte": bbox.max_lat },
    };

    if bbox.min_lon <= bbox.max_lon {
        filter.insert(
            "location.longitude",
            doc! { "$gte": bbox.min_lon, "$lte": bbox.max_lon },
        );
    } else {
        // Box crosses the antimeridian
        filter.insert(
            "$or",
            vec![
                doc! { "location.longitude": { "$gte": bbox.min_lon } },
                doc! { "location.longitude": { "$lte": bbox.max_lon } },
            ],
        );
    }

    filter
}

fn leaderboard_sort(kind: LeaderboardKind) -> Document {
    match kind {
        LeaderboardKind::Level => doc! { "level": -1, "experience": -1 },
        LeaderboardKind::Discovered => doc! { "stars_discovered": -1 },
        LeaderboardKind::Collected => doc! { "stars_collected": -1 },
    }
}

#[async_trait::async_trait]
impl GameStore for MongoGameStore {
    async fn find_star(&self, star_id: &str) -> Result<Option<StarDoc>> {
        match parse_id(star_id) {
            Some(id) => self.stars.find_one(doc! { "_id": id }).await,
            None => Ok(None),
        }
    }

    async fn insert_star(&self, star: StarDoc) -> Result<String> {
        let id = self.stars.insert_one(star).await?;
        Ok(id.to_hex())
    }

    async fn replace_star(&self, star: &StarDoc) -> Result<StarDoc> {
        let filter = revision_filter(star._id, star.revision)?;
        let mut updated = star.clone();
        updated.revision += 1;

        if self.stars.replace_one(filter, updated.clone()).await? == 0 {
            debug!("Star {} revision {} is stale", star.id_hex(), star.revision);
            return Err(StarlightError::Conflict("Star was modified concurrently".into()));
        }
        Ok(updated)
    }

    async fn stars_in_box(&self, bbox: &BoundingBox, statuses: &[StarStatus]) -> Result<Vec<StarDoc>> {
        self.stars.find_many(box_filter(bbox, statuses), None, None).await
    }

    async fn expire_due_stars(&self, now: DateTime) -> Result<u64> {
        let result = self
            .stars
            .update_many(
                doc! {
                    "status": StarStatus::Hidden.as_str(),
                    "expires_at": { "$lte": now },
                },
                doc! {
                    "$set": {
                        "status": StarStatus::Expired.as_str(),
                        "metadata.updated_at": now,
                    },
                    "$inc": { "revision": 1_i64 },
                },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn recently_discovered_stars(&self, since: DateTime, limit: usize) -> Result<Vec<StarDoc>> {
        let filter = doc! {
            "status": { "$in": [StarStatus::Discovered.as_str(), StarStatus::Claimed.as_str()] },
            "metadata.updated_at": { "$gte": since },
        };
        self.stars
            .find_many(filter, Some(doc! { "metadata.updated_at": -1 }), Some(limit as i64))
            .await
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserDoc>> {
        match parse_id(user_id) {
            Some(id) => self.users.find_one(doc! { "_id": id }).await,
            None => Ok(None),
        }
    }

    async fn find_user_by_wallet(&self, wallet_address: &str) -> Result<Option<UserDoc>> {
        self.users
            .find_one(doc! { "wallet_address": wallet_address })
            .await
    }

    async fn insert_user(&self, mut user: UserDoc) -> Result<UserDoc> {
        if user._id.is_none() {
            user._id = Some(ObjectId::new());
        }

        match self.users.insert_one(user.clone()).await {
            Ok(_) => Ok(user),
            Err(e) if is_duplicate_key(&e) => Err(StarlightError::Conflict(
                "An account with this wallet already exists".into(),
            )),
            Err(e) => Err(e),
        }
    }

    async fn replace_user(&self, user: &UserDoc) -> Result<UserDoc> {
        let filter = revision_filter(user._id, user.revision)?;
        let mut updated = user.clone();
        updated.revision += 1;

        if self.users.replace_one(filter, updated.clone()).await? == 0 {
            return Err(StarlightError::Conflict("User was modified concurrently".into()));
        }
        Ok(updated)
    }

    async fn top_users(&self, kind: LeaderboardKind, limit: usize) -> Result<Vec<UserDoc>> {
        self.users
            .find_many(doc! {}, Some(leaderboard_sort(kind)), Some(limit as i64))
            .await
    }

    async fn list_quests(&self, active_only: bool) -> Result<Vec<QuestDoc>> {
        let filter = if active_only {
            doc! { "active": true }
        } else {
            doc! {}
        };
        self.quests
            .find_many(filter, Some(doc! { "title": 1 }), None)
            .await
    }

    async fn find_quest(&self, quest_id: &str) -> Result<Option<QuestDoc>> {
        match parse_id(quest_id) {
            Some(id) => self.quests.find_one(doc! { "_id": id }).await,
            None => Ok(None),
        }
    }

    async fn insert_quest(&self, quest: QuestDoc) -> Result<String> {
        let id = self.quests.insert_one(quest).await?;
        Ok(id.to_hex())
    }

    async fn replace_quest(&self, quest: &QuestDoc) -> Result<QuestDoc> {
        let filter = revision_filter(quest._id, quest.revision)?;
        let mut updated = quest.clone();
        updated.revision += 1;

        if self.quests.replace_one(filter, updated.clone()).await? == 0 {
            return Err(StarlightError::Conflict("Quest was modified concurrently".into()));
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_filter_plain() {
        let bbox = BoundingBox {
            min_lat: 1.0,
            max_lat: 2.0,
            min_lon: 3.0,
            max_lon: 4.0,
        };
        let filter = box_filter(&bbox, &[StarStatus::Hidden, StarStatus::Discovered]);
        assert!(filter.contains_key("location.longitude"));
        assert!(!filter.contains_key("$or"));
        let statuses = filter.get_document("status").unwrap().get_array("$in").unwrap();
        assert_eq!(statuses.len(), 2);
    }

    #[test]
    fn test_box_filter_antimeridian() {
        let bbox = BoundingBox {
            min_lat: -1.0,
            max_lat: 1.0,
            min_lon: 179.5,
            max_lon: -179.5,
        };
        let filter = box_filter(&bbox, &[StarStatus::Hidden]);
        assert!(filter.contains_key("$or"));
        assert!(!filter.contains_key("location.longitude"));
    }

    #[test]
    fn test_revision_filter_requires_id() {
        assert!(revision_filter(None, 0).is_err());
        let id = ObjectId::new();
        let filter = revision_filter(Some(id), 7).unwrap();
        assert_eq!(filter.get_i64("revision").unwrap(), 7);
    }

    #[test]
    fn test_duplicate_key_detection() {
        let dup = StarlightError::Database("Insert failed: E11000 duplicate key error".into());
        assert!(is_duplicate_key(&dup));
        assert!(!is_duplicate_key(&StarlightError::Database("timeout".into())));
    }
}
