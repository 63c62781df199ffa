//! User document schema
//!
//! Players are identified by their lowercase wallet address.

use bson::{doc, oid::ObjectId, Document};
use chrono::NaiveDate;
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Lowercase wallet address
    pub wallet_address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Experience accumulated inside the current level
    #[serde(default)]
    pub experience: u64,

    #[serde(default = "default_level")]
    pub level: u32,

    #[serde(default)]
    pub stars_collected: u64,

    #[serde(default)]
    pub stars_discovered: u64,

    #[serde(default)]
    pub tokens: u64,

    /// Consecutive UTC days with at least one discovery
    #[serde(default)]
    pub streak: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_discovery_on: Option<NaiveDate>,

    /// Item ids held by the player
    #[serde(default)]
    pub inventory: Vec<String>,

    /// Reward event keys already applied to this user
    #[serde(default)]
    pub credited_events: Vec<String>,

    /// Joined quest ids
    #[serde(default)]
    pub quests: Vec<String>,

    /// Incremented on every persisted change (compare-and-set token)
    #[serde(default)]
    pub revision: i64,
}

fn default_level() -> u32 {
    1
}

impl Default for UserDoc {
    fn default() -> Self {
        Self {
            _id: None,
            metadata: Metadata::default(),
            wallet_address: String::new(),
            username: None,
            experience: 0,
            level: default_level(),
            stars_collected: 0,
            stars_discovered: 0,
            tokens: 0,
            streak: 0,
            last_discovery_on: None,
            inventory: Vec::new(),
            credited_events: Vec::new(),
            quests: Vec::new(),
            revision: 0,
        }
    }
}

impl UserDoc {
    /// Create a new level-1 player for a normalized wallet address
    pub fn new(wallet_address: String) -> Self {
        Self {
            _id: Some(ObjectId::new()),
            metadata: Metadata::new(),
            wallet_address,
            ..Default::default()
        }
    }

    /// Hex id, empty if the document has not been assigned one
    pub fn id_hex(&self) -> String {
        self._id.map(|id| id.to_hex()).unwrap_or_default()
    }

    pub fn has_item(&self, item: &str) -> bool {
        self.inventory.iter().any(|i| i == item)
    }

    pub fn has_credited(&self, event_key: &str) -> bool {
        self.credited_events.iter().any(|e| e == event_key)
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on wallet address
            (
                doc! { "wallet_address": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("wallet_address_unique".to_string())
                        .build(),
                ),
            ),
            // Leaderboards
            (
                doc! { "level": -1, "experience": -1 },
                Some(
                    IndexOptions::builder()
                        .name("level_experience_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "stars_discovered": -1 },
                Some(
                    IndexOptions::builder()
                        .name("stars_discovered_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "stars_collected": -1 },
                Some(
                    IndexOptions::builder()
                        .name("stars_collected_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_starts_at_level_one() {
        let user = UserDoc::new("0xabc".into());
        assert_eq!(user.level, 1);
        assert_eq!(user.experience, 0);
        assert_eq!(user.id_hex().len(), 24);
    }

    #[test]
    fn test_missing_level_defaults_to_one() {
        let user: UserDoc = serde_json::from_str(r#"{"wallet_address":"0xabc"}"#).unwrap();
        assert_eq!(user.level, 1);
        assert!(user.credited_events.is_empty());
    }

    #[test]
    fn test_bson_round_trip_keeps_date() {
        let mut user = UserDoc::new("0xabc".into());
        user.last_discovery_on = NaiveDate::from_ymd_opt(2026, 10, 17);
        let doc = bson::to_document(&user).unwrap();
        let back: UserDoc = bson::from_document(doc).unwrap();
        assert_eq!(back.last_discovery_on, user.last_discovery_on);
    }
}
