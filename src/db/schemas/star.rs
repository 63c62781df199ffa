//! Star document schema
//!
//! A star is a collectible anchored to a geographic point. Its status moves
//! through the lifecycle implemented in `game::lifecycle`.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::game::geo::GeoPoint;

/// Collection name for stars
pub const STAR_COLLECTION: &str = "stars";

/// Star rarity, ordered from most to least common
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    #[default]
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StarType {
    #[default]
    Cosmic,
    Elemental,
    Mystical,
    Digital,
    Crystal,
}

/// Star status
///
/// `Available` and `Completed` come from the retired single-discoverer flow.
/// They still deserialize but no transition leads into them.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StarStatus {
    #[default]
    Hidden,
    Discovered,
    Claimed,
    Expired,
    Available,
    Completed,
}

impl StarStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hidden => "hidden",
            Self::Discovered => "discovered",
            Self::Claimed => "claimed",
            Self::Expired => "expired",
            Self::Available => "available",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for StarStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rewards paid out for a star
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StarRewards {
    #[serde(default)]
    pub experience: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_item: Option<String>,
}

/// Window of UTC hours, `[start_hour, end_hour)`, wrapping past midnight
/// when `start_hour > end_hour`
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

/// Optional gating rules evaluated before discovery
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StarConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<TimeWindow>,
    /// Accepted weather tags; empty means any weather
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weather: Vec<String>,
    /// Items the player must hold
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_items: Vec<String>,
}

impl StarConditions {
    pub fn is_empty(&self) -> bool {
        self.time_of_day.is_none() && self.weather.is_empty() && self.required_items.is_empty()
    }
}

/// Star document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct StarDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub rarity: Rarity,

    #[serde(rename = "type", default)]
    pub star_type: StarType,

    pub location: GeoPoint,

    #[serde(default)]
    pub status: StarStatus,

    /// User ids that discovered this star (no duplicates)
    #[serde(default)]
    pub discoverers: Vec<String>,

    /// First user to discover the star; never changes once set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_discoverer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered_at: Option<DateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime>,

    #[serde(default)]
    pub rewards: StarRewards,

    #[serde(default, skip_serializing_if = "StarConditions::is_empty")]
    pub conditions: StarConditions,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quest_id: Option<String>,

    /// Incremented on every persisted change (compare-and-set token)
    #[serde(default)]
    pub revision: i64,
}

impl StarDoc {
    /// Create a new hidden star
    pub fn new(
        name: String,
        rarity: Rarity,
        star_type: StarType,
        location: GeoPoint,
        rewards: StarRewards,
    ) -> Self {
        Self {
            _id: Some(ObjectId::new()),
            metadata: Metadata::new(),
            name,
            rarity,
            star_type,
            location,
            rewards,
            status: StarStatus::Hidden,
            ..Default::default()
        }
    }

    /// Hex id, empty if the document has not been assigned one
    pub fn id_hex(&self) -> String {
        self._id.map(|id| id.to_hex()).unwrap_or_default()
    }

    pub fn has_discoverer(&self, user_id: &str) -> bool {
        self.discoverers.iter().any(|d| d == user_id)
    }
}

impl IntoIndexes for StarDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Nearby queries filter on status and a lat/lon window
            (
                doc! { "status": 1, "location.latitude": 1, "location.longitude": 1 },
                Some(
                    IndexOptions::builder()
                        .name("status_location_index".to_string())
                        .build(),
                ),
            ),
            // Expiry sweep
            (
                doc! { "status": 1, "expires_at": 1 },
                Some(
                    IndexOptions::builder()
                        .name("status_expiry_index".to_string())
                        .build(),
                ),
            ),
            // Reward reconciliation
            (
                doc! { "status": 1, "metadata.updated_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("status_updated_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "quest_id": 1 },
                Some(
                    IndexOptions::builder()
                        .name("quest_id_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for StarDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
