//! Persistence for stars, users and quests
//!
//! `GameStore` is the seam between the game services and storage. Writes of
//! existing documents are compare-and-set on `revision`: a replace succeeds
//! only if the stored revision still equals the revision the caller loaded,
//! and the stored copy comes back with the revision bumped. A lost race is
//! reported as `StarlightError::Conflict` so callers can reload and retry.
//!
//! Two implementations exist: `MongoGameStore` for production and
//! `MemoryGameStore` for dev mode and tests.

pub mod memory;
pub mod mongo;

use bson::DateTime;
use serde::{Deserialize, Serialize};

use crate::db::schemas::{QuestDoc, StarDoc, StarStatus, UserDoc};
use crate::game::geo::BoundingBox;
use crate::types::Result;

pub use memory::MemoryGameStore;
pub use mongo::MongoGameStore;

/// Leaderboard orderings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardKind {
    /// Level, then experience inside the level
    #[default]
    Level,
    /// Stars discovered
    Discovered,
    /// Stars claimed
    Collected,
}

/// Storage collaborator used by every service
#[async_trait::async_trait]
pub trait GameStore: Send + Sync {
    async fn find_star(&self, star_id: &str) -> Result<Option<StarDoc>>;

    /// Insert a new star, returning its hex id
    async fn insert_star(&self, star: StarDoc) -> Result<String>;

    /// Compare-and-set replace of a star loaded at `star.revision`
    async fn replace_star(&self, star: &StarDoc) -> Result<StarDoc>;

    /// Stars whose position falls in `bbox` and whose status is one of `statuses`
    async fn stars_in_box(&self, bbox: &BoundingBox, statuses: &[StarStatus]) -> Result<Vec<StarDoc>>;

    /// Move every overdue hidden star to `expired`, returning how many moved
    async fn expire_due_stars(&self, now: DateTime) -> Result<u64>;

    /// Discovered or claimed stars last written at or after `since`, most
    /// recent first
    async fn recently_discovered_stars(&self, since: DateTime, limit: usize) -> Result<Vec<StarDoc>>;

    async fn find_user(&self, user_id: &str) -> Result<Option<UserDoc>>;

    async fn find_user_by_wallet(&self, wallet_address: &str) -> Result<Option<UserDoc>>;

    /// Insert a new user; `Conflict` if the wallet is already registered
    async fn insert_user(&self, user: UserDoc) -> Result<UserDoc>;

    /// Compare-and-set replace of a user loaded at `user.revision`
    async fn replace_user(&self, user: &UserDoc) -> Result<UserDoc>;

    async fn top_users(&self, kind: LeaderboardKind, limit: usize) -> Result<Vec<UserDoc>>;

    async fn list_quests(&self, active_only: bool) -> Result<Vec<QuestDoc>>;

    async fn find_quest(&self, quest_id: &str) -> Result<Option<QuestDoc>>;

    async fn insert_quest(&self, quest: QuestDoc) -> Result<String>;

    /// Compare-and-set replace of a quest loaded at `quest.revision`
    async fn replace_quest(&self, quest: &QuestDoc) -> Result<QuestDoc>;
}

/// Sort users for a leaderboard, highest first
pub(crate) fn leaderboard_cmp(kind: LeaderboardKind, a: &UserDoc, b: &UserDoc) -> std::cmp::Ordering {
    match kind {
        LeaderboardKind::Level => (b.level, b.experience).cmp(&(a.level, a.experience)),
        LeaderboardKind::Discovered => b.stars_discovered.cmp(&a.stars_discovered),
        LeaderboardKind::Collected => b.stars_collected.cmp(&a.stars_collected),
    }
}
