//! Database schemas for Starlight
//!
//! Defines MongoDB document structures for stars, users and quests.

mod metadata;
mod quest;
mod star;
mod user;

pub use metadata::Metadata;
pub use quest::{QuestDoc, QuestRewards, QUEST_COLLECTION};
pub use star::{
    Rarity, StarConditions, StarDoc, StarRewards, StarStatus, StarType, TimeWindow,
    STAR_COLLECTION,
};
pub use user::{UserDoc, USER_COLLECTION};
