//! Quest document schema
//!
//! Quests group stars under a shared goal and cap how many players can join.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::types::StateError;

/// Collection name for quests
pub const QUEST_COLLECTION: &str = "quests";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuestRewards {
    #[serde(default)]
    pub experience: u64,
    #[serde(default)]
    pub tokens: u64,
}

/// Quest document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct QuestDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub star_ids: Vec<String>,

    /// None means unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_participants: Option<u32>,

    #[serde(default)]
    pub participants: Vec<String>,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default)]
    pub rewards: QuestRewards,

    #[serde(default)]
    pub revision: i64,
}

fn default_true() -> bool {
    true
}

impl Default for QuestDoc {
    fn default() -> Self {
        Self {
            _id: None,
            metadata: Metadata::default(),
            title: String::new(),
            description: String::new(),
            star_ids: Vec::new(),
            max_participants: None,
            participants: Vec::new(),
            active: true,
            rewards: QuestRewards::default(),
            revision: 0,
        }
    }
}

impl QuestDoc {
    pub fn new(title: String, star_ids: Vec<String>, max_participants: Option<u32>) -> Self {
        Self {
            _id: Some(ObjectId::new()),
            metadata: Metadata::new(),
            title,
            star_ids,
            max_participants,
            ..Default::default()
        }
    }

    pub fn id_hex(&self) -> String {
        self._id.map(|id| id.to_hex()).unwrap_or_default()
    }

    pub fn is_full(&self) -> bool {
        self.max_participants
            .map(|max| self.participants.len() >= max as usize)
            .unwrap_or(false)
    }

    /// Add a participant
    pub fn join(&mut self, user_id: &str) -> Result<(), StateError> {
        if !self.active {
            return Err(StateError::QuestInactive);
        }
        if self.participants.iter().any(|p| p == user_id) {
            return Err(StateError::AlreadyJoined);
        }
        if self.is_full() {
            return Err(StateError::QuestFull);
        }
        self.participants.push(user_id.to_string());
        Ok(())
    }
}

impl IntoIndexes for QuestDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "active": 1 },
            Some(
                IndexOptions::builder()
                    .name("active_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for QuestDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_enforces_capacity() {
        let mut quest = QuestDoc::new("Night sky".into(), vec![], Some(2));

        assert!(quest.join("a").is_ok());
        assert_eq!(quest.join("a"), Err(StateError::AlreadyJoined));
        assert!(quest.join("b").is_ok());
        assert!(quest.is_full());
        assert_eq!(quest.join("c"), Err(StateError::QuestFull));
        assert_eq!(quest.participants, vec!["a", "b"]);
    }

    #[test]
    fn test_unlimited_quest() {
        let mut quest = QuestDoc::new("Open".into(), vec![], None);
        for i in 0..50 {
            quest.join(&format!("user-{}", i)).unwrap();
        }
        assert!(!quest.is_full());
    }

    #[test]
    fn test_inactive_quest() {
        let mut quest = QuestDoc::new("Closed".into(), vec![], None);
        quest.active = false;
        assert_eq!(quest.join("a"), Err(StateError::QuestInactive));
    }
}
