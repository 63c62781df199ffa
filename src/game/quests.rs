//! Quest participation

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::db::schemas::{QuestDoc, QuestRewards};
use crate::notifications::{NotificationEvent, NotificationKind, NotificationSink};
use crate::store::GameStore;
use crate::types::{Result, StarlightError};

const MAX_WRITE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub star_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_participants: Option<u32>,
    pub participant_count: usize,
    pub active: bool,
    pub rewards: QuestRewards,
}

impl From<&QuestDoc> for QuestView {
    fn from(quest: &QuestDoc) -> Self {
        Self {
            id: quest.id_hex(),
            title: quest.title.clone(),
            description: quest.description.clone(),
            star_ids: quest.star_ids.clone(),
            max_participants: quest.max_participants,
            participant_count: quest.participants.len(),
            active: quest.active,
            rewards: quest.rewards.clone(),
        }
    }
}

pub struct QuestService {
    store: Arc<dyn GameStore>,
    notifications: Arc<dyn NotificationSink>,
}

impl QuestService {
    pub fn new(store: Arc<dyn GameStore>, notifications: Arc<dyn NotificationSink>) -> Self {
        Self { store, notifications }
    }

    pub async fn list(&self, active_only: bool) -> Result<Vec<QuestView>> {
        let quests = self.store.list_quests(active_only).await?;
        Ok(quests.iter().map(QuestView::from).collect())
    }

    pub async fn get(&self, quest_id: &str) -> Result<QuestView> {
        let quest = self.load(quest_id).await?;
        Ok(QuestView::from(&quest))
    }

    async fn load(&self, quest_id: &str) -> Result<QuestDoc> {
        self.store
            .find_quest(quest_id)
            .await?
            .ok_or_else(|| StarlightError::NotFound("Quest not found".into()))
    }

    /// Add the user to a quest, then record the quest on the user
    pub async fn join(&self, user_id: &str, quest_id: &str) -> Result<QuestView> {
        let mut quest = self.load(quest_id).await?;
        let mut joined = None;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            quest.join(user_id)?;
            match self.store.replace_quest(&quest).await {
                Ok(saved) => {
                    joined = Some(saved);
                    break;
                }
                Err(StarlightError::Conflict(_)) => {
                    debug!("Join of quest {} lost a race (attempt {})", quest_id, attempt);
                    quest = self.load(quest_id).await?;
                }
                Err(e) => return Err(e),
            }
        }
        let quest = joined.ok_or_else(|| StarlightError::Conflict("Quest is busy, please try again".into()))?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let mut user = self
                .store
                .find_user(user_id)
                .await?
                .ok_or_else(|| StarlightError::NotFound("User not found".into()))?;
            if user.quests.iter().any(|q| q == quest_id) {
                break;
            }
            user.quests.push(quest_id.to_string());
            match self.store.replace_user(&user).await {
                Ok(_) => break,
                Err(StarlightError::Conflict(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        info!(user = %user_id, quest = %quest_id, "Quest joined");
        self.notifications.notify(
            user_id,
            NotificationEvent::new(
                NotificationKind::QuestJoined,
                "Quest joined",
                format!("You joined {}", quest.title),
            )
            .with_data(serde_json::json!({ "questId": quest_id })),
        );

        Ok(QuestView::from(&quest))
    }
}
