//! Discovery service
//!
//! Orchestrates the geofenced workflow: proximity check, lifecycle
//! transition with compare-and-set persistence, reward settlement and
//! notification. Only the star write is required for success; a failed
//! reward write is queued for retry and reported as `pending`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::db::schemas::{Rarity, StarConditions, StarDoc, StarRewards, StarStatus, StarType, UserDoc};
use crate::game::challenge::{ArPayload, ChallengeDescriptor, ChallengeStore};
use crate::game::conditions::{check_conditions, ConditionContext};
use crate::game::geo::{bounding_box, GeoPoint};
use crate::game::retry::RewardRetryQueue;
use crate::game::rewards::{RewardCredit, RewardReceipt, RewardSettlement, Settlement};
use crate::notifications::{NotificationEvent, NotificationKind, NotificationSink};
use crate::store::GameStore;
use crate::types::{Result, StarlightError, StateError};

/// Players must be this close to discover a star
pub const DISCOVERY_RADIUS_METERS: f64 = 50.0;

/// Players must be this close to start an AR challenge
pub const AR_INTERACTION_RADIUS_METERS: f64 = 10.0;

pub const DEFAULT_NEARBY_RADIUS_METERS: f64 = 1_000.0;
pub const MAX_NEARBY_RADIUS_METERS: f64 = 10_000.0;

/// Lost compare-and-set races tolerated per transition
const MAX_TRANSITION_ATTEMPTS: usize = 3;

// ============================================================================
// Views
// ============================================================================

/// Client-facing star
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StarView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub rarity: Rarity,
    #[serde(rename = "type")]
    pub star_type: StarType,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    pub status: StarStatus,
    pub discoverer_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_discoverer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovered_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
    pub rewards: StarRewards,
    pub conditions: StarConditions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quest_id: Option<String>,
}

impl From<&StarDoc> for StarView {
    fn from(star: &StarDoc) -> Self {
        Self {
            id: star.id_hex(),
            name: star.name.clone(),
            description: star.description.clone(),
            rarity: star.rarity,
            star_type: star.star_type,
            latitude: star.location.latitude,
            longitude: star.location.longitude,
            altitude: star.location.altitude,
            status: star.status,
            discoverer_count: star.discoverers.len(),
            primary_discoverer: star.primary_discoverer.clone(),
            discovered_at: star.discovered_at.map(|t| t.to_chrono()),
            claimed_by: star.claimed_by.clone(),
            claimed_at: star.claimed_at.map(|t| t.to_chrono()),
            rewards: star.rewards.clone(),
            conditions: star.conditions.clone(),
            expires_at: star.expires_at.map(|t| t.to_chrono()),
            quest_id: star.quest_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardStatus {
    Credited,
    Pending,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryOutcome {
    pub star: StarView,
    pub distance: f64,
    pub is_primary_discoverer: bool,
    pub rewards: StarRewards,
    pub reward_status: RewardStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<RewardReceipt>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimOutcome {
    pub star: StarView,
    pub rewards: StarRewards,
    pub reward_status: RewardStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<RewardReceipt>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyStar {
    #[serde(flatten)]
    pub star: StarView,
    pub distance: f64,
    pub is_nearby: bool,
}

// ============================================================================
// AR verification
// ============================================================================

/// Proof submitted when completing a challenge
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArProof {
    #[serde(default)]
    pub proof: String,
    #[serde(default)]
    pub ar_interaction_data: serde_json::Value,
}

/// Validates AR interaction proofs
#[async_trait::async_trait]
pub trait InteractionVerifier: Send + Sync {
    async fn verify(&self, challenge: &ChallengeDescriptor, proof: &ArProof) -> Result<bool>;
}

/// Accepts any non-empty proof
#[derive(Debug, Default)]
pub struct PassThroughVerifier;

#[async_trait::async_trait]
impl InteractionVerifier for PassThroughVerifier {
    async fn verify(&self, _challenge: &ChallengeDescriptor, proof: &ArProof) -> Result<bool> {
        Ok(!proof.proof.trim().is_empty())
    }
}

// ============================================================================
// Service
// ============================================================================

pub struct DiscoveryService {
    store: Arc<dyn GameStore>,
    settlement: RewardSettlement,
    retry: RewardRetryQueue,
    notifications: Arc<dyn NotificationSink>,
    challenges: Arc<ChallengeStore>,
    verifier: Arc<dyn InteractionVerifier>,
}

impl DiscoveryService {
    pub fn new(
        store: Arc<dyn GameStore>,
        retry: RewardRetryQueue,
        notifications: Arc<dyn NotificationSink>,
        challenges: Arc<ChallengeStore>,
        verifier: Arc<dyn InteractionVerifier>,
    ) -> Self {
        Self {
            settlement: RewardSettlement::new(store.clone()),
            store,
            retry,
            notifications,
            challenges,
            verifier,
        }
    }

    async fn load_star(&self, star_id: &str) -> Result<StarDoc> {
        self.store
            .find_star(star_id)
            .await?
            .ok_or_else(|| StarlightError::NotFound("Star not found".into()))
    }

    async fn load_user(&self, user_id: &str) -> Result<UserDoc> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(|| StarlightError::NotFound("User not found".into()))
    }

    /// Discover a star from `position`
    pub async fn discover_star(
        &self,
        user_id: &str,
        star_id: &str,
        position: &GeoPoint,
        ctx: &ConditionContext,
    ) -> Result<DiscoveryOutcome> {
        let now = Utc::now();
        let (star, user) = tokio::try_join!(self.load_star(star_id), self.load_user(user_id))?;

        let distance = position.distance_to(&star.location);
        if distance > DISCOVERY_RADIUS_METERS {
            return Err(StarlightError::TooFar {
                distance,
                radius: DISCOVERY_RADIUS_METERS,
            });
        }

        if star.has_discoverer(user_id) {
            return Err(StateError::AlreadyDiscovered.into());
        }

        check_conditions(&star.conditions, &user, ctx, now)?;

        let (star, is_primary) = self.persist_discover(star, user_id, now).await?;

        info!(
            user = %user_id,
            star = %star_id,
            distance = format!("{:.1}", distance),
            primary = is_primary,
            "Star discovered"
        );

        let credit = RewardCredit::discovery(user_id, star_id, &star.rewards);
        let (reward_status, reward) = self.settle_or_queue(credit, now).await;

        self.notifications.notify(
            user_id,
            NotificationEvent::new(
                NotificationKind::StarDiscovered,
                "Star discovered!",
                if is_primary {
                    format!("You were the first to discover {}", star.name)
                } else {
                    format!("You discovered {}", star.name)
                },
            )
            .with_data(serde_json::json!({ "starId": star_id, "primary": is_primary })),
        );
        if let Some(receipt) = &reward {
            self.notify_level_up(user_id, receipt);
        }

        Ok(DiscoveryOutcome {
            star: StarView::from(&star),
            distance,
            is_primary_discoverer: is_primary,
            rewards: star.rewards.clone(),
            reward_status,
            reward,
        })
    }

    /// Apply the discover transition, reloading on lost races
    async fn persist_discover(
        &self,
        mut star: StarDoc,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(StarDoc, bool)> {
        let now = bson::DateTime::from_chrono(now);

        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let transition = star.discover(user_id, now)?;

            match self.store.replace_star(&star).await {
                Ok(saved) => return Ok((saved, transition.is_primary)),
                Err(StarlightError::Conflict(_)) => {
                    debug!("Discover of {} lost a race (attempt {})", star.id_hex(), attempt);
                    star = self.load_star(&star.id_hex()).await?;
                }
                Err(e) => return Err(e),
            }
        }

        Err(StarlightError::Conflict(
            "Star is busy, please try again".into(),
        ))
    }

    /// Start an AR challenge for a star the caller discovered
    pub async fn start_challenge(
        &self,
        user_id: &str,
        star_id: &str,
        position: &GeoPoint,
    ) -> Result<ChallengeDescriptor> {
        let star = self.load_star(star_id).await?;

        let distance = position.distance_to(&star.location);
        if distance > AR_INTERACTION_RADIUS_METERS {
            return Err(StarlightError::TooFar {
                distance,
                radius: AR_INTERACTION_RADIUS_METERS,
            });
        }
        if !star.has_discoverer(user_id) {
            return Err(StateError::MustDiscoverFirst.into());
        }
        if star.status != StarStatus::Discovered {
            return Err(StateError::NotYetDiscovered.into());
        }

        let challenge = self.challenges.start(
            user_id,
            star_id,
            ArPayload::new(star.rarity, star.star_type),
            Utc::now(),
        );
        debug!(user = %user_id, star = %star_id, challenge = %challenge.id, "Challenge started");
        Ok(challenge)
    }

    /// Complete the caller's active challenge and claim the star
    pub async fn complete_challenge(&self, user_id: &str, star_id: &str, proof: &ArProof) -> Result<ClaimOutcome> {
        let now = Utc::now();
        let challenge = self
            .challenges
            .active(user_id, star_id, now)
            .ok_or(StateError::NoActiveChallenge)?;

        let accepted = self.verifier.verify(&challenge, proof).await.map_err(|e| match e {
            StarlightError::Upstream(_) => e,
            other => StarlightError::Upstream(format!("AR verification failed: {}", other)),
        })?;
        if !accepted {
            return Err(StateError::ProofRejected.into());
        }

        let star = self.load_star(star_id).await?;
        let star = self.persist_claim(star, user_id, now).await?;
        self.challenges.finish(user_id, star_id);

        info!(user = %user_id, star = %star_id, "Star claimed");

        let credit = RewardCredit::claim(user_id, star_id, &star.rewards);
        let (reward_status, reward) = self.settle_or_queue(credit, now).await;

        self.notifications.notify(
            user_id,
            NotificationEvent::new(
                NotificationKind::StarClaimed,
                "Star claimed!",
                format!("{} is yours", star.name),
            )
            .with_data(serde_json::json!({ "starId": star_id })),
        );
        if let Some(receipt) = &reward {
            self.notify_level_up(user_id, receipt);
        }

        Ok(ClaimOutcome {
            star: StarView::from(&star),
            rewards: star.rewards.clone(),
            reward_status,
            reward,
        })
    }

    async fn persist_claim(&self, mut star: StarDoc, user_id: &str, now: DateTime<Utc>) -> Result<StarDoc> {
        let now = bson::DateTime::from_chrono(now);

        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            star.claim(user_id, now)?;

            match self.store.replace_star(&star).await {
                Ok(saved) => return Ok(saved),
                Err(StarlightError::Conflict(_)) => {
                    debug!("Claim of {} lost a race (attempt {})", star.id_hex(), attempt);
                    star = self.load_star(&star.id_hex()).await?;
                }
                Err(e) => return Err(e),
            }
        }

        Err(StarlightError::Conflict(
            "Star is busy, please try again".into(),
        ))
    }

    /// Stars open for discovery around `position`, nearest first
    pub async fn nearby_stars(
        &self,
        user_id: &str,
        position: &GeoPoint,
        radius: Option<f64>,
    ) -> Result<Vec<NearbyStar>> {
        let radius = radius.unwrap_or(DEFAULT_NEARBY_RADIUS_METERS);
        if !radius.is_finite() || radius <= 0.0 {
            return Err(StarlightError::Validation("radius must be a positive number".into()));
        }
        let radius = radius.min(MAX_NEARBY_RADIUS_METERS);
        let now = bson::DateTime::now();

        let candidates = self
            .store
            .stars_in_box(
                &bounding_box(position, radius),
                &[StarStatus::Hidden, StarStatus::Discovered],
            )
            .await?;

        let mut nearby: Vec<NearbyStar> = candidates
            .iter()
            .filter(|star| star.accepts_discoverers(now) && !star.has_discoverer(user_id))
            .filter_map(|star| {
                let distance = position.distance_to(&star.location);
                (distance <= radius).then(|| NearbyStar {
                    star: StarView::from(star),
                    distance,
                    is_nearby: distance <= DISCOVERY_RADIUS_METERS,
                })
            })
            .collect();

        nearby.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(nearby)
    }

    /// Settle a credit now, or queue it when the write fails
    async fn settle_or_queue(
        &self,
        credit: RewardCredit,
        now: DateTime<Utc>,
    ) -> (RewardStatus, Option<RewardReceipt>) {
        match self.settlement.settle(&credit, now).await {
            Ok(Settlement::Credited(receipt)) => (RewardStatus::Credited, Some(receipt)),
            Ok(Settlement::AlreadyCredited) => (RewardStatus::Credited, None),
            Err(e) => {
                warn!(
                    user = %credit.user_id,
                    event = %credit.event_key(),
                    "Reward write failed, queueing retry: {}",
                    e
                );
                self.retry.enqueue(credit);
                (RewardStatus::Pending, None)
            }
        }
    }

    fn notify_level_up(&self, user_id: &str, receipt: &RewardReceipt) {
        if !receipt.leveled_up {
            return;
        }
        self.notifications.notify(
            user_id,
            NotificationEvent::new(
                NotificationKind::LevelUp,
                "Level up!",
                format!("You reached level {}", receipt.level),
            )
            .with_data(serde_json::json!({ "level": receipt.level })),
        );
    }
}
