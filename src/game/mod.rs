//! Game core
//!
//! Geodesic distance, the star lifecycle, the discovery workflow and reward
//! settlement.

pub mod challenge;
pub mod conditions;
pub mod discovery;
pub mod geo;
pub mod leveling;
pub mod lifecycle;
pub mod quests;
pub mod retry;
pub mod rewards;

pub use challenge::{ArPayload, ChallengeDescriptor, ChallengeStore, InteractionKind};
pub use conditions::{check_conditions, ConditionContext};
pub use discovery::{
    ArProof, ClaimOutcome, DiscoveryOutcome, DiscoveryService, InteractionVerifier, NearbyStar,
    PassThroughVerifier, RewardStatus, StarView, AR_INTERACTION_RADIUS_METERS,
    DISCOVERY_RADIUS_METERS,
};
pub use geo::{bounding_box, distance_meters, BoundingBox, GeoPoint};
pub use leveling::{apply_leveling, required_experience, LevelOutcome};
pub use lifecycle::DiscoverTransition;
pub use quests::{QuestService, QuestView};
pub use retry::{
    notify_late_credit, reward_retry_channel, spawn_reward_retry_task, RetryPolicy, RewardRetryQueue,
    RewardRetryReceiver,
};
pub use rewards::{credits_owed, RewardCredit, RewardKind, RewardReceipt, RewardSettlement, Settlement};
