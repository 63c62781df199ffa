//! Out-of-band reward retry
//!
//! When a reward write fails after the star transition already persisted,
//! the credit is queued here. A background task retries it with exponential
//! backoff. Settlement is idempotent by event key, so a retry that races a
//! late success cannot double-credit.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::game::rewards::{RewardCredit, RewardReceipt, RewardSettlement, Settlement};
use crate::notifications::{NotificationEvent, NotificationKind, NotificationSink};
use crate::types::StarlightError;

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Sending half handed to services
#[derive(Clone)]
pub struct RewardRetryQueue {
    tx: mpsc::UnboundedSender<RewardCredit>,
}

/// Receiving half consumed by `spawn_reward_retry_task`
pub struct RewardRetryReceiver {
    rx: mpsc::UnboundedReceiver<RewardCredit>,
}

pub fn reward_retry_channel() -> (RewardRetryQueue, RewardRetryReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RewardRetryQueue { tx }, RewardRetryReceiver { rx })
}

impl RewardRetryQueue {
    /// Queue a credit. Returns false if the worker has stopped.
    pub fn enqueue(&self, credit: RewardCredit) -> bool {
        let key = credit.event_key();
        let user = credit.user_id.clone();
        match self.tx.send(credit) {
            Ok(()) => {
                info!(user = %user, event = %key, "Reward queued for retry");
                true
            }
            Err(_) => {
                error!(user = %user, event = %key, "Reward retry worker is gone, credit dropped");
                false
            }
        }
    }
}

/// Retry tuning
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given 1-based attempt
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// Drain the retry queue, retrying each credit independently
pub fn spawn_reward_retry_task(
    receiver: RewardRetryReceiver,
    settlement: RewardSettlement,
    sink: Arc<dyn NotificationSink>,
    policy: RetryPolicy,
) -> tokio::task::JoinHandle<()> {
    info!(max_attempts = policy.max_attempts, "Reward retry task started");

    let mut rx = receiver.rx;
    tokio::spawn(async move {
        while let Some(credit) = rx.recv().await {
            let settlement = settlement.clone();
            let sink = sink.clone();
            tokio::spawn(async move {
                retry_credit(credit, &settlement, sink.as_ref(), policy).await;
            });
        }
        info!("Reward retry queue closed");
    })
}

async fn retry_credit(
    credit: RewardCredit,
    settlement: &RewardSettlement,
    sink: &dyn NotificationSink,
    policy: RetryPolicy,
) {
    let key = credit.event_key();

    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.backoff(attempt)).await;

        match settlement.settle(&credit, Utc::now()).await {
            Ok(Settlement::Credited(receipt)) => {
                info!(user = %credit.user_id, event = %key, attempt, "Queued reward credited");
                notify_late_credit(sink, &credit, &receipt);
                return;
            }
            Ok(Settlement::AlreadyCredited) => return,
            Err(StarlightError::NotFound(msg)) => {
                error!(user = %credit.user_id, event = %key, "Dropping queued reward: {}", msg);
                return;
            }
            Err(e) => {
                warn!(user = %credit.user_id, event = %key, attempt, "Reward retry failed: {}", e);
            }
        }
    }

    error!(
        user = %credit.user_id,
        event = %key,
        attempts = policy.max_attempts,
        "Reward retries exhausted, leaving it to reconciliation"
    );
}

/// Tell a player about a credit that landed after their request returned
pub fn notify_late_credit(sink: &dyn NotificationSink, credit: &RewardCredit, receipt: &RewardReceipt) {
    sink.notify(
        &credit.user_id,
        NotificationEvent::new(
            NotificationKind::RewardCredited,
            "Reward credited",
            format!("You received {} experience", receipt.experience),
        )
        .with_data(serde_json::json!({ "starId": credit.star_id, "reward": receipt })),
    );
    if receipt.leveled_up {
        sink.notify(
            &credit.user_id,
            NotificationEvent::new(
                NotificationKind::LevelUp,
                "Level up!",
                format!("You reached level {}", receipt.level),
            )
            .with_data(serde_json::json!({ "level": receipt.level })),
        );
    }
}
