//! Periodic maintenance
//!
//! One tick expires overdue hidden stars, settles rewards that never landed
//! for recently discovered or claimed stars, and prunes stale challenges and
//! sign-in nonces.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::MAX_RECONCILE_WINDOW_SECS;
use crate::game::{credits_owed, notify_late_credit, RewardSettlement, Settlement};
use crate::server::AppState;
use crate::types::StarlightError;

/// Stars inspected per reconciliation pass
const RECONCILE_BATCH: usize = 500;

/// Counts from one maintenance tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_stars: u64,
    pub reconciled_rewards: usize,
    pub pruned_challenges: usize,
    pub pruned_nonces: usize,
}

/// Run a single maintenance pass
pub async fn run_sweep(state: &AppState) -> SweepReport {
    let now = Utc::now();

    let expired_stars = match state
        .store
        .expire_due_stars(bson::DateTime::from_chrono(now))
        .await
    {
        Ok(count) => count,
        Err(e) => {
            warn!("Star expiry sweep failed: {}", e);
            0
        }
    };

    SweepReport {
        expired_stars,
        reconciled_rewards: reconcile_rewards(state, now).await,
        pruned_challenges: state.challenges.prune(now),
        pruned_nonces: state.nonces.prune(now),
    }
}

/// Settle every credit owed by recently written stars whose event key is
/// missing from the player. Returns how many credits landed.
async fn reconcile_rewards(state: &AppState, now: chrono::DateTime<Utc>) -> usize {
    let window = state.args.reward_reconcile_window_secs.min(MAX_RECONCILE_WINDOW_SECS);
    let since = now - chrono::Duration::seconds(window as i64);

    let stars = match state
        .store
        .recently_discovered_stars(bson::DateTime::from_chrono(since), RECONCILE_BATCH)
        .await
    {
        Ok(stars) => stars,
        Err(e) => {
            warn!("Reward reconciliation query failed: {}", e);
            return 0;
        }
    };

    let settlement = RewardSettlement::new(Arc::clone(&state.store));
    let mut credited = 0;

    for credit in stars.iter().flat_map(credits_owed) {
        match settlement.settle(&credit, now).await {
            Ok(Settlement::Credited(receipt)) => {
                info!(
                    user = %credit.user_id,
                    event = %credit.event_key(),
                    "Reconciled missing reward"
                );
                notify_late_credit(state.notifications.as_ref(), &credit, &receipt);
                credited += 1;
            }
            Ok(Settlement::AlreadyCredited) => {}
            Err(StarlightError::NotFound(_)) => {
                debug!(user = %credit.user_id, "Skipping reward for unknown user");
            }
            Err(e) => {
                warn!(
                    user = %credit.user_id,
                    event = %credit.event_key(),
                    "Reward reconciliation failed: {}",
                    e
                );
            }
        }
    }

    credited
}

/// Spawn a background task that runs the sweep every `interval`
pub fn spawn_maintenance_task(state: Arc<AppState>, interval: Duration) -> tokio::task::JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "Maintenance task started");

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        // The first tick completes immediately
        timer.tick().await;
        loop {
            timer.tick().await;
            let report = run_sweep(&state).await;
            if report.expired_stars > 0 {
                info!(expired = report.expired_stars, "Expired overdue stars");
            }
            if report.reconciled_rewards > 0 {
                info!(rewards = report.reconciled_rewards, "Reconciled missing rewards");
            }
            debug!(
                challenges = report.pruned_challenges,
                nonces = report.pruned_nonces,
                "Maintenance sweep completed"
            );
        }
    })
}
