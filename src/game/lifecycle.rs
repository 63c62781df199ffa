//! Star lifecycle
//!
//! ```text
//! hidden ──discover──> discovered ──claim──> claimed
//!    │
//!    └──(expiry passes)──> expired
//! ```
//!
//! The first discoverer moves a hidden star to `discovered` and becomes its
//! primary discoverer. Later discoverers join a discovered star without
//! touching status or the primary discoverer. No transition moves backwards.

use bson::DateTime;

use crate::db::schemas::{StarDoc, StarStatus};
use crate::types::StateError;

/// Result of a successful discover transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverTransition {
    /// Whether the caller became the primary discoverer
    pub is_primary: bool,
}

impl StarDoc {
    fn is_unexpired(&self, now: DateTime) -> bool {
        self.expires_at.map(|exp| exp > now).unwrap_or(true)
    }

    /// A star can be first-discovered only while hidden and unexpired
    pub fn is_discoverable(&self, now: DateTime) -> bool {
        self.status == StarStatus::Hidden && self.is_unexpired(now)
    }

    /// Whether the star still accepts discoverers: either first discovery,
    /// or joining an unexpired star someone already discovered
    pub fn accepts_discoverers(&self, now: DateTime) -> bool {
        self.is_discoverable(now)
            || (self.status == StarStatus::Discovered && self.is_unexpired(now))
    }

    /// Record `user_id` as a discoverer
    pub fn discover(&mut self, user_id: &str, now: DateTime) -> Result<DiscoverTransition, StateError> {
        if !self.accepts_discoverers(now) {
            return Err(StateError::NotDiscoverable);
        }
        if self.has_discoverer(user_id) {
            return Err(StateError::AlreadyDiscovered);
        }

        self.discoverers.push(user_id.to_string());

        if self.primary_discoverer.is_none() {
            self.primary_discoverer = Some(user_id.to_string());
            self.discovered_at = Some(now);
            self.status = StarStatus::Discovered;
            return Ok(DiscoverTransition { is_primary: true });
        }

        Ok(DiscoverTransition { is_primary: false })
    }

    /// Finalize the star for `user_id`
    pub fn claim(&mut self, user_id: &str, now: DateTime) -> Result<(), StateError> {
        if self.status != StarStatus::Discovered {
            return Err(StateError::NotYetDiscovered);
        }
        if !self.has_discoverer(user_id) {
            return Err(StateError::UserHasNotDiscovered);
        }

        self.status = StarStatus::Claimed;
        self.claimed_by = Some(user_id.to_string());
        self.claimed_at = Some(now);
        Ok(())
    }

    /// Move an overdue hidden star to `expired`. Returns true if it changed.
    pub fn expire(&mut self, now: DateTime) -> bool {
        if self.status == StarStatus::Hidden && !self.is_unexpired(now) {
            self.status = StarStatus::Expired;
            return true;
        }
        false
    }
}
