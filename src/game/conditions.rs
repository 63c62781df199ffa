//! Star gating conditions
//!
//! Simple predicates checked before a discovery is accepted.

use chrono::{DateTime, Timelike, Utc};

use crate::db::schemas::{StarConditions, TimeWindow, UserDoc};
use crate::types::StateError;

/// Facts about the request that conditions are checked against
#[derive(Debug, Clone, Default)]
pub struct ConditionContext {
    /// Weather tag reported by the client, if any
    pub weather: Option<String>,
}

impl TimeWindow {
    /// Whether `hour` (0-23) falls inside the window
    pub fn contains_hour(&self, hour: u32) -> bool {
        if self.start_hour == self.end_hour {
            return true;
        }
        if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Check every condition, returning the first one that fails
pub fn check_conditions(
    conditions: &StarConditions,
    user: &UserDoc,
    ctx: &ConditionContext,
    now: DateTime<Utc>,
) -> Result<(), StateError> {
    if let Some(window) = &conditions.time_of_day {
        if !window.contains_hour(now.hour()) {
            return Err(StateError::ConditionsNotMet(format!(
                "only visible between {:02}:00 and {:02}:00 UTC",
                window.start_hour, window.end_hour
            )));
        }
    }

    if !conditions.weather.is_empty() {
        let reported = ctx.weather.as_deref().map(str::to_lowercase);
        let accepted = reported
            .as_deref()
            .map(|w| conditions.weather.iter().any(|c| c.to_lowercase() == w))
            .unwrap_or(false);
        if !accepted {
            return Err(StateError::ConditionsNotMet(format!(
                "requires weather: {}",
                conditions.weather.join(", ")
            )));
        }
    }

    let missing: Vec<&str> = conditions
        .required_items
        .iter()
        .filter(|item| !user.has_item(item))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(StateError::ConditionsNotMet(format!(
            "requires items: {}",
            missing.join(", ")
        )));
    }

    Ok(())
}
