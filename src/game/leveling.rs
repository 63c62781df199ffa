//! Experience and levels
//!
//! Reaching level `n + 1` costs `n × 100` experience; leftover experience
//! carries into the next level.

use serde::Serialize;

/// Experience required to advance from `level`
pub fn required_experience(level: u32) -> u64 {
    level as u64 * 100
}

/// Outcome of applying experience
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelOutcome {
    pub leveled_up: bool,
    pub level: u32,
}

/// Roll `experience` into levels, mutating both in place
pub fn apply_leveling(level: &mut u32, experience: &mut u64) -> LevelOutcome {
    let start = *level;
    let current = (*level).max(1);

    let gained = affordable_levels(current, *experience);
    // cost never exceeds the experience it was bounded by
    *experience -= level_cost(current, gained) as u64;
    *level = current + gained;

    LevelOutcome {
        leveled_up: *level > start,
        level: *level,
    }
}

/// Experience needed to climb `count` levels starting at `level`
fn level_cost(level: u32, count: u32) -> u128 {
    let (level, count) = (level as u128, count as u128);
    100 * (count * level + count * count.saturating_sub(1) / 2)
}

/// Largest number of levels `experience` pays for, starting at `level`
fn affordable_levels(level: u32, experience: u64) -> u32 {
    let budget = experience as u128;
    let headroom = u32::MAX - level;

    // Solve count² / 2 + count (level - ½) = experience / 100, then correct
    // the float estimate against the exact cost
    let b = 2.0 * level as f64 - 1.0;
    let estimate = ((b * b + 8.0 * (experience / 100) as f64).sqrt() - b) / 2.0;
    let mut count = (estimate.max(0.0) as u32).min(headroom);

    while count > 0 && level_cost(level, count) > budget {
        count -= 1;
    }
    while count < headroom && level_cost(level, count + 1) <= budget {
        count += 1;
    }
    count
}
