use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::models::gamificationmodel::{ActivityType, GamificationRecord, RecordChange};
use crate::service::error::GamificationError;
use crate::services::xp_engine::{add_xp, ActivityInput};

pub const STREAK_MILESTONE_INTERVAL: i32 = 7;
pub const DEFAULT_STREAK_MILESTONE_XP: i64 = 50;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// How two instants are turned into a day gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayBoundary {
    /// Difference between UTC calendar dates: 23:59 then 00:01 is one day.
    #[default]
    Calendar,
    /// Whole 24h periods elapsed: 23:59 then 00:01 is the same day.
    Elapsed,
}

impl FromStr for DayBoundary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "calendar" => Ok(DayBoundary::Calendar),
            "elapsed" => Ok(DayBoundary::Elapsed),
            other => Err(format!("unknown day boundary '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreakPolicy {
    pub day_boundary: DayBoundary,
    pub milestone_xp: i64,
}

impl Default for StreakPolicy {
    fn default() -> Self {
        Self {
            day_boundary: DayBoundary::Calendar,
            milestone_xp: DEFAULT_STREAK_MILESTONE_XP,
        }
    }
}

pub fn day_gap(last: DateTime<Utc>, now: DateTime<Utc>, boundary: DayBoundary) -> i64 {
    match boundary {
        DayBoundary::Calendar => (now.date_naive() - last.date_naive()).num_days(),
        DayBoundary::Elapsed => (now - last).num_milliseconds().div_euclid(MILLIS_PER_DAY),
    }
}

/// True when `now` falls on the same streak day as the last counted activity.
pub fn is_same_day(record: &GamificationRecord, now: DateTime<Utc>, boundary: DayBoundary) -> bool {
    record
        .last_activity_date
        .map(|last| day_gap(last, now, boundary) <= 0)
        .unwrap_or(false)
}

/// Streak transition for an activity at `now`.
///
/// A gap of zero days (or a clock that went backwards) changes nothing. One
/// day extends the streak, and every multiple of seven adds a
/// `streak_milestone` activity. Longer gaps restart the streak at one.
pub fn update_streak(
    record: &GamificationRecord,
    now: DateTime<Utc>,
    policy: &StreakPolicy,
) -> Result<Vec<RecordChange>, GamificationError> {
    let Some(last) = record.last_activity_date else {
        return Ok(vec![RecordChange::StreakUpdated {
            current_streak: 1,
            last_activity_date: now,
        }]);
    };

    let days = day_gap(last, now, policy.day_boundary);

    if days <= 0 {
        return Ok(Vec::new());
    }

    if days > 1 {
        tracing::debug!(
            "Streak broken for user {} after {} days (was {})",
            record.user_id,
            days,
            record.current_streak
        );
        return Ok(vec![RecordChange::StreakUpdated {
            current_streak: 1,
            last_activity_date: now,
        }]);
    }

    let current_streak = record.current_streak + 1;
    let mut changes = vec![RecordChange::StreakUpdated {
        current_streak,
        last_activity_date: now,
    }];

    if current_streak % STREAK_MILESTONE_INTERVAL == 0 {
        let milestone = ActivityInput::new(
            ActivityType::StreakMilestone,
            policy.milestone_xp,
            format!("{}-day streak milestone", current_streak),
        );
        changes.extend(add_xp(record, &milestone, now)?);
    }

    Ok(changes)
}
