use std::str::FromStr;

use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::service::error::GamificationError;
use crate::services::level::{level_for_xp, xp_to_next_level};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    VideoWatched,
    ExamCompleted,
    CourseCompleted,
    DailyLogin,
    StreakMilestone,
}

impl ActivityType {
    pub fn to_str(&self) -> &str {
        match self {
            ActivityType::VideoWatched => "video_watched",
            ActivityType::ExamCompleted => "exam_completed",
            ActivityType::CourseCompleted => "course_completed",
            ActivityType::DailyLogin => "daily_login",
            ActivityType::StreakMilestone => "streak_milestone",
        }
    }
}

impl FromStr for ActivityType {
    type Err = GamificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video_watched" => Ok(ActivityType::VideoWatched),
            "exam_completed" => Ok(ActivityType::ExamCompleted),
            "course_completed" => Ok(ActivityType::CourseCompleted),
            "daily_login" => Ok(ActivityType::DailyLogin),
            "streak_milestone" => Ok(ActivityType::StreakMilestone),
            other => Err(GamificationError::UnknownActivityType(other.to_string())),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BadgeCategory {
    Learning,
    Streak,
    Achievement,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub badge_id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub earned_at: DateTime<Utc>,
    pub category: BadgeCategory,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub xp_earned: i64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct GamificationStats {
    pub videos_watched: i32,
    pub exams_completed: i32,
    pub courses_completed: i32,
    /// Minutes.
    pub total_study_time: i64,
    pub average_exam_score: f64,
}

/// Counter movement attached to a logged activity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatChange {
    VideoWatched { duration: i64 },
    ExamCompleted { score: f64 },
    CourseCompleted,
}

impl GamificationStats {
    /// Counters saturate; the engine rejects input that would reach the bound.
    pub fn record(&mut self, change: StatChange) {
        match change {
            StatChange::VideoWatched { duration } => {
                self.videos_watched = self.videos_watched.saturating_add(1);
                self.total_study_time = self.total_study_time.saturating_add(duration);
            }
            StatChange::ExamCompleted { score } => {
                self.exams_completed = self.exams_completed.saturating_add(1);
                let n = self.exams_completed as f64;
                self.average_exam_score = (self.average_exam_score * (n - 1.0) + score) / n;
            }
            StatChange::CourseCompleted => {
                self.courses_completed = self.courses_completed.saturating_add(1);
            }
        }
    }
}

/// A single mutation produced by the engine. Records are never edited in
/// place; a change set is applied to a snapshot to produce the next one.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordChange {
    ActivityLogged(Activity),
    StatRecorded(StatChange),
    StreakUpdated {
        current_streak: i32,
        last_activity_date: DateTime<Utc>,
    },
    BadgeAwarded(Badge),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GamificationRecord {
    pub user_id: Uuid,
    #[serde(rename = "totalXP")]
    pub total_xp: i64,
    pub current_level: i32,
    pub xp_to_next_level: i64,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_activity_date: Option<DateTime<Utc>>,
    pub badges: Vec<Badge>,
    pub activities: Vec<Activity>,
    pub stats: GamificationStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Store version used for compare-and-swap saves; 0 means never persisted.
    #[serde(skip)]
    pub version: i64,
}

impl GamificationRecord {
    pub fn new(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            total_xp: 0,
            current_level: level_for_xp(0),
            xp_to_next_level: xp_to_next_level(0),
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            badges: Vec::new(),
            activities: Vec::new(),
            stats: GamificationStats::default(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn has_badge(&self, badge_id: &str) -> bool {
        self.badges.iter().any(|b| b.badge_id == badge_id)
    }

    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }

    /// Produce the next snapshot. Derived fields are re-established here so
    /// every path that persists a record goes through the same invariants.
    pub fn apply(&self, changes: &[RecordChange], now: DateTime<Utc>) -> GamificationRecord {
        let mut next = self.clone();

        for change in changes {
            match change {
                RecordChange::ActivityLogged(activity) => {
                    next.total_xp += activity.xp_earned;
                    next.activities.push(activity.clone());
                }
                RecordChange::StatRecorded(stat) => next.stats.record(*stat),
                RecordChange::StreakUpdated {
                    current_streak,
                    last_activity_date,
                } => {
                    next.current_streak = *current_streak;
                    next.last_activity_date = Some(*last_activity_date);
                }
                RecordChange::BadgeAwarded(badge) => {
                    if !next.has_badge(&badge.badge_id) {
                        next.badges.push(badge.clone());
                    }
                }
            }
        }

        if !changes.is_empty() {
            next.updated_at = now;
        }
        next.normalize();
        next
    }

    pub fn normalize(&mut self) {
        self.current_level = level_for_xp(self.total_xp);
        self.xp_to_next_level = xp_to_next_level(self.total_xp);
        self.longest_streak = self.longest_streak.max(self.current_streak);
    }
}

/// The slice of a record the leaderboard needs, in leaderboard order.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardStanding {
    pub user_id: Uuid,
    #[serde(rename = "totalXP")]
    pub total_xp: i64,
    pub current_streak: i32,
    pub badge_count: i64,
}

impl From<&GamificationRecord> for LeaderboardStanding {
    fn from(record: &GamificationRecord) -> Self {
        Self {
            user_id: record.user_id,
            total_xp: record.total_xp,
            current_streak: record.current_streak,
            badge_count: record.badges.len() as i64,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: Uuid,
    #[serde(rename = "totalXP")]
    pub total_xp: i64,
    pub current_level: i32,
    pub current_streak: i32,
    pub badge_count: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRank {
    pub user_id: Uuid,
    pub rank: i64,
    #[serde(rename = "totalXP")]
    pub total_xp: i64,
    pub current_level: i32,
}
