use chrono::{DateTime, Utc};

use crate::models::gamificationmodel::{Badge, BadgeCategory, GamificationRecord, RecordChange};

/// One row of the badge table. `qualifies` is evaluated against the record
/// after the current activity has been applied.
#[derive(Clone, Copy)]
pub struct BadgeRule {
    pub badge_id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub category: BadgeCategory,
    pub qualifies: fn(&GamificationRecord) -> bool,
}

impl BadgeRule {
    fn award(&self, now: DateTime<Utc>) -> Badge {
        Badge {
            badge_id: self.badge_id.to_string(),
            name: self.name.to_string(),
            description: self.description.to_string(),
            icon: self.icon.to_string(),
            earned_at: now,
            category: self.category,
        }
    }
}

fn ten_videos(r: &GamificationRecord) -> bool {
    r.stats.videos_watched >= 10
}

fn fifty_videos(r: &GamificationRecord) -> bool {
    r.stats.videos_watched >= 50
}

fn five_exams(r: &GamificationRecord) -> bool {
    r.stats.exams_completed >= 5
}

fn week_streak(r: &GamificationRecord) -> bool {
    r.current_streak >= 7
}

fn month_streak(r: &GamificationRecord) -> bool {
    r.current_streak >= 30
}

fn level_five(r: &GamificationRecord) -> bool {
    r.current_level >= 5
}

fn level_ten(r: &GamificationRecord) -> bool {
    r.current_level >= 10
}

pub const BADGE_RULES: &[BadgeRule] = &[
    BadgeRule {
        badge_id: "first_10_videos",
        name: "Video Explorer",
        description: "Watched 10 videos",
        icon: "🎬",
        category: BadgeCategory::Learning,
        qualifies: ten_videos,
    },
    BadgeRule {
        badge_id: "video_master",
        name: "Video Master",
        description: "Watched 50 videos",
        icon: "🎥",
        category: BadgeCategory::Learning,
        qualifies: fifty_videos,
    },
    BadgeRule {
        badge_id: "exam_taker",
        name: "Exam Taker",
        description: "Completed 5 exams",
        icon: "📝",
        category: BadgeCategory::Learning,
        qualifies: five_exams,
    },
    BadgeRule {
        badge_id: "week_warrior",
        name: "Week Warrior",
        description: "Kept a 7-day learning streak",
        icon: "🔥",
        category: BadgeCategory::Streak,
        qualifies: week_streak,
    },
    BadgeRule {
        badge_id: "month_master",
        name: "Month Master",
        description: "Kept a 30-day learning streak",
        icon: "🏆",
        category: BadgeCategory::Streak,
        qualifies: month_streak,
    },
    BadgeRule {
        badge_id: "level_5",
        name: "Rising Star",
        description: "Reached level 5",
        icon: "⭐",
        category: BadgeCategory::Achievement,
        qualifies: level_five,
    },
    BadgeRule {
        badge_id: "level_10",
        name: "Scholar",
        description: "Reached level 10",
        icon: "🎓",
        category: BadgeCategory::Achievement,
        qualifies: level_ten,
    },
];

/// Award every badge whose rule holds and which the record does not yet
/// carry. Earned badges are never taken back.
pub fn check_badges(record: &GamificationRecord, now: DateTime<Utc>) -> Vec<RecordChange> {
    BADGE_RULES
        .iter()
        .filter(|rule| !record.has_badge(rule.badge_id) && (rule.qualifies)(record))
        .map(|rule| RecordChange::BadgeAwarded(rule.award(now)))
        .collect()
}

pub fn newly_awarded(changes: &[RecordChange]) -> Vec<Badge> {
    changes
        .iter()
        .filter_map(|c| match c {
            RecordChange::BadgeAwarded(b) => Some(b.clone()),
            _ => None,
        })
        .collect()
}
