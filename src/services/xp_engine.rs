use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::gamificationmodel::{
    Activity, ActivityType, GamificationRecord, GamificationStats, RecordChange, StatChange,
};
use crate::service::error::GamificationError;

/// Optional context supplied by the calling handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityMetadata {
    pub course_id: Option<Uuid>,
    pub exam_id: Option<Uuid>,
    pub video_id: Option<Uuid>,
    /// Minutes watched, for `video_watched`.
    pub duration: Option<i64>,
    /// Percentage score, for `exam_completed`.
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityInput {
    pub activity_type: ActivityType,
    pub xp_amount: i64,
    pub description: String,
    pub metadata: ActivityMetadata,
}

impl ActivityInput {
    pub fn new(activity_type: ActivityType, xp_amount: i64, description: impl Into<String>) -> Self {
        Self {
            activity_type,
            xp_amount,
            description: description.into(),
            metadata: ActivityMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: ActivityMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Changes for one XP-earning activity: the audit entry (which carries the
/// XP) and the counter it moves, if any. Invalid input yields no changes.
pub fn add_xp(
    record: &GamificationRecord,
    input: &ActivityInput,
    now: DateTime<Utc>,
) -> Result<Vec<RecordChange>, GamificationError> {
    if input.xp_amount < 0 {
        return Err(GamificationError::NegativeXp(input.xp_amount));
    }

    if record.total_xp.checked_add(input.xp_amount).is_none() {
        return Err(GamificationError::XpOverflow(record.user_id));
    }

    let stat = stat_change(&record.stats, input)?;

    let mut changes = vec![RecordChange::ActivityLogged(Activity {
        activity_type: input.activity_type,
        xp_earned: input.xp_amount,
        description: input.description.clone(),
        course_id: input.metadata.course_id,
        exam_id: input.metadata.exam_id,
        video_id: input.metadata.video_id,
        timestamp: now,
    })];

    if let Some(stat) = stat {
        changes.push(RecordChange::StatRecorded(stat));
    }

    Ok(changes)
}

fn stat_change(
    stats: &GamificationStats,
    input: &ActivityInput,
) -> Result<Option<StatChange>, GamificationError> {
    let metadata = &input.metadata;

    match input.activity_type {
        ActivityType::VideoWatched => {
            let duration = metadata.duration.unwrap_or(0);
            if duration < 0 {
                return Err(GamificationError::InvalidMetadata(format!(
                    "duration must be non-negative, got {}",
                    duration
                )));
            }
            if stats.total_study_time.checked_add(duration).is_none() {
                return Err(GamificationError::InvalidMetadata(format!(
                    "duration {} would overflow total study time",
                    duration
                )));
            }
            counter_room(stats.videos_watched, "videosWatched")?;
            Ok(Some(StatChange::VideoWatched { duration }))
        }
        ActivityType::ExamCompleted => {
            let score = metadata.score.unwrap_or(0.0);
            if !(0.0..=100.0).contains(&score) {
                return Err(GamificationError::InvalidMetadata(format!(
                    "score must be between 0 and 100, got {}",
                    score
                )));
            }
            counter_room(stats.exams_completed, "examsCompleted")?;
            Ok(Some(StatChange::ExamCompleted { score }))
        }
        ActivityType::CourseCompleted => {
            counter_room(stats.courses_completed, "coursesCompleted")?;
            Ok(Some(StatChange::CourseCompleted))
        }
        ActivityType::DailyLogin | ActivityType::StreakMilestone => Ok(None),
    }
}

fn counter_room(count: i32, name: &str) -> Result<(), GamificationError> {
    match count.checked_add(1) {
        Some(_) => Ok(()),
        None => Err(GamificationError::InvalidMetadata(format!("{} counter is full", name))),
    }
}

/// Total XP carried by the activities in a change set.
pub fn xp_in(changes: &[RecordChange]) -> i64 {
    changes
        .iter()
        .map(|c| match c {
            RecordChange::ActivityLogged(a) => a.xp_earned,
            _ => 0,
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> GamificationRecord {
        GamificationRecord::new(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn video_watched_moves_counters() {
        let now = Utc::now();
        let record = fresh();
        let input = ActivityInput::new(ActivityType::VideoWatched, 10, "Watched intro").with_metadata(
            ActivityMetadata {
                video_id: Some(Uuid::new_v4()),
                duration: Some(12),
                ..Default::default()
            },
        );

        let changes = add_xp(&record, &input, now).unwrap();
        let next = record.apply(&changes, now);

        assert_eq!(next.total_xp, 10);
        assert_eq!(next.stats.videos_watched, 1);
        assert_eq!(next.stats.total_study_time, 12);
        assert_eq!(next.activities[0].activity_type, ActivityType::VideoWatched);
        assert_eq!(next.activities[0].timestamp, now);
    }

    #[test]
    fn exam_completed_updates_running_mean() {
        let now = Utc::now();
        let mut record = fresh();
        for score in [60.0, 90.0] {
            let input = ActivityInput::new(ActivityType::ExamCompleted, 25, "Exam")
                .with_metadata(ActivityMetadata {
                    score: Some(score),
                    ..Default::default()
                });
            let changes = add_xp(&record, &input, now).unwrap();
            record = record.apply(&changes, now);
        }
        assert_eq!(record.stats.exams_completed, 2);
        assert!((record.stats.average_exam_score - 75.0).abs() < 1e-9);
        assert_eq!(record.total_xp, 50);
    }

    #[test]
    fn login_and_milestone_leave_stats_alone() {
        let now = Utc::now();
        let record = fresh();
        for kind in [ActivityType::DailyLogin, ActivityType::StreakMilestone] {
            let changes = add_xp(&record, &ActivityInput::new(kind, 5, "bonus"), now).unwrap();
            assert_eq!(changes.len(), 1);
            assert_eq!(record.apply(&changes, now).stats, record.stats);
        }
    }

    #[test]
    fn negative_xp_is_rejected_without_changes() {
        let record = fresh();
        let input = ActivityInput::new(ActivityType::CourseCompleted, -1, "cheat");
        assert_eq!(
            add_xp(&record, &input, Utc::now()),
            Err(GamificationError::NegativeXp(-1))
        );
    }

    #[test]
    fn bad_metadata_is_rejected() {
        let record = fresh();
        let video = ActivityInput::new(ActivityType::VideoWatched, 1, "v").with_metadata(
            ActivityMetadata {
                duration: Some(-3),
                ..Default::default()
            },
        );
        assert!(matches!(
            add_xp(&record, &video, Utc::now()),
            Err(GamificationError::InvalidMetadata(_))
        ));

        let exam = ActivityInput::new(ActivityType::ExamCompleted, 1, "e").with_metadata(
            ActivityMetadata {
                score: Some(140.0),
                ..Default::default()
            },
        );
        assert!(matches!(
            add_xp(&record, &exam, Utc::now()),
            Err(GamificationError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn overflow_is_rejected() {
        let mut record = fresh();
        record.total_xp = i64::MAX - 1;
        let input = ActivityInput::new(ActivityType::DailyLogin, 5, "login");
        assert!(matches!(
            add_xp(&record, &input, Utc::now()),
            Err(GamificationError::XpOverflow(_))
        ));
    }

    #[test]
    fn study_time_overflow_is_rejected() {
        let now = Utc::now();
        let mut record = fresh();
        let long_video = ActivityInput::new(ActivityType::VideoWatched, 1, "marathon").with_metadata(
            ActivityMetadata {
                duration: Some(i64::MAX / 2 + 1),
                ..Default::default()
            },
        );

        let changes = add_xp(&record, &long_video, now).unwrap();
        record = record.apply(&changes, now);
        assert_eq!(record.stats.total_study_time, i64::MAX / 2 + 1);

        assert!(matches!(
            add_xp(&record, &long_video, now),
            Err(GamificationError::InvalidMetadata(_))
        ));
    }

    #[test]
    fn full_counters_are_rejected() {
        let mut record = fresh();
        record.stats.courses_completed = i32::MAX;
        record.stats.exams_completed = i32::MAX;
        let course = ActivityInput::new(ActivityType::CourseCompleted, 1, "course");
        let exam = ActivityInput::new(ActivityType::ExamCompleted, 1, "exam");
        for input in [course, exam] {
            assert!(matches!(
                add_xp(&record, &input, Utc::now()),
                Err(GamificationError::InvalidMetadata(_))
            ));
        }
    }

    #[test]
    fn total_xp_equals_sum_of_activity_xp() {
        let now = Utc::now();
        let mut record = fresh();
        let amounts = [0, 15, 100, 3, 250, 42];
        for (i, xp) in amounts.iter().enumerate() {
            let kind = if i % 2 == 0 {
                ActivityType::VideoWatched
            } else {
                ActivityType::CourseCompleted
            };
            let changes = add_xp(&record, &ActivityInput::new(kind, *xp, "step"), now).unwrap();
            assert_eq!(xp_in(&changes), *xp);
            record = record.apply(&changes, now);

            let logged: i64 = record.activities.iter().map(|a| a.xp_earned).sum();
            assert_eq!(record.total_xp, logged);
            assert_eq!(
                record.current_level,
                ((record.total_xp as f64 / 100.0).sqrt().floor() as i32) + 1
            );
        }
        assert_eq!(record.total_xp, 410);
    }
}
