// service/gamification_service.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::gamificationdb::GamificationRepository,
    models::gamificationmodel::{
        Activity, ActivityType, Badge, GamificationRecord, LeaderboardEntry, RecordChange,
        UserRank,
    },
    service::{
        error::{GamificationError, ServiceError},
        user_locks::UserLocks,
    },
    services::{
        badge_evaluator::{check_badges, newly_awarded},
        leaderboard::{rank_from_count, to_entries, DEFAULT_LEADERBOARD_LIMIT, MAX_LEADERBOARD_LIMIT},
        streak_tracker::{is_same_day, update_streak, StreakPolicy},
        xp_engine::{add_xp, xp_in, ActivityInput},
    },
};

pub const DEFAULT_DAILY_LOGIN_XP: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GamificationSettings {
    pub streak: StreakPolicy,
    pub daily_login_xp: i64,
}

impl Default for GamificationSettings {
    fn default() -> Self {
        Self {
            streak: StreakPolicy::default(),
            daily_login_xp: DEFAULT_DAILY_LOGIN_XP,
        }
    }
}

/// Result of one persisted update.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityOutcome {
    pub gamification: GamificationRecord,
    pub xp_awarded: i64,
    pub new_badges: Vec<Badge>,
    pub leveled_up: bool,
    pub streak_changed: bool,
}

impl ActivityOutcome {
    fn unchanged(record: GamificationRecord) -> Self {
        Self {
            gamification: record,
            xp_awarded: 0,
            new_badges: Vec::new(),
            leveled_up: false,
            streak_changed: false,
        }
    }

    fn new(before: &GamificationRecord, saved: GamificationRecord, changes: &[RecordChange]) -> Self {
        Self {
            xp_awarded: xp_in(changes),
            new_badges: newly_awarded(changes),
            leveled_up: saved.current_level > before.current_level,
            streak_changed: saved.current_streak != before.current_streak,
            gamification: saved,
        }
    }
}

pub struct GamificationService {
    repo: Arc<dyn GamificationRepository>,
    locks: UserLocks,
    settings: GamificationSettings,
}

impl std::fmt::Debug for GamificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GamificationService")
            .field("repo", &"dyn GamificationRepository")
            .field("settings", &self.settings)
            .finish()
    }
}

impl GamificationService {
    pub fn new(repo: Arc<dyn GamificationRepository>, settings: GamificationSettings) -> Self {
        Self {
            repo,
            locks: UserLocks::new(),
            settings,
        }
    }

    /// Entry point for course, exam and video completion handlers.
    pub async fn record_activity(
        &self,
        user_id: Uuid,
        input: ActivityInput,
    ) -> Result<ActivityOutcome, ServiceError> {
        self.record_activity_at(user_id, input, Utc::now()).await
    }

    pub async fn record_activity_at(
        &self,
        user_id: Uuid,
        input: ActivityInput,
        now: DateTime<Utc>,
    ) -> Result<ActivityOutcome, ServiceError> {
        let _guard = self.locks.acquire(user_id).await;

        let before = self.load_or_create(user_id, now).await?;
        let initial = add_xp(&before, &input, now)?;
        let (after, changes) = self.follow_up(&before, initial, now)?;

        tracing::debug!(
            "User {} logged {} for {} XP",
            user_id,
            input.activity_type.to_str(),
            input.xp_amount
        );

        self.commit(before, after, changes).await
    }

    /// Daily login reward, granted once per streak day.
    pub async fn check_in(&self, user_id: Uuid) -> Result<ActivityOutcome, ServiceError> {
        self.check_in_at(user_id, Utc::now()).await
    }

    pub async fn check_in_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ActivityOutcome, ServiceError> {
        let _guard = self.locks.acquire(user_id).await;

        let before = self.load_or_create(user_id, now).await?;
        if is_same_day(&before, now, self.settings.streak.day_boundary) {
            tracing::debug!("User {} already active today, check-in skipped", user_id);
            return Ok(ActivityOutcome::unchanged(before));
        }

        let login = ActivityInput::new(ActivityType::DailyLogin, self.settings.daily_login_xp, "Daily login");
        let initial = add_xp(&before, &login, now)?;
        let (after, changes) = self.follow_up(&before, initial, now)?;

        self.commit(before, after, changes).await
    }

    /// Records are only created by XP-earning events; unknown users are not found.
    pub async fn update_streak(&self, user_id: Uuid) -> Result<ActivityOutcome, ServiceError> {
        self.update_streak_at(user_id, Utc::now()).await
    }

    pub async fn update_streak_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ActivityOutcome, ServiceError> {
        let _guard = self.locks.acquire(user_id).await;

        let before = self
            .repo
            .load(user_id)
            .await?
            .ok_or(ServiceError::RecordNotFound(user_id))?;
        let (after, changes) = self.follow_up(&before, Vec::new(), now)?;

        self.commit(before, after, changes).await
    }

    /// Re-run the badge table and persist anything new.
    pub async fn check_badges(&self, user_id: Uuid) -> Result<Vec<Badge>, ServiceError> {
        self.check_badges_at(user_id, Utc::now()).await
    }

    pub async fn check_badges_at(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Badge>, ServiceError> {
        let _guard = self.locks.acquire(user_id).await;

        let Some(before) = self.repo.load(user_id).await? else {
            return Ok(Vec::new());
        };

        let changes = check_badges(&before, now);
        if changes.is_empty() {
            return Ok(Vec::new());
        }

        let after = before.apply(&changes, now);
        let outcome = self.commit(before, after, changes).await?;
        Ok(outcome.new_badges)
    }

    /// Stored record, or an unsaved level-1 view for users with no activity yet.
    pub async fn get_record(&self, user_id: Uuid) -> Result<GamificationRecord, ServiceError> {
        self.load_or_create(user_id, Utc::now()).await
    }

    pub async fn get_badges(&self, user_id: Uuid) -> Result<Vec<Badge>, ServiceError> {
        Ok(self.get_record(user_id).await?.badges)
    }

    /// Most recent first.
    pub async fn get_recent_activities(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Activity>, ServiceError> {
        let record = self.get_record(user_id).await?;
        Ok(record.activities.into_iter().rev().take(limit).collect())
    }

    pub async fn get_leaderboard(&self, limit: Option<usize>) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        let limit = limit
            .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
            .clamp(1, MAX_LEADERBOARD_LIMIT);

        let standings = self.repo.leaderboard(limit).await?;
        Ok(to_entries(&standings))
    }

    pub async fn get_user_rank(&self, user_id: Uuid) -> Result<UserRank, ServiceError> {
        let record = self
            .repo
            .load(user_id)
            .await?
            .ok_or(ServiceError::RecordNotFound(user_id))?;

        let ahead = self.repo.count_with_more_xp(record.total_xp).await?;

        Ok(UserRank {
            user_id,
            rank: rank_from_count(ahead),
            total_xp: record.total_xp,
            current_level: record.current_level,
        })
    }

    async fn load_or_create(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<GamificationRecord, ServiceError> {
        Ok(self
            .repo
            .load(user_id)
            .await?
            .unwrap_or_else(|| GamificationRecord::new(user_id, now)))
    }

    /// Apply `initial`, then the streak transition, then the badge table,
    /// each stage seeing the record the previous one produced.
    fn follow_up(
        &self,
        snapshot: &GamificationRecord,
        initial: Vec<RecordChange>,
        now: DateTime<Utc>,
    ) -> Result<(GamificationRecord, Vec<RecordChange>), GamificationError> {
        let mut changes = initial;
        let record = snapshot.apply(&changes, now);

        let streak = update_streak(&record, now, &self.settings.streak)?;
        let record = record.apply(&streak, now);
        changes.extend(streak);

        let badges = check_badges(&record, now);
        let record = record.apply(&badges, now);
        changes.extend(badges);

        Ok((record, changes))
    }

    async fn commit(
        &self,
        before: GamificationRecord,
        after: GamificationRecord,
        changes: Vec<RecordChange>,
    ) -> Result<ActivityOutcome, ServiceError> {
        if changes.is_empty() {
            return Ok(ActivityOutcome::unchanged(before));
        }

        let saved = self.repo.save(&after).await.map_err(|e| {
            tracing::warn!("⚠️ Save failed for user {}: {}", after.user_id, e);
            ServiceError::from(e)
        })?;

        if !before.is_persisted() {
            tracing::info!("✅ Created gamification record for user {}", saved.user_id);
        }

        let outcome = ActivityOutcome::new(&before, saved, &changes);

        if outcome.leveled_up {
            tracing::info!(
                "🎉 User {} reached level {}",
                outcome.gamification.user_id,
                outcome.gamification.current_level
            );
        }
        for badge in &outcome.new_badges {
            tracing::info!("🏅 User {} earned badge {}", outcome.gamification.user_id, badge.badge_id);
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        gamificationdb::RepositoryError,
        memorydb::InMemoryStore,
    };
    use crate::models::gamificationmodel::LeaderboardStanding;
    use crate::services::xp_engine::ActivityMetadata;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    fn service() -> (Arc<InMemoryStore>, GamificationService) {
        let store = Arc::new(InMemoryStore::new());
        let svc = GamificationService::new(store.clone(), GamificationSettings::default());
        (store, svc)
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, d, 12, 0, 0).unwrap()
    }

    fn video(xp: i64) -> ActivityInput {
        ActivityInput::new(ActivityType::VideoWatched, xp, "Watched lesson").with_metadata(
            ActivityMetadata {
                video_id: Some(Uuid::new_v4()),
                duration: Some(8),
                ..Default::default()
            },
        )
    }

    async fn seed(store: &InMemoryStore, mut record: GamificationRecord) -> GamificationRecord {
        record.normalize();
        store.save(&record).await.unwrap()
    }

    #[tokio::test]
    async fn first_activity_creates_record() {
        let (store, svc) = service();
        let user = Uuid::new_v4();

        let outcome = svc.record_activity_at(user, video(30), day(1)).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(outcome.xp_awarded, 30);
        assert_eq!(outcome.gamification.total_xp, 30);
        assert_eq!(outcome.gamification.current_streak, 1);
        assert_eq!(outcome.gamification.stats.videos_watched, 1);
        assert_eq!(outcome.gamification.stats.total_study_time, 8);
        assert!(outcome.streak_changed);
        assert!(!outcome.leveled_up);
    }

    #[tokio::test]
    async fn tenth_video_awards_badge_once() {
        let (store, svc) = service();
        let user = Uuid::new_v4();
        let mut record = GamificationRecord::new(user, day(1));
        record.stats.videos_watched = 9;
        record.current_streak = 1;
        record.last_activity_date = Some(day(1));
        seed(&store, record).await;

        let outcome = svc.record_activity_at(user, video(10), day(1)).await.unwrap();
        let ids: Vec<_> = outcome.new_badges.iter().map(|b| b.badge_id.as_str()).collect();
        assert_eq!(ids, vec!["first_10_videos"]);

        let again = svc.record_activity_at(user, video(10), day(1)).await.unwrap();
        assert!(again.new_badges.is_empty());
        assert!(svc.check_badges_at(user, day(1)).await.unwrap().is_empty());

        let stored = svc.get_record(user).await.unwrap();
        assert_eq!(stored.badges.len(), 1);
    }

    #[tokio::test]
    async fn seventh_day_awards_badge_and_milestone() {
        let (store, svc) = service();
        let user = Uuid::new_v4();
        let mut record = GamificationRecord::new(user, day(1));
        record.current_streak = 6;
        record.last_activity_date = Some(day(6));
        seed(&store, record).await;

        let outcome = svc.update_streak_at(user, day(7)).await.unwrap();
        let record = &outcome.gamification;

        assert_eq!(record.current_streak, 7);
        assert_eq!(record.longest_streak, 7);
        assert_eq!(outcome.xp_awarded, 50);
        assert_eq!(record.total_xp, 50);
        assert!(record.has_badge("week_warrior"));
        assert_eq!(
            record.activities.last().map(|a| a.activity_type),
            Some(ActivityType::StreakMilestone)
        );
    }

    #[tokio::test]
    async fn long_gap_resets_streak() {
        let (store, svc) = service();
        let user = Uuid::new_v4();
        let mut record = GamificationRecord::new(user, day(1));
        record.current_streak = 4;
        record.last_activity_date = Some(day(5));
        seed(&store, record).await;

        let outcome = svc.update_streak_at(user, day(8)).await.unwrap();
        assert_eq!(outcome.gamification.current_streak, 1);
        assert_eq!(outcome.gamification.longest_streak, 4);
        assert_eq!(outcome.gamification.last_activity_date, Some(day(8)));
    }

    #[tokio::test]
    async fn streak_update_does_not_create_records() {
        let (store, svc) = service();
        let user = Uuid::new_v4();

        assert!(matches!(
            svc.update_streak_at(user, day(1)).await,
            Err(ServiceError::RecordNotFound(id)) if id == user
        ));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn check_in_pays_once_per_day() {
        let (_store, svc) = service();
        let user = Uuid::new_v4();

        let first = svc.check_in_at(user, day(1)).await.unwrap();
        assert_eq!(first.xp_awarded, DEFAULT_DAILY_LOGIN_XP);

        let repeat = svc.check_in_at(user, day(1) + Duration::hours(3)).await.unwrap();
        assert_eq!(repeat.xp_awarded, 0);
        assert_eq!(repeat.gamification.total_xp, DEFAULT_DAILY_LOGIN_XP);

        let next_day = svc.check_in_at(user, day(2)).await.unwrap();
        assert_eq!(next_day.gamification.current_streak, 2);
        assert_eq!(next_day.gamification.total_xp, 2 * DEFAULT_DAILY_LOGIN_XP);
    }

    #[tokio::test]
    async fn invalid_input_leaves_store_untouched() {
        let (store, svc) = service();
        let user = Uuid::new_v4();

        let err = svc
            .record_activity_at(user, ActivityInput::new(ActivityType::ExamCompleted, -5, "bad"), day(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Gamification(GamificationError::NegativeXp(-5))));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn level_up_is_reported() {
        let (_store, svc) = service();
        let user = Uuid::new_v4();
        let outcome = svc
            .record_activity_at(user, ActivityInput::new(ActivityType::CourseCompleted, 400, "Course"), day(1))
            .await
            .unwrap();
        assert!(outcome.leveled_up);
        assert_eq!(outcome.gamification.current_level, 3);
        assert_eq!(outcome.gamification.stats.courses_completed, 1);
    }

    #[tokio::test]
    async fn concurrent_activities_keep_xp_consistent() {
        let (_store, svc) = service();
        let svc = Arc::new(svc);
        let user = Uuid::new_v4();

        let mut handles = Vec::new();
        for i in 0..25 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                svc.record_activity(user, video(i)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let record = svc.get_record(user).await.unwrap();
        let logged: i64 = record.activities.iter().map(|a| a.xp_earned).sum();
        assert_eq!(record.activities.len(), 25);
        assert_eq!(record.total_xp, (0..25).sum::<i64>());
        assert_eq!(record.total_xp, logged);
        assert_eq!(record.stats.videos_watched, 25);
    }

    #[tokio::test]
    async fn leaderboard_and_rank() {
        let (_store, svc) = service();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let course = |xp| ActivityInput::new(ActivityType::CourseCompleted, xp, "Course");

        svc.record_activity_at(a, course(300), day(1)).await.unwrap();
        svc.record_activity_at(b, course(300), day(1)).await.unwrap();
        svc.record_activity_at(c, course(100), day(1)).await.unwrap();

        let board = svc.get_leaderboard(None).await.unwrap();
        let order: Vec<Uuid> = board.iter().map(|e| e.user_id).collect();
        assert_eq!(order, vec![a, b, c]);
        assert_eq!(board.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 1, 3]);

        assert_eq!(svc.get_leaderboard(Some(2)).await.unwrap().len(), 2);

        assert_eq!(svc.get_user_rank(b).await.unwrap().rank, 1);
        assert_eq!(svc.get_user_rank(c).await.unwrap().rank, 3);
        assert!(matches!(
            svc.get_user_rank(Uuid::new_v4()).await,
            Err(ServiceError::RecordNotFound(_))
        ));
    }

    #[tokio::test]
    async fn recent_activities_newest_first() {
        let (_store, svc) = service();
        let user = Uuid::new_v4();
        for xp in [1, 2, 3] {
            svc.record_activity_at(user, video(xp), day(1)).await.unwrap();
        }
        let recent = svc.get_recent_activities(user, 2).await.unwrap();
        assert_eq!(recent.iter().map(|a| a.xp_earned).collect::<Vec<_>>(), vec![3, 2]);
    }

    #[tokio::test]
    async fn reads_for_unknown_user_do_not_persist() {
        let (store, svc) = service();
        let record = svc.get_record(Uuid::new_v4()).await.unwrap();
        assert_eq!(record.current_level, 1);
        assert!(svc.check_badges(record.user_id).await.unwrap().is_empty());
        assert_eq!(store.len().await, 0);
    }

    /// Writes behind the service's back between its load and save, the way a
    /// second process would.
    struct InterferingStore {
        inner: InMemoryStore,
    }

    #[async_trait]
    impl GamificationRepository for InterferingStore {
        async fn load(&self, user_id: Uuid) -> Result<Option<GamificationRecord>, RepositoryError> {
            self.inner.load(user_id).await
        }

        async fn save(&self, record: &GamificationRecord) -> Result<GamificationRecord, RepositoryError> {
            if let Some(current) = self.inner.load(record.user_id).await? {
                self.inner.save(&current).await?;
            }
            self.inner.save(record).await
        }

        async fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardStanding>, RepositoryError> {
            self.inner.leaderboard(limit).await
        }

        async fn count_with_more_xp(&self, total_xp: i64) -> Result<i64, RepositoryError> {
            self.inner.count_with_more_xp(total_xp).await
        }
    }

    #[tokio::test]
    async fn foreign_write_surfaces_as_conflict() {
        let store = Arc::new(InterferingStore {
            inner: InMemoryStore::new(),
        });
        let user = Uuid::new_v4();
        store
            .inner
            .save(&GamificationRecord::new(user, day(1)))
            .await
            .unwrap();

        let svc = GamificationService::new(store.clone(), GamificationSettings::default());
        let err = svc.record_activity_at(user, video(5), day(2)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(id) if id == user));

        let stored = store.inner.load(user).await.unwrap().unwrap();
        assert_eq!(stored.total_xp, 0);
    }
}
