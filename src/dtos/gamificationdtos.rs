use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::gamificationmodel::{
        Activity, ActivityType, Badge, GamificationRecord, LeaderboardEntry, UserRank,
    },
    service::{error::ServiceError, gamification_service::ActivityOutcome},
    services::xp_engine::{ActivityInput, ActivityMetadata},
};

/// Activity reported by a course, exam or video handler.
#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordActivityDto {
    pub user_id: Uuid,
    // Parsed by the engine so unknown names get its error, not a serde one
    #[validate(length(min = 1, message = "Activity type is required"))]
    pub activity_type: String,
    pub xp_amount: i64,
    #[validate(length(min = 1, max = 500, message = "Description must be between 1 and 500 characters"))]
    pub description: String,
    #[serde(default)]
    pub metadata: ActivityMetadata,
}

impl RecordActivityDto {
    pub fn into_input(self) -> Result<ActivityInput, ServiceError> {
        let activity_type = self.activity_type.parse::<ActivityType>()?;
        Ok(ActivityInput::new(activity_type, self.xp_amount, self.description)
            .with_metadata(self.metadata))
    }
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LimitQueryDto {
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GamificationData {
    pub gamification: GamificationRecord,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GamificationResponseDto {
    pub status: String,
    pub data: GamificationData,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponseDto {
    pub status: String,
    pub data: ActivityOutcome,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BadgeListResponseDto {
    pub status: String,
    pub badges: Vec<Badge>,
    pub results: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActivityListResponseDto {
    pub status: String,
    pub activities: Vec<Activity>,
    pub results: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardResponseDto {
    pub status: String,
    pub leaderboard: Vec<LeaderboardEntry>,
    pub results: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RankResponseDto {
    pub status: String,
    pub data: UserRank,
}
