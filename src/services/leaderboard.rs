use crate::models::gamificationmodel::{GamificationRecord, LeaderboardEntry, LeaderboardStanding};
use crate::services::level::level_for_xp;

pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
pub const MAX_LEADERBOARD_LIMIT: usize = 100;

/// Order records (given in insertion order) by XP, highest first, and keep
/// the top `limit`. The sort is stable so equal XP keeps insertion order.
pub fn top_by_xp<'a, I>(records: I, limit: usize) -> Vec<LeaderboardStanding>
where
    I: IntoIterator<Item = &'a GamificationRecord>,
{
    let mut standings: Vec<LeaderboardStanding> =
        records.into_iter().map(LeaderboardStanding::from).collect();
    standings.sort_by(|a, b| b.total_xp.cmp(&a.total_xp));
    standings.truncate(limit);
    standings
}

/// Rank is one more than the number of users with strictly more XP, so tied
/// users share a rank and the next distinct score skips ahead.
pub fn rank_from_count(users_ahead: i64) -> i64 {
    users_ahead + 1
}

/// Project an ordered leaderboard page into client entries.
pub fn to_entries(standings: &[LeaderboardStanding]) -> Vec<LeaderboardEntry> {
    let mut entries = Vec::with_capacity(standings.len());
    let mut rank = 0;
    let mut previous_xp = None;

    for (position, standing) in standings.iter().enumerate() {
        if previous_xp != Some(standing.total_xp) {
            rank = rank_from_count(position as i64);
            previous_xp = Some(standing.total_xp);
        }
        entries.push(LeaderboardEntry {
            rank,
            user_id: standing.user_id,
            total_xp: standing.total_xp,
            current_level: level_for_xp(standing.total_xp),
            current_streak: standing.current_streak,
            badge_count: standing.badge_count,
        });
    }

    entries
}
