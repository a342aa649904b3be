pub mod badge_evaluator;
pub mod leaderboard;
pub mod level;
pub mod streak_tracker;
pub mod xp_engine;
