pub mod error;
pub mod gamification_service;
pub mod user_locks;
