pub mod gamification;
