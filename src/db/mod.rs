pub mod cache;
pub mod db;
pub mod gamificationdb;
pub mod memorydb;
