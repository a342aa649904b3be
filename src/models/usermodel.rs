use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Student,
    Instructor,
    Admin,
    // Course/exam/video handlers calling in with a service token
    Service,
}

impl UserRole {
    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Student => "student",
            UserRole::Instructor => "instructor",
            UserRole::Admin => "admin",
            UserRole::Service => "service",
        }
    }
}

/// Identity carried by a verified token. User accounts live in the LMS,
/// this service only sees the claims.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
}
