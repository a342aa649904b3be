use thiserror::Error;
use uuid::Uuid;

use crate::{
    db::gamificationdb::RepositoryError,
    error::{ErrorMessage, HttpError},
};

/// Input errors raised by the XP engine before anything is mutated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GamificationError {
    #[error("XP amount must be non-negative, got {0}")]
    NegativeXp(i64),

    #[error("Unknown activity type: {0}")]
    UnknownActivityType(String),

    #[error("Invalid activity metadata: {0}")]
    InvalidMetadata(String),

    #[error("XP total would overflow for user {0}")]
    XpOverflow(Uuid),
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Gamification(#[from] GamificationError),

    #[error("Gamification record not found for user {0}")]
    RecordNotFound(Uuid),

    #[error("Gamification record for user {0} was modified concurrently")]
    Conflict(Uuid),

    #[error("Repository error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ServiceError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::VersionConflict { user_id, .. } => ServiceError::Conflict(user_id),
            other => ServiceError::Repository(other),
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Gamification(_) => HttpError::bad_request(error.to_string()),

            ServiceError::RecordNotFound(_) => {
                HttpError::not_found(ErrorMessage::RecordNotFound.to_string())
            }

            ServiceError::Conflict(_) => {
                HttpError::conflict(ErrorMessage::ConcurrentUpdate.to_string())
            }

            ServiceError::Repository(ref e) => {
                tracing::error!("Repository failure: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn input_errors_map_to_bad_request() {
        let err = ServiceError::from(GamificationError::NegativeXp(-5));
        let http: HttpError = err.into();
        assert_eq!(http.status, StatusCode::BAD_REQUEST);
        assert!(http.message.contains("-5"));
    }

    #[test]
    fn version_conflict_becomes_conflict() {
        let user_id = Uuid::new_v4();
        let err = ServiceError::from(RepositoryError::VersionConflict {
            user_id,
            expected: 3,
        });
        assert!(matches!(err, ServiceError::Conflict(id) if id == user_id));
        assert_eq!(HttpError::from(err).status, StatusCode::CONFLICT);
    }

    #[test]
    fn not_found_hides_internal_detail() {
        let http = HttpError::from(ServiceError::RecordNotFound(Uuid::new_v4()));
        assert_eq!(http.status, StatusCode::NOT_FOUND);
        assert_eq!(http.message, ErrorMessage::RecordNotFound.to_string());
    }
}
