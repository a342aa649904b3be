use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::gamificationdtos::*,
    error::HttpError,
    middleware::{role_check, JWTAuthMiddeware},
    models::usermodel::UserRole,
    AppState,
};

const DEFAULT_ACTIVITY_PAGE: usize = 20;

/// Routes for the signed-in learner plus collaborator write endpoints.
pub fn gamification_handler() -> Router {
    Router::new()
        .route("/me", get(get_me))
        .route("/me/badges", get(get_my_badges))
        .route("/me/activities", get(get_my_activities))
        .route("/me/rank", get(get_my_rank))
        .route("/check-in", post(check_in))
        .route(
            "/activities",
            post(record_activity)
            .layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::Instructor, UserRole::Admin, UserRole::Service])
            }))
        )
        .route(
            "/users/:user_id/streak",
            post(update_user_streak)
            .layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::Admin, UserRole::Service])
            }))
        )
        .route(
            "/users/:user_id/badges/check",
            post(check_user_badges)
            .layer(middleware::from_fn(|state, req, next| {
                role_check(state, req, next, vec![UserRole::Admin, UserRole::Service])
            }))
        )
}

/// Read-only routes that need no token.
pub fn public_gamification_handler() -> Router {
    Router::new()
        .route("/leaderboard", get(get_leaderboard))
        .route("/users/:user_id/rank", get(get_user_rank))
}

pub async fn get_me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let record = app_state.gamification_service
        .get_record(user.user.id)
        .await?;

    let response = GamificationResponseDto {
        status: "success".to_string(),
        data: GamificationData {
            gamification: record,
        },
    };

    Ok(Json(response))
}

pub async fn get_my_badges(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let badges = app_state.gamification_service
        .get_badges(user.user.id)
        .await?;

    Ok(Json(BadgeListResponseDto {
        status: "success".to_string(),
        results: badges.len(),
        badges,
    }))
}

pub async fn get_my_activities(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Query(query_params): Query<LimitQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let limit = query_params.limit.unwrap_or(DEFAULT_ACTIVITY_PAGE);

    let activities = app_state.gamification_service
        .get_recent_activities(user.user.id, limit)
        .await?;

    Ok(Json(ActivityListResponseDto {
        status: "success".to_string(),
        results: activities.len(),
        activities,
    }))
}

pub async fn get_my_rank(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let rank = app_state.gamification_service
        .get_user_rank(user.user.id)
        .await?;

    Ok(Json(RankResponseDto {
        status: "success".to_string(),
        data: rank,
    }))
}

pub async fn check_in(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let outcome = app_state.gamification_service
        .check_in(user.user.id)
        .await?;

    Ok(Json(ActivityResponseDto {
        status: "success".to_string(),
        data: outcome,
    }))
}

pub async fn record_activity(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(user): Extension<JWTAuthMiddeware>,
    Json(body): Json<RecordActivityDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let target = body.user_id;
    let input = body.into_input()?;

    tracing::debug!(
        "{} {} reporting {} for user {}",
        user.user.role.to_str(),
        user.user.id,
        input.activity_type.to_str(),
        target
    );

    let outcome = app_state.gamification_service
        .record_activity(target, input)
        .await?;

    Ok(Json(ActivityResponseDto {
        status: "success".to_string(),
        data: outcome,
    }))
}

pub async fn update_user_streak(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let outcome = app_state.gamification_service
        .update_streak(user_id)
        .await?;

    Ok(Json(ActivityResponseDto {
        status: "success".to_string(),
        data: outcome,
    }))
}

pub async fn check_user_badges(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let badges = app_state.gamification_service
        .check_badges(user_id)
        .await?;

    Ok(Json(BadgeListResponseDto {
        status: "success".to_string(),
        results: badges.len(),
        badges,
    }))
}

pub async fn get_leaderboard(
    Extension(app_state): Extension<Arc<AppState>>,
    Query(query_params): Query<LimitQueryDto>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let leaderboard = app_state.gamification_service
        .get_leaderboard(query_params.limit)
        .await?;

    Ok(Json(LeaderboardResponseDto {
        status: "success".to_string(),
        results: leaderboard.len(),
        leaderboard,
    }))
}

pub async fn get_user_rank(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let rank = app_state.gamification_service
        .get_user_rank(user_id)
        .await?;

    Ok(Json(RankResponseDto {
        status: "success".to_string(),
        data: rank,
    }))
}
