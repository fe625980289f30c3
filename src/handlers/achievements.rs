use axum::{extract::State, Extension, Json};
use serde_json::json;

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::models::achievement::{Achievement, LevelInfo};
use crate::services::gamification;
use crate::AppState;

pub async fn list_achievements(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Achievement>>> {
    let achievements = sqlx::query_as::<_, Achievement>(
        "SELECT * FROM achievements WHERE user_id = $1 ORDER BY earned_at DESC",
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(achievements))
}

/// Evaluate the rule list now and return only the newly earned rows.
pub async fn check_achievements(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Achievement>>> {
    let earned = gamification::check_achievements(&state.db, auth_user.id).await?;
    Ok(Json(earned))
}

pub async fn get_level(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<LevelInfo>> {
    let level = gamification::user_level(&state.db, auth_user.id).await?;
    Ok(Json(level))
}

pub async fn get_motivational_message(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<serde_json::Value>> {
    let message = gamification::motivational_message(&state.db, auth_user.id).await?;
    Ok(Json(json!({ "message": message })))
}
