use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{Datelike, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::achievement::Achievement;
use crate::models::session::{CreateSessionRequest, SessionQuery, UserStats, WorkoutSession};
use crate::services::gamification;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreatedResponse {
    #[serde(flatten)]
    pub session: WorkoutSession,
    pub new_achievements: Vec<Achievement>,
}

/// Record a completed workout. Inserting the session also advances the
/// user's stats row (totals, streak, weekly progress) and runs the
/// achievement check.
pub async fn create_session(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateSessionRequest>,
) -> AppResult<Json<SessionCreatedResponse>> {
    if body.name.is_empty() {
        return Err(AppError::Validation("Session name is required".into()));
    }
    if body.duration_min <= 0 {
        return Err(AppError::Validation("Duration must be positive".into()));
    }

    let session = sqlx::query_as::<_, WorkoutSession>(
        r#"
        INSERT INTO workout_sessions
            (id, user_id, plan_id, name, session_type, duration_min, calories_burned, intensity)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(body.plan_id)
    .bind(&body.name)
    .bind(&body.session_type)
    .bind(body.duration_min)
    .bind(body.calories_burned)
    .bind(&body.intensity)
    .fetch_one(&state.db)
    .await?;

    update_stats_for_session(&state, auth_user.id, &session).await?;

    let new_achievements = gamification::check_achievements(&state.db, auth_user.id).await?;

    Ok(Json(SessionCreatedResponse {
        session,
        new_achievements,
    }))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<SessionQuery>,
) -> AppResult<Json<Vec<WorkoutSession>>> {
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let sessions = sqlx::query_as::<_, WorkoutSession>(
        r#"
        SELECT * FROM workout_sessions
        WHERE user_id = $1
        ORDER BY completed_at DESC
        LIMIT $2
        "#,
    )
    .bind(auth_user.id)
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(sessions))
}

async fn update_stats_for_session(
    state: &AppState,
    user_id: Uuid,
    session: &WorkoutSession,
) -> AppResult<()> {
    let Some(stats) = sqlx::query_as::<_, UserStats>(
        "SELECT * FROM user_stats WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?
    else {
        tracing::warn!(user_id = %user_id, "Stats row missing, skipping stats update");
        return Ok(());
    };

    let today = Utc::now().date_naive();
    let yesterday = today.pred_opt().unwrap_or(today);
    let last_workout_day = stats.last_workout_date.map(|d| d.date_naive());

    // Streak: yesterday extends it, today keeps it, anything older resets.
    let new_streak = match last_workout_day {
        None => stats.current_streak + 1,
        Some(day) if day == yesterday => stats.current_streak + 1,
        Some(day) if day == today => stats.current_streak,
        Some(_) => 1,
    };

    let same_week = last_workout_day
        .map(|d| d.iso_week() == today.iso_week())
        .unwrap_or(false);
    let new_weekly_progress = if same_week {
        stats.weekly_progress + 1
    } else {
        1
    };

    sqlx::query(
        r#"
        UPDATE user_stats SET
            total_workouts = total_workouts + 1,
            total_calories_burned = total_calories_burned + $2,
            current_streak = $3,
            longest_streak = GREATEST(longest_streak, $3),
            weekly_progress = $4,
            last_workout_date = NOW(),
            updated_at = NOW()
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .bind(session.calories_burned.unwrap_or(0))
    .bind(new_streak)
    .bind(new_weekly_progress)
    .execute(&state.db)
    .await?;

    Ok(())
}
