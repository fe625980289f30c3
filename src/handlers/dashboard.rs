use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::models::achievement::Achievement;
use crate::models::analysis::AnalyticsQuery;
use crate::models::session::{UserStats, WorkoutSession};
use crate::models::wearable::HealthData;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    pub stats: Option<UserStats>,
    pub recent_sessions: Vec<WorkoutSession>,
    pub recent_achievements: Vec<Achievement>,
    pub recent_health_data: Vec<HealthData>,
}

pub async fn get_stats(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<DashboardData>> {
    let stats = sqlx::query_as::<_, UserStats>("SELECT * FROM user_stats WHERE user_id = $1")
        .bind(auth_user.id)
        .fetch_optional(&state.db)
        .await?;

    let recent_sessions = sqlx::query_as::<_, WorkoutSession>(
        "SELECT * FROM workout_sessions WHERE user_id = $1 ORDER BY completed_at DESC LIMIT 5",
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    let recent_achievements = sqlx::query_as::<_, Achievement>(
        "SELECT * FROM achievements WHERE user_id = $1 ORDER BY earned_at DESC LIMIT 3",
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    let recent_health_data = sqlx::query_as::<_, HealthData>(
        "SELECT * FROM health_data WHERE user_id = $1 ORDER BY recorded_at DESC LIMIT 10",
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(DashboardData {
        stats,
        recent_sessions,
        recent_achievements,
        recent_health_data,
    }))
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FormScorePoint {
    pub date: NaiveDate,
    pub avg_score: f64,
    pub analysis_count: i64,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseShare {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyActivity {
    pub week_start: DateTime<Utc>,
    pub session_count: i64,
    pub calories_burned: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsData {
    pub current_streak: i32,
    pub total_workouts: i32,
    pub total_calories_burned: i32,
    pub weekly_progress: i32,
    pub weekly_goal: i32,
    pub form_score_trend: Vec<FormScorePoint>,
    pub exercise_distribution: Vec<ExerciseShare>,
    pub weekly_comparison: Vec<WeeklyActivity>,
}

fn range_days(range: Option<&str>) -> i64 {
    match range {
        Some("7d") => 7,
        Some("90d") => 90,
        Some("1y") => 365,
        _ => 30,
    }
}

pub async fn get_analytics(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<AnalyticsQuery>,
) -> AppResult<Json<AnalyticsData>> {
    let days = range_days(query.range.as_deref());
    let threshold = Utc::now() - chrono::Duration::days(days);

    let form_score_trend = sqlx::query_as::<_, FormScorePoint>(
        r#"
        SELECT created_at::date AS date,
               AVG(form_score)::float8 AS avg_score,
               COUNT(*) AS analysis_count
        FROM movement_analyses
        WHERE user_id = $1 AND created_at >= $2
        GROUP BY created_at::date
        ORDER BY created_at::date ASC
        "#,
    )
    .bind(auth_user.id)
    .bind(threshold)
    .fetch_all(&state.db)
    .await?;

    let exercise_distribution = sqlx::query_as::<_, ExerciseShare>(
        r#"
        SELECT exercise_name AS name, COUNT(*) AS count
        FROM movement_analyses
        WHERE user_id = $1 AND created_at >= $2
        GROUP BY exercise_name
        ORDER BY COUNT(*) DESC
        "#,
    )
    .bind(auth_user.id)
    .bind(threshold)
    .fetch_all(&state.db)
    .await?;

    let weekly_comparison = sqlx::query_as::<_, WeeklyActivity>(
        r#"
        SELECT date_trunc('week', completed_at) AS week_start,
               COUNT(*) AS session_count,
               COALESCE(SUM(calories_burned), 0) AS calories_burned
        FROM workout_sessions
        WHERE user_id = $1 AND completed_at >= NOW() - INTERVAL '8 weeks'
        GROUP BY date_trunc('week', completed_at)
        ORDER BY week_start ASC
        "#,
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    let stats = sqlx::query_as::<_, UserStats>("SELECT * FROM user_stats WHERE user_id = $1")
        .bind(auth_user.id)
        .fetch_optional(&state.db)
        .await?;

    let (current_streak, total_workouts, total_calories_burned, weekly_progress, weekly_goal) =
        stats
            .map(|s| {
                (
                    s.current_streak,
                    s.total_workouts,
                    s.total_calories_burned,
                    s.weekly_progress,
                    s.weekly_goal,
                )
            })
            .unwrap_or((0, 0, 0, 0, 4));

    Ok(Json(AnalyticsData {
        current_streak,
        total_workouts,
        total_calories_burned,
        weekly_progress,
        weekly_goal,
        form_score_trend,
        exercise_distribution,
        weekly_comparison,
    }))
}
