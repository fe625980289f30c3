use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkoutSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub name: String,
    pub session_type: String,
    pub duration_min: i32,
    pub calories_burned: Option<i32>,
    pub intensity: Option<String>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub plan_id: Option<Uuid>,
    pub name: String,
    pub session_type: String,
    pub duration_min: i32,
    pub calories_burned: Option<i32>,
    pub intensity: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub limit: Option<i64>,
}

/// Single row per user; mutated additively on each session insert.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserStats {
    pub id: Uuid,
    pub user_id: Uuid,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub total_workouts: i32,
    pub total_calories_burned: i32,
    pub weekly_goal: i32,
    pub weekly_progress: i32,
    pub last_workout_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}
