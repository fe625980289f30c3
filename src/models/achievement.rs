use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Achievement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub achievement_type: String,
    pub title: String,
    pub description: Option<String>,
    pub points: i32,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LevelInfo {
    pub level: i32,
    pub xp: i64,
    pub xp_to_next_level: i64,
    pub title: &'static str,
}
