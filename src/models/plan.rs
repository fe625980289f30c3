use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkoutPlan {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub difficulty: PlanDifficulty,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "plan_difficulty", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanDifficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Default for PlanDifficulty {
    fn default() -> Self {
        Self::Beginner
    }
}

impl PlanDifficulty {
    /// Band a 1-5 fitness level into a plan difficulty.
    pub fn from_fitness_level(level: i32) -> Self {
        if level >= 4 {
            Self::Advanced
        } else if level >= 2 {
            Self::Intermediate
        } else {
            Self::Beginner
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Exercise {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub exercise_type: ExerciseType,
    pub difficulty: i32,
    pub target_muscles: Option<String>,
    pub day: i32,
    pub position: i32,
    pub sets: Option<i32>,
    pub reps: Option<i32>,
    pub duration_min: Option<i32>,
    pub weight: Option<f32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "exercise_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExerciseType {
    Strength,
    Cardio,
    Flexibility,
}

impl Default for ExerciseType {
    fn default() -> Self {
        Self::Strength
    }
}

#[derive(Debug, Serialize)]
pub struct PlanWithExercises {
    #[serde(flatten)]
    pub plan: WorkoutPlan,
    pub exercises: Vec<Exercise>,
}

/// Preferences accepted by the plan generator. Missing fields are filled
/// from the user's profile before the gateway call.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPreferences {
    pub goals: Option<Vec<String>>,
    pub time_available: Option<i32>,
    pub equipment: Option<Vec<String>>,
    pub fitness_level: Option<i32>,
    pub injuries: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct GeneratePlanRequest {
    #[serde(default)]
    pub preferences: PlanPreferences,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptPlanRequest {
    #[serde(default)]
    pub exercise_scores: HashMap<String, i32>,
    pub overall_performance: i32,
}

#[derive(Debug, Deserialize)]
pub struct RecommendedExercisesQuery {
    /// Comma-separated muscle groups, e.g. "chest,core".
    pub muscles: String,
    pub difficulty: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecommendedExercise {
    pub name: &'static str,
    pub exercise_type: ExerciseType,
    pub difficulty: i32,
    pub description: &'static str,
}
