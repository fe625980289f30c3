use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::plan::{
    AdaptPlanRequest, Exercise, GeneratePlanRequest, PlanWithExercises, RecommendedExercise,
    RecommendedExercisesQuery, WorkoutPlan,
};
use crate::services::generator;
use crate::AppState;

pub async fn generate_plan(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<GeneratePlanRequest>,
) -> AppResult<Json<PlanWithExercises>> {
    let plan = generator::generate_personalized_plan(
        &state.db,
        &state.ai,
        auth_user.id,
        body.preferences,
    )
    .await?;

    tracing::info!(user_id = %auth_user.id, plan_id = %plan.plan.id, "Workout plan generated");
    Ok(Json(plan))
}

pub async fn list_plans(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<WorkoutPlan>>> {
    let plans = sqlx::query_as::<_, WorkoutPlan>(
        "SELECT * FROM workout_plans WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(plans))
}

pub async fn get_plan(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Json<PlanWithExercises>> {
    let plan = sqlx::query_as::<_, WorkoutPlan>(
        "SELECT * FROM workout_plans WHERE id = $1 AND user_id = $2",
    )
    .bind(plan_id)
    .bind(auth_user.id)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Workout plan not found".into()))?;

    let exercises = sqlx::query_as::<_, Exercise>(
        "SELECT * FROM exercises WHERE plan_id = $1 ORDER BY day ASC, position ASC",
    )
    .bind(plan_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(PlanWithExercises { plan, exercises }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlanRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

/// Plans are deactivated rather than deleted.
pub async fn update_plan(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(plan_id): Path<Uuid>,
    Json(body): Json<UpdatePlanRequest>,
) -> AppResult<Json<WorkoutPlan>> {
    let plan = sqlx::query_as::<_, WorkoutPlan>(
        r#"
        UPDATE workout_plans SET
            name = COALESCE($3, name),
            description = COALESCE($4, description),
            is_active = COALESCE($5, is_active)
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(plan_id)
    .bind(auth_user.id)
    .bind(&body.name)
    .bind(&body.description)
    .bind(body.is_active)
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("Workout plan not found".into()))?;

    Ok(Json(plan))
}

pub async fn adapt_plan(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(plan_id): Path<Uuid>,
    Json(body): Json<AdaptPlanRequest>,
) -> AppResult<Json<PlanWithExercises>> {
    if !(0..=100).contains(&body.overall_performance) {
        return Err(AppError::Validation(
            "overallPerformance must be between 0 and 100".into(),
        ));
    }

    let plan =
        generator::adapt_plan_to_proficiency(&state.db, auth_user.id, plan_id, &body).await?;
    Ok(Json(plan))
}

pub async fn progression_plan(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Json<PlanWithExercises>> {
    let plan = generator::generate_progression_plan(&state.db, auth_user.id, plan_id).await?;
    Ok(Json(plan))
}

pub async fn recommended_exercises(
    Query(query): Query<RecommendedExercisesQuery>,
) -> AppResult<Json<Vec<RecommendedExercise>>> {
    let muscles: Vec<String> = query
        .muscles
        .split(',')
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();

    if muscles.is_empty() {
        return Err(AppError::Validation("muscles is required".into()));
    }

    Ok(Json(generator::recommended_exercises(
        &muscles,
        query.difficulty,
    )))
}
