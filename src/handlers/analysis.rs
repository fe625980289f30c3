use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::analysis::{AnalyzeMovementRequest, MovementAnalysis};
use crate::services::movement::PoseFrame;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalysisListQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateFormRequest {
    pub exercise_name: String,
    pub keypoints: Vec<PoseFrame>,
}

/// Run the triple analysis, persist the result, and return it together
/// with the bookkeeping fields.
pub async fn analyze_movement(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<AnalyzeMovementRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let exercise_name = body
        .exercise_name
        .as_deref()
        .filter(|n| !n.is_empty())
        .ok_or(AppError::Validation("exerciseName is required".into()))?;

    let analysis = state
        .analyzer
        .analyze(&state.db, exercise_name, body.video_data.as_deref().unwrap_or(""))
        .await;

    let result_blob = serde_json::to_value(&analysis)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize analysis: {}", e)))?;

    let row = sqlx::query_as::<_, MovementAnalysis>(
        r#"
        INSERT INTO movement_analyses
            (id, user_id, session_id, exercise_name, video_data, form_score, analysis_result)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(body.session_id)
    .bind(exercise_name)
    .bind(&body.video_data)
    .bind(analysis.form_score)
    .bind(&result_blob)
    .fetch_one(&state.db)
    .await?;

    let mut response = result_blob;
    if let Some(object) = response.as_object_mut() {
        object.insert("id".into(), serde_json::json!(row.id));
        object.insert("userId".into(), serde_json::json!(auth_user.id));
        object.insert("exerciseName".into(), serde_json::json!(exercise_name));
        object.insert("timestamp".into(), serde_json::json!(Utc::now()));
        object.insert("status".into(), serde_json::json!("success"));
    }

    Ok(Json(response))
}

pub async fn list_analyses(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<AnalysisListQuery>,
) -> AppResult<Json<Vec<MovementAnalysis>>> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let analyses = sqlx::query_as::<_, MovementAnalysis>(
        r#"
        SELECT * FROM movement_analyses
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(auth_user.id)
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(analyses))
}

/// Pass/fail form validation for client-supplied keypoints.
pub async fn validate_form(
    State(state): State<AppState>,
    Extension(_auth_user): Extension<AuthUser>,
    Json(body): Json<ValidateFormRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if body.exercise_name.is_empty() {
        return Err(AppError::Validation("exerciseName is required".into()));
    }

    let validation = state
        .analyzer
        .validate_form(&body.exercise_name, &body.keypoints)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(serde_json::to_value(validation).map_err(|e| {
        AppError::Internal(anyhow::anyhow!("Failed to serialize validation: {}", e))
    })?))
}
