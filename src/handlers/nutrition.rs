use axum::{extract::State, Extension, Json};
use serde::Deserialize;

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::services::ai_gateway::NutritionAdvice;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionAdviceRequest {
    #[serde(default)]
    pub goals: Vec<String>,
    pub current_weight: Option<f64>,
    pub target_weight: Option<f64>,
}

pub async fn get_advice(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<NutritionAdviceRequest>,
) -> AppResult<Json<NutritionAdvice>> {
    // Fall back to the profile goals when the request carries none.
    let goals = if body.goals.is_empty() {
        sqlx::query_scalar::<_, Option<String>>("SELECT goals FROM users WHERE id = $1")
            .bind(auth_user.id)
            .fetch_optional(&state.db)
            .await?
            .flatten()
            .map(|g| {
                g.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    } else {
        body.goals
    };

    let advice = state
        .ai
        .nutrition_advice(&goals, body.current_weight, body.target_weight)
        .await;

    Ok(Json(advice))
}
