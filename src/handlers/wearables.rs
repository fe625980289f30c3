use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::wearable::{
    ConnectWearableRequest, HealthData, HealthDataQuery, SummaryQuery, WearableIntegration,
};
use crate::services::wearables;
use crate::AppState;

pub async fn connect(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<ConnectWearableRequest>,
) -> AppResult<Json<WearableIntegration>> {
    if body.provider.is_empty() {
        return Err(AppError::Validation("provider is required".into()));
    }

    let integration =
        wearables::connect_provider(&state.db, auth_user.id, &body.provider, &body.auth_code)
            .await?;

    tracing::info!(user_id = %auth_user.id, provider = %body.provider, "Wearable connected");
    Ok(Json(integration))
}

pub async fn sync(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<wearables::SyncResult>> {
    let result = wearables::sync_health_data(&state.db, auth_user.id).await?;
    Ok(Json(result))
}

pub async fn list_integrations(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<WearableIntegration>>> {
    let integrations = sqlx::query_as::<_, WearableIntegration>(
        "SELECT * FROM wearable_integrations WHERE user_id = $1 ORDER BY created_at ASC",
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(integrations))
}

pub async fn disconnect(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(provider): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    wearables::disconnect_provider(&state.db, auth_user.id, &provider).await?;
    Ok(Json(serde_json::json!({ "disconnected": true })))
}

pub async fn providers() -> Json<serde_json::Value> {
    Json(wearables::available_providers())
}

pub async fn list_health_data(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<HealthDataQuery>,
) -> AppResult<Json<Vec<HealthData>>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 500);

    let data = if let Some(data_type) = &query.data_type {
        sqlx::query_as::<_, HealthData>(
            r#"
            SELECT * FROM health_data
            WHERE user_id = $1 AND data_type = $2
            ORDER BY recorded_at DESC
            LIMIT $3
            "#,
        )
        .bind(auth_user.id)
        .bind(data_type)
        .bind(limit)
        .fetch_all(&state.db)
        .await?
    } else {
        sqlx::query_as::<_, HealthData>(
            r#"
            SELECT * FROM health_data
            WHERE user_id = $1
            ORDER BY recorded_at DESC
            LIMIT $2
            "#,
        )
        .bind(auth_user.id)
        .bind(limit)
        .fetch_all(&state.db)
        .await?
    };

    Ok(Json(data))
}

pub async fn health_data_summary(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<SummaryQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let timeframe = query.timeframe.as_deref().unwrap_or("week");
    if !["day", "week", "month"].contains(&timeframe) {
        return Err(AppError::Validation(
            "timeframe must be day, week, or month".into(),
        ));
    }

    let summary = wearables::health_data_summary(&state.db, auth_user.id, timeframe).await?;
    Ok(Json(serde_json::to_value(summary).map_err(|e| {
        AppError::Internal(anyhow::anyhow!("Failed to serialize summary: {}", e))
    })?))
}
