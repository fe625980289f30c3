//! Wearable provider integration. Token exchange and per-provider data
//! pulls are simulated; the persistence lifecycle (connect → sync →
//! disconnect) and the summary aggregation are real.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::wearable::{HealthData, WearableIntegration};

const DATA_TYPES: [&str; 5] = [
    "heart_rate",
    "steps",
    "sleep",
    "calories_burned",
    "active_minutes",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub synced: usize,
    pub new_data_points: Vec<HealthData>,
}

#[derive(Debug, Serialize)]
pub struct TypeSummary {
    pub average: f64,
    pub latest: f64,
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub unit: String,
}

pub async fn connect_provider(
    db: &PgPool,
    user_id: Uuid,
    provider: &str,
    _auth_code: &str,
) -> AppResult<WearableIntegration> {
    // Simulated token exchange; a real integration would redeem the auth
    // code against the provider's OAuth endpoint here.
    let integration = sqlx::query_as::<_, WearableIntegration>(
        r#"
        INSERT INTO wearable_integrations
            (id, user_id, provider, access_token, refresh_token, expires_at, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, TRUE)
        ON CONFLICT (user_id, provider) DO UPDATE SET
            access_token = EXCLUDED.access_token,
            refresh_token = EXCLUDED.refresh_token,
            expires_at = EXCLUDED.expires_at,
            is_active = TRUE
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(provider)
    .bind(format!("simulated_access_token_{}_{}", user_id, provider))
    .bind(format!("simulated_refresh_token_{}_{}", user_id, provider))
    .bind(Utc::now() + Duration::days(30))
    .fetch_one(db)
    .await?;

    // Pull an initial batch so the dashboard has data right away.
    sync_health_data(db, user_id).await?;

    Ok(integration)
}

pub async fn sync_health_data(db: &PgPool, user_id: Uuid) -> AppResult<SyncResult> {
    let integrations = sqlx::query_as::<_, WearableIntegration>(
        "SELECT * FROM wearable_integrations WHERE user_id = $1 AND is_active = TRUE",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    let mut new_data_points = Vec::new();
    for integration in &integrations {
        for data_type in DATA_TYPES {
            let (value, unit) = simulated_health_value(data_type);
            let point = sqlx::query_as::<_, HealthData>(
                r#"
                INSERT INTO health_data (id, user_id, data_type, value, unit, source)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(data_type)
            .bind(value)
            .bind(unit)
            .bind(&integration.provider)
            .fetch_one(db)
            .await?;
            new_data_points.push(point);
        }

        sqlx::query("UPDATE wearable_integrations SET last_sync = NOW() WHERE id = $1")
            .bind(integration.id)
            .execute(db)
            .await?;
    }

    tracing::info!(
        user_id = %user_id,
        providers = integrations.len(),
        points = new_data_points.len(),
        "Health data synced"
    );

    Ok(SyncResult {
        synced: new_data_points.len(),
        new_data_points,
    })
}

fn simulated_health_value(data_type: &str) -> (f64, &'static str) {
    let mut rng = rand::thread_rng();
    match data_type {
        "heart_rate" => (60.0 + rng.gen::<f64>() * 40.0, "bpm"),
        "steps" => ((5_000.0 + rng.gen::<f64>() * 10_000.0).floor(), "steps"),
        "sleep" => (6.0 + rng.gen::<f64>() * 3.0, "hours"),
        "calories_burned" => ((1_800.0 + rng.gen::<f64>() * 800.0).floor(), "calories"),
        "active_minutes" => ((rng.gen::<f64>() * 120.0).floor(), "minutes"),
        _ => (rng.gen::<f64>() * 100.0, "units"),
    }
}

/// Per-type aggregation of the user's health data over the timeframe.
pub async fn health_data_summary(
    db: &PgPool,
    user_id: Uuid,
    timeframe: &str,
) -> AppResult<BTreeMap<String, TypeSummary>> {
    let start: DateTime<Utc> = match timeframe {
        "day" => Utc::now() - Duration::days(1),
        "month" => Utc::now() - Duration::days(30),
        _ => Utc::now() - Duration::days(7),
    };

    let points = sqlx::query_as::<_, HealthData>(
        r#"
        SELECT * FROM health_data
        WHERE user_id = $1 AND recorded_at >= $2
        ORDER BY recorded_at ASC
        "#,
    )
    .bind(user_id)
    .bind(start)
    .fetch_all(db)
    .await?;

    let mut grouped: BTreeMap<String, Vec<&HealthData>> = BTreeMap::new();
    for point in &points {
        grouped.entry(point.data_type.clone()).or_default().push(point);
    }

    let mut summary = BTreeMap::new();
    for (data_type, group) in grouped {
        let values: Vec<f64> = group.iter().map(|p| p.value).collect();
        let sum: f64 = values.iter().sum();
        summary.insert(
            data_type,
            TypeSummary {
                average: (sum / values.len() as f64 * 100.0).round() / 100.0,
                latest: *values.last().unwrap_or(&0.0),
                count: values.len(),
                min: values.iter().copied().fold(f64::INFINITY, f64::min),
                max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                unit: group
                    .first()
                    .and_then(|p| p.unit.clone())
                    .unwrap_or_else(|| "units".into()),
            },
        );
    }

    Ok(summary)
}

pub async fn disconnect_provider(db: &PgPool, user_id: Uuid, provider: &str) -> AppResult<()> {
    let result =
        sqlx::query("DELETE FROM wearable_integrations WHERE user_id = $1 AND provider = $2")
            .bind(user_id)
            .bind(provider)
            .execute(db)
            .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "No {} integration found",
            provider
        )));
    }

    Ok(())
}

pub fn available_providers() -> serde_json::Value {
    json!([
        {
            "id": "fitbit",
            "name": "Fitbit",
            "description": "Connect your Fitbit device to sync health and fitness data",
            "supported_data": ["steps", "heart_rate", "sleep", "calories_burned", "active_minutes"]
        },
        {
            "id": "garmin",
            "name": "Garmin",
            "description": "Sync data from your Garmin watch or fitness tracker",
            "supported_data": ["steps", "heart_rate", "sleep", "calories_burned", "active_minutes", "distance"]
        },
        {
            "id": "apple_health",
            "name": "Apple Health",
            "description": "Connect with Apple Health to sync iPhone and Apple Watch data",
            "supported_data": ["steps", "heart_rate", "sleep", "calories_burned", "workouts"]
        },
        {
            "id": "google_fit",
            "name": "Google Fit",
            "description": "Sync fitness data from Google Fit and compatible Android devices",
            "supported_data": ["steps", "heart_rate", "calories_burned", "active_minutes", "workouts"]
        }
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_values_stay_in_range() {
        for _ in 0..50 {
            let (hr, unit) = simulated_health_value("heart_rate");
            assert!((60.0..=100.0).contains(&hr));
            assert_eq!(unit, "bpm");

            let (steps, _) = simulated_health_value("steps");
            assert!((5_000.0..=15_000.0).contains(&steps));
            assert_eq!(steps, steps.floor());

            let (sleep, _) = simulated_health_value("sleep");
            assert!((6.0..=9.0).contains(&sleep));
        }
    }

    #[test]
    fn test_provider_catalog_shape() {
        let providers = available_providers();
        let list = providers.as_array().unwrap();
        assert_eq!(list.len(), 4);
        assert!(list.iter().all(|p| p.get("id").is_some() && p.get("supported_data").is_some()));
    }
}
