use axum::{body::Bytes, extract::State, http::HeaderMap, Extension, Json};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::user::SubscriptionStatus;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize)]
pub struct SubscriptionInfo {
    pub status: SubscriptionStatus,
    pub stripe_customer_id: Option<String>,
}

pub async fn get_subscription(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<SubscriptionInfo>> {
    let (status, stripe_id) = sqlx::query_as::<_, (SubscriptionStatus, Option<String>)>(
        "SELECT subscription_status, stripe_customer_id FROM users WHERE id = $1",
    )
    .bind(auth_user.id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(SubscriptionInfo {
        status,
        stripe_customer_id: stripe_id,
    }))
}

/// Verify a Stripe webhook signature.
/// Header format: t=timestamp,v1=signature[,v1=signature...]
fn verify_stripe_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
) -> Result<(), AppError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in signature_header.split(',') {
        let mut kv = part.splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(ts)) => timestamp = Some(ts),
            (Some("v1"), Some(sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let ts = timestamp
        .ok_or_else(|| AppError::Validation("Missing timestamp in Stripe-Signature".into()))?;

    if signatures.is_empty() {
        return Err(AppError::Validation(
            "Missing v1 signature in Stripe-Signature".into(),
        ));
    }

    let signed_payload = format!("{}.{}", ts, String::from_utf8_lossy(payload));

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid webhook secret")))?;
    mac.update(signed_payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    // Constant-time comparison to prevent timing attacks
    let valid = signatures.iter().any(|sig| {
        sig.len() == expected.len()
            && sig
                .as_bytes()
                .iter()
                .zip(expected.as_bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    });

    if !valid {
        return Err(AppError::Validation(
            "Invalid Stripe webhook signature".into(),
        ));
    }

    Ok(())
}

/// Subscription lifecycle events from Stripe mutate the user's
/// subscription status.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<serde_json::Value>> {
    if !state.config.stripe_webhook_secret.is_empty() {
        let sig_header = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Validation("Missing Stripe-Signature header".into()))?;

        verify_stripe_signature(&body, sig_header, &state.config.stripe_webhook_secret)?;
    } else {
        tracing::warn!("Stripe webhook secret not configured — signature verification skipped");
    }

    let event: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid webhook payload: {}", e)))?;

    let event_type = event["type"].as_str().unwrap_or("");
    tracing::info!(event_type = event_type, "Stripe webhook received");

    match event_type {
        "customer.subscription.updated" => {
            let customer_id = event["data"]["object"]["customer"].as_str().unwrap_or("");
            let subscription_id = event["data"]["object"]["id"].as_str();
            let status = event["data"]["object"]["status"].as_str().unwrap_or("active");

            let sub_status = match status {
                "active" => "active",
                "trialing" => "trialing",
                "past_due" => "past_due",
                "canceled" => "canceled",
                _ => "inactive",
            };

            sqlx::query(
                r#"
                UPDATE users SET
                    subscription_status = $2::subscription_status,
                    stripe_subscription_id = COALESCE($3, stripe_subscription_id),
                    updated_at = NOW()
                WHERE stripe_customer_id = $1
                "#,
            )
            .bind(customer_id)
            .bind(sub_status)
            .bind(subscription_id)
            .execute(&state.db)
            .await?;
        }
        "customer.subscription.deleted" => {
            let customer_id = event["data"]["object"]["customer"].as_str().unwrap_or("");

            sqlx::query(
                r#"
                UPDATE users SET
                    subscription_status = 'canceled',
                    updated_at = NOW()
                WHERE stripe_customer_id = $1
                "#,
            )
            .bind(customer_id)
            .execute(&state.db)
            .await?;
        }
        _ => {
            tracing::debug!(event_type = event_type, "Unhandled Stripe event");
        }
    }

    Ok(Json(serde_json::json!({ "received": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &str, ts: &str, secret: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", ts, payload).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_passes() {
        let payload = r#"{"type":"customer.subscription.updated"}"#;
        let sig = sign(payload, "1700000000", "whsec_test");
        let header = format!("t=1700000000,v1={}", sig);
        assert!(verify_stripe_signature(payload.as_bytes(), &header, "whsec_test").is_ok());
    }

    #[test]
    fn test_wrong_secret_fails() {
        let payload = r#"{"type":"customer.subscription.updated"}"#;
        let sig = sign(payload, "1700000000", "whsec_other");
        let header = format!("t=1700000000,v1={}", sig);
        assert!(verify_stripe_signature(payload.as_bytes(), &header, "whsec_test").is_err());
    }

    #[test]
    fn test_missing_parts_fail() {
        let payload = b"{}";
        assert!(verify_stripe_signature(payload, "v1=abc", "whsec_test").is_err());
        assert!(verify_stripe_signature(payload, "t=1700000000", "whsec_test").is_err());
    }
}
