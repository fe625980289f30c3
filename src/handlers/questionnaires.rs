use axum::{extract::State, Extension, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::questionnaire::{
    QuestionnaireResponse, SubmitQuestionnaireRequest, UserQuestionnaire,
};
use crate::models::user::{User, UserProfile};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct QuestionnaireSubmitted {
    pub questionnaire: UserQuestionnaire,
    pub profile: UserProfile,
}

/// Fitness profile fields derived from onboarding answers.
#[derive(Debug, PartialEq)]
pub struct DerivedProfile {
    pub fitness_level: i32,
    pub goals: Vec<String>,
}

pub fn derive_profile(responses: &[QuestionnaireResponse]) -> DerivedProfile {
    let answer = |id: &str| -> Option<&serde_json::Value> {
        responses
            .iter()
            .find(|r| r.question_id == id)
            .map(|r| &r.answer)
    };

    let fitness_level = answer("experience")
        .and_then(|a| a.as_str())
        .map(|experience| {
            let lower = experience.to_lowercase();
            if lower.contains("advanced") || lower.contains("very experienced") {
                3
            } else if lower.contains("beginner") {
                1
            } else {
                2
            }
        })
        .unwrap_or(1);

    let mut goals = Vec::new();
    if let Some(goal) = answer("goal").and_then(|a| a.as_str()) {
        if !goal.is_empty() {
            goals.push(goal.to_string());
        }
    }
    if let Some(focus) = answer("focus_area").and_then(|a| a.as_array()) {
        for area in focus {
            if let Some(area) = area.as_str() {
                if !area.is_empty() {
                    goals.push(area.to_string());
                }
            }
        }
    }

    DerivedProfile {
        fitness_level,
        goals,
    }
}

/// Persist the onboarding answers and apply the derived profile fields to
/// the user row.
pub async fn submit_questionnaire(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<SubmitQuestionnaireRequest>,
) -> AppResult<Json<QuestionnaireSubmitted>> {
    if body.responses.is_empty() {
        return Err(AppError::Validation("responses is required".into()));
    }

    let questionnaire_type = body
        .questionnaire_type
        .unwrap_or_else(|| "fitness_onboarding".into());

    let responses_blob = serde_json::to_value(&body.responses)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize responses: {}", e)))?;

    let questionnaire = sqlx::query_as::<_, UserQuestionnaire>(
        r#"
        INSERT INTO user_questionnaires (id, user_id, questionnaire_type, responses)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(&questionnaire_type)
    .bind(&responses_blob)
    .fetch_one(&state.db)
    .await?;

    let derived = derive_profile(&body.responses);
    let user = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            fitness_level = $2,
            goals = $3,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(auth_user.id)
    .bind(derived.fitness_level)
    .bind(derived.goals.join(","))
    .fetch_optional(&state.db)
    .await?
    .ok_or(AppError::NotFound("User not found".into()))?;

    tracing::info!(
        user_id = %auth_user.id,
        fitness_level = derived.fitness_level,
        "Onboarding questionnaire completed"
    );

    Ok(Json(QuestionnaireSubmitted {
        questionnaire,
        profile: user.into(),
    }))
}

pub async fn list_questionnaires(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<UserQuestionnaire>>> {
    let questionnaires = sqlx::query_as::<_, UserQuestionnaire>(
        "SELECT * FROM user_questionnaires WHERE user_id = $1 ORDER BY completed_at DESC",
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(questionnaires))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(id: &str, answer: serde_json::Value) -> QuestionnaireResponse {
        QuestionnaireResponse {
            question_id: id.into(),
            answer,
        }
    }

    #[test]
    fn test_experience_maps_to_fitness_level() {
        let beginner = derive_profile(&[response("experience", json!("Complete beginner"))]);
        assert_eq!(beginner.fitness_level, 1);

        let some = derive_profile(&[response("experience", json!("I train now and then"))]);
        assert_eq!(some.fitness_level, 2);

        let advanced = derive_profile(&[response("experience", json!("Very experienced"))]);
        assert_eq!(advanced.fitness_level, 3);
    }

    #[test]
    fn test_missing_experience_defaults_to_one() {
        let derived = derive_profile(&[response("goal", json!("Lose weight"))]);
        assert_eq!(derived.fitness_level, 1);
    }

    #[test]
    fn test_goals_combine_main_goal_and_focus_areas() {
        let derived = derive_profile(&[
            response("goal", json!("Build muscle")),
            response("focus_area", json!(["Upper body", "Core"])),
        ]);
        assert_eq!(
            derived.goals,
            vec!["Build muscle".to_string(), "Upper body".into(), "Core".into()]
        );
    }

    #[test]
    fn test_empty_answers_yield_no_goals() {
        let derived = derive_profile(&[response("goal", json!(""))]);
        assert!(derived.goals.is_empty());
    }
}
