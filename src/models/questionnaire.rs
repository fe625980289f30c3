use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserQuestionnaire {
    pub id: Uuid,
    pub user_id: Uuid,
    pub questionnaire_type: String,
    pub responses: serde_json::Value,
    pub completed_at: DateTime<Utc>,
}

/// One answered question. `answer` is a string or an array of strings
/// depending on the question type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireResponse {
    pub question_id: String,
    pub answer: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitQuestionnaireRequest {
    pub questionnaire_type: Option<String>,
    pub responses: Vec<QuestionnaireResponse>,
}
