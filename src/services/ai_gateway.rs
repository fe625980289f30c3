//! Wrapper around the Claude messages API. One method per task, each with
//! a fixed prompt template and an expected JSON shape. Remote failures on
//! the plan and nutrition paths are swallowed and replaced with fixed
//! fallback objects; the movement-form path propagates the error so the
//! analysis synthesizer can substitute its own per-leg fallback. No retry,
//! no backoff, no circuit breaker.

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::Config;
use crate::models::plan::PlanDifficulty;
use crate::services::movement::PoseFrame;

#[derive(Clone)]
pub struct AiGateway {
    http: reqwest::Client,
    api_key: String,
    model: String,
    dev_mode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormAssessment {
    #[serde(default = "default_form_score")]
    pub form_score: i32,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub corrections: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
}

fn default_form_score() -> i32 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedPlan {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: PlanDifficulty,
    #[serde(default)]
    pub duration: i32,
    #[serde(default)]
    pub exercises: Vec<GeneratedExercise>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedExercise {
    pub name: String,
    #[serde(default = "default_sets")]
    pub sets: i32,
    #[serde(default = "default_reps", deserialize_with = "reps_lenient")]
    pub reps: i32,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub target_muscles: Vec<String>,
    #[serde(default = "default_day")]
    pub day: i32,
    #[serde(default)]
    pub order: i32,
}

fn default_sets() -> i32 {
    3
}

fn default_reps() -> i32 {
    10
}

fn default_day() -> i32 {
    1
}

/// Models routinely answer `"reps": "8-12"` despite being asked for a
/// number. Accept either form; a range resolves to its upper bound.
fn reps_lenient<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_i64().unwrap_or(10) as i32,
        serde_json::Value::String(s) => s
            .split(|c: char| !c.is_ascii_digit())
            .filter_map(|part| part.parse::<i32>().ok())
            .max()
            .unwrap_or(10),
        _ => 10,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionAdvice {
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub meal_suggestions: Vec<String>,
    #[serde(default)]
    pub tips: Vec<String>,
}

/// Preferences after merging request fields with the user's profile.
#[derive(Debug, Clone)]
pub struct PlanPrefs {
    pub fitness_level: i32,
    pub goals: Vec<String>,
    pub time_available: i32,
    pub equipment: Vec<String>,
    pub injuries: Vec<String>,
}

impl AiGateway {
    pub fn new(config: &Config) -> Self {
        Self {
            // 30-second timeout to prevent indefinite hangs
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            api_key: config.claude_api_key.clone(),
            model: config.claude_model.clone(),
            dev_mode: config.dev_mode,
        }
    }

    async fn complete(&self, prompt: &str) -> Result<serde_json::Value, anyhow::Error> {
        let response = self
            .http
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&serde_json::json!({
                "model": self.model,
                "max_tokens": 1500,
                "messages": [{
                    "role": "user",
                    "content": prompt
                }]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Claude API error {}: {}", status, body);
        }

        let envelope: serde_json::Value = response.json().await?;
        let text = envelope["content"][0]["text"].as_str().unwrap_or("{}");
        Ok(serde_json::from_str(text)?)
    }

    /// Judge movement form from pose keypoints. Propagates remote failures;
    /// the caller substitutes its per-leg fallback.
    pub async fn analyze_movement_form(
        &self,
        exercise_name: &str,
        frames: &[PoseFrame],
    ) -> Result<FormAssessment, anyhow::Error> {
        if self.dev_mode {
            tracing::debug!(exercise = exercise_name, "Dev mode: skipping form analysis call");
            return Ok(dev_form_assessment(exercise_name));
        }

        let prompt = format!(
            r#"You are an expert personal trainer and biomechanics analyst. Analyze the movement form for the exercise "{}" based on the following pose keypoint data:

Keypoints: {}

Provide a form score (1-100), overall feedback, specific corrections needed, and movement strengths observed.

Respond with JSON in this exact format:
{{
  "formScore": number,
  "feedback": "string",
  "corrections": ["string"],
  "strengths": ["string"]
}}"#,
            exercise_name,
            serde_json::to_string(frames)?,
        );

        let parsed = self.complete(&prompt).await?;
        let mut assessment: FormAssessment = serde_json::from_value(parsed)?;
        assessment.form_score = assessment.form_score.clamp(1, 100);
        Ok(assessment)
    }

    /// Generate a structured workout plan. Never fails: any remote or parse
    /// error yields the fixed two-exercise fallback plan.
    pub async fn generate_workout_plan(&self, prefs: &PlanPrefs) -> GeneratedPlan {
        if self.dev_mode {
            tracing::debug!("Dev mode: skipping plan generation call");
            return fallback_plan(prefs);
        }

        let prompt = format!(
            r#"Generate a personalized workout plan based on these preferences:
- Fitness Level: {} (1-5)
- Goals: {}
- Time Available: {} minutes
- Equipment: {}
- Injuries or limitations: {}

Create a comprehensive workout plan with exercises, sets, and reps.

Return the response in this exact JSON format:
{{
  "name": "string",
  "description": "string",
  "difficulty": "beginner|intermediate|advanced",
  "duration": number,
  "exercises": [
    {{
      "name": "string",
      "sets": number,
      "reps": number,
      "instructions": "string",
      "targetMuscles": ["string"],
      "day": number,
      "order": number
    }}
  ]
}}"#,
            prefs.fitness_level,
            join_or(&prefs.goals, "general fitness"),
            prefs.time_available,
            join_or(&prefs.equipment, "bodyweight"),
            join_or(&prefs.injuries, "none"),
        );

        match self.complete(&prompt).await {
            Ok(parsed) => match serde_json::from_value::<GeneratedPlan>(parsed) {
                Ok(plan) if !plan.exercises.is_empty() => plan,
                Ok(_) => {
                    tracing::warn!("Plan generation returned no exercises, using fallback plan");
                    fallback_plan(prefs)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Plan generation response malformed, using fallback plan");
                    fallback_plan(prefs)
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Claude API unavailable, using fallback plan");
                fallback_plan(prefs)
            }
        }
    }

    /// Nutrition advice for the user's goals. Never fails: falls back to a
    /// fixed set of recommendations.
    pub async fn nutrition_advice(
        &self,
        goals: &[String],
        current_weight: Option<f64>,
        target_weight: Option<f64>,
    ) -> NutritionAdvice {
        if self.dev_mode {
            tracing::debug!("Dev mode: skipping nutrition advice call");
            return fallback_nutrition_advice();
        }

        let mut prompt = format!(
            "Provide nutrition advice for someone with these fitness goals: {}\n",
            join_or(goals, "general fitness"),
        );
        if let Some(w) = current_weight {
            prompt.push_str(&format!("Current weight: {}kg\n", w));
        }
        if let Some(w) = target_weight {
            prompt.push_str(&format!("Target weight: {}kg\n", w));
        }
        prompt.push_str(
            r#"
Provide practical nutrition recommendations, meal suggestions, and tips.

Respond with JSON in this exact format:
{
  "recommendations": ["string"],
  "mealSuggestions": ["string"],
  "tips": ["string"]
}"#,
        );

        match self.complete(&prompt).await {
            Ok(parsed) => serde_json::from_value(parsed).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Nutrition response malformed, using fallback advice");
                fallback_nutrition_advice()
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Claude API unavailable, using fallback advice");
                fallback_nutrition_advice()
            }
        }
    }
}

fn join_or(items: &[String], default: &str) -> String {
    if items.is_empty() {
        default.to_string()
    } else {
        items.join(", ")
    }
}

fn dev_form_assessment(exercise_name: &str) -> FormAssessment {
    FormAssessment {
        form_score: 78,
        feedback: format!(
            "Good form overall with room for improvement. Focus on maintaining proper alignment throughout the movement. (Exercise: {})",
            exercise_name
        ),
        corrections: vec![
            "Keep your core engaged throughout the entire movement".into(),
            "Maintain neutral spine alignment".into(),
            "Control the tempo - avoid rushing through the exercise".into(),
        ],
        strengths: vec![
            "Good range of motion".into(),
            "Consistent movement pattern".into(),
            "Proper breathing technique".into(),
        ],
    }
}

fn fallback_plan(prefs: &PlanPrefs) -> GeneratedPlan {
    let primary_goal = prefs
        .goals
        .first()
        .cloned()
        .unwrap_or_else(|| "Strength".into());

    GeneratedPlan {
        name: format!("{} Training Plan", primary_goal),
        description: format!("A personalized {}-minute workout", prefs.time_available),
        difficulty: PlanDifficulty::from_fitness_level(prefs.fitness_level),
        duration: prefs.time_available,
        exercises: vec![
            GeneratedExercise {
                name: "Push-ups".into(),
                sets: 3,
                reps: 12,
                instructions: Some("Keep body straight, lower chest to ground".into()),
                target_muscles: vec!["chest".into(), "shoulders".into(), "triceps".into()],
                day: 1,
                order: 1,
            },
            GeneratedExercise {
                name: "Squats".into(),
                sets: 3,
                reps: 15,
                instructions: Some("Lower hips back and down, keep chest up".into()),
                target_muscles: vec!["quadriceps".into(), "glutes".into()],
                day: 1,
                order: 2,
            },
        ],
    }
}

fn fallback_nutrition_advice() -> NutritionAdvice {
    NutritionAdvice {
        recommendations: vec![
            "Focus on whole, unprocessed foods".into(),
            "Maintain a balanced intake of protein, carbs, and healthy fats".into(),
            "Stay hydrated with 8-10 glasses of water daily".into(),
        ],
        meal_suggestions: vec![
            "Breakfast: Greek yogurt with berries and nuts".into(),
            "Lunch: Grilled chicken with quinoa and vegetables".into(),
            "Dinner: Salmon with sweet potato and broccoli".into(),
            "Snack: Apple with almond butter".into(),
        ],
        tips: vec![
            "Meal prep on weekends to save time".into(),
            "Eat protein with every meal to maintain satiety".into(),
            "Include colorful vegetables for essential vitamins".into(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reps_accepts_number_and_range() {
        let json = r#"{"name": "Push-ups", "reps": 12}"#;
        let ex: GeneratedExercise = serde_json::from_str(json).unwrap();
        assert_eq!(ex.reps, 12);

        let json = r#"{"name": "Push-ups", "reps": "8-12"}"#;
        let ex: GeneratedExercise = serde_json::from_str(json).unwrap();
        assert_eq!(ex.reps, 12);

        let json = r#"{"name": "Push-ups", "reps": "about ten"}"#;
        let ex: GeneratedExercise = serde_json::from_str(json).unwrap();
        assert_eq!(ex.reps, 10);
    }

    #[test]
    fn test_fallback_plan_difficulty_bands() {
        let prefs = |level| PlanPrefs {
            fitness_level: level,
            goals: vec![],
            time_available: 30,
            equipment: vec![],
            injuries: vec![],
        };
        assert_eq!(fallback_plan(&prefs(1)).difficulty, PlanDifficulty::Beginner);
        assert_eq!(fallback_plan(&prefs(2)).difficulty, PlanDifficulty::Intermediate);
        assert_eq!(fallback_plan(&prefs(4)).difficulty, PlanDifficulty::Advanced);
    }

    #[test]
    fn test_fallback_plan_has_two_exercises() {
        let plan = fallback_plan(&PlanPrefs {
            fitness_level: 2,
            goals: vec!["Build muscle".into()],
            time_available: 45,
            equipment: vec!["dumbbells".into()],
            injuries: vec![],
        });
        assert_eq!(plan.exercises.len(), 2);
        assert_eq!(plan.name, "Build muscle Training Plan");
        assert_eq!(plan.exercises[0].day, 1);
        assert_eq!(plan.exercises[1].order, 2);
    }
}
