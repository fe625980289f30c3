//! Biomechanical rule check: each active rule on the exercise template
//! names a measurement (angle, distance, or ratio over landmark indices)
//! and a min/max band. The average measurement over the observed frames is
//! checked against the band; violations deduct from a 100-point score by
//! severity. Rules are threshold rows, not a rule language.

use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::services::movement::{normalize_exercise_name, PoseFrame, SubScore};

#[derive(Debug, Clone, FromRow)]
pub struct BiomechanicalRule {
    #[allow(dead_code)]
    pub id: Uuid,
    pub rule_name: String,
    pub rule_type: String,
    pub body_parts: serde_json::Value,
    pub min_value: Option<f32>,
    pub max_value: Option<f32>,
    pub severity: String,
    pub correction_feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Measurement {
    Angle,
    Distance,
    Ratio,
}

pub async fn evaluate(
    db: &PgPool,
    exercise_name: &str,
    frames: &[PoseFrame],
) -> Result<SubScore, anyhow::Error> {
    let category = normalize_exercise_name(exercise_name);

    let rules = sqlx::query_as::<_, BiomechanicalRule>(
        r#"
        SELECT r.id, r.rule_name, r.rule_type, r.body_parts, r.min_value, r.max_value,
               r.severity, r.correction_feedback
        FROM biomechanical_rules r
        JOIN exercise_templates t ON t.id = r.template_id
        WHERE t.category = $1 AND r.is_active = TRUE
        "#,
    )
    .bind(&category)
    .fetch_all(db)
    .await?;

    if rules.is_empty() {
        anyhow::bail!("No biomechanical rules configured for '{}'", category);
    }

    Ok(score_against_rules(&rules, frames))
}

pub fn score_against_rules(rules: &[BiomechanicalRule], frames: &[PoseFrame]) -> SubScore {
    let mut penalty = 0i32;
    let mut violated: Vec<&BiomechanicalRule> = Vec::new();

    for rule in rules {
        let Some(measured) = measure(rule, frames) else {
            continue; // unmeasurable rule (bad indices or no frames) is skipped
        };

        let below = rule.min_value.is_some_and(|min| measured < f64::from(min));
        let above = rule.max_value.is_some_and(|max| measured > f64::from(max));
        if below || above {
            penalty += severity_penalty(&rule.severity);
            violated.push(rule);
        }
    }

    // Critical violations lead the feedback.
    violated.sort_by_key(|r| std::cmp::Reverse(severity_penalty(&r.severity)));

    let score = (100 - penalty).clamp(0, 100);
    let feedback = if violated.is_empty() {
        "Biomechanically sound execution.".into()
    } else {
        let corrections: Vec<&str> = violated
            .iter()
            .filter_map(|r| r.correction_feedback.as_deref())
            .take(2)
            .collect();
        if corrections.is_empty() {
            let names: Vec<&str> = violated.iter().map(|r| r.rule_name.as_str()).collect();
            format!("Rules triggered: {}.", names.join(", "))
        } else {
            corrections.join(" ")
        }
    };

    SubScore { score, feedback }
}

fn severity_penalty(severity: &str) -> i32 {
    match severity {
        "low" => 5,
        "medium" => 10,
        "high" => 15,
        "critical" => 25,
        _ => 10,
    }
}

/// Average measurement of the rule over all frames, or None if the rule's
/// landmark indices never resolve.
fn measure(rule: &BiomechanicalRule, frames: &[PoseFrame]) -> Option<f64> {
    let indices: Vec<usize> = serde_json::from_value(rule.body_parts.clone()).ok()?;
    let measurement: Measurement =
        serde_json::from_value(serde_json::Value::String(rule.rule_type.clone())).ok()?;

    let mut total = 0.0;
    let mut count = 0usize;
    for frame in frames {
        let value = match measurement {
            Measurement::Angle => {
                let [a, b, c] = indices.as_slice() else { return None };
                angle_at(frame, *a, *b, *c)
            }
            Measurement::Distance => {
                let [a, b] = indices.as_slice() else { return None };
                distance(frame, *a, *b)
            }
            Measurement::Ratio => {
                let [a, b, c, d] = indices.as_slice() else { return None };
                match (distance(frame, *a, *b), distance(frame, *c, *d)) {
                    (Some(n), Some(de)) if de > f64::EPSILON => Some(n / de),
                    _ => None,
                }
            }
        };
        if let Some(v) = value {
            total += v;
            count += 1;
        }
    }

    (count > 0).then(|| total / count as f64)
}

fn distance(frame: &PoseFrame, a: usize, b: usize) -> Option<f64> {
    let pa = frame.keypoints.get(a)?;
    let pb = frame.keypoints.get(b)?;
    Some(((pa.x - pb.x).powi(2) + (pa.y - pb.y).powi(2)).sqrt())
}

/// Angle in degrees at vertex `b` of the triangle a-b-c.
fn angle_at(frame: &PoseFrame, a: usize, b: usize, c: usize) -> Option<f64> {
    let pa = frame.keypoints.get(a)?;
    let pb = frame.keypoints.get(b)?;
    let pc = frame.keypoints.get(c)?;

    let v1 = (pa.x - pb.x, pa.y - pb.y);
    let v2 = (pc.x - pb.x, pc.y - pb.y);
    let dot = v1.0 * v2.0 + v1.1 * v2.1;
    let mag = (v1.0.powi(2) + v1.1.powi(2)).sqrt() * (v2.0.powi(2) + v2.1.powi(2)).sqrt();
    if mag <= f64::EPSILON {
        return None;
    }
    Some((dot / mag).clamp(-1.0, 1.0).acos().to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::movement::KeyPoint;

    fn frame_with(points: Vec<(f64, f64)>) -> PoseFrame {
        PoseFrame {
            keypoints: points
                .into_iter()
                .map(|(x, y)| KeyPoint { x, y, visibility: 0.9 })
                .collect(),
            timestamp_ms: 0.0,
        }
    }

    fn rule(
        rule_type: &str,
        body_parts: serde_json::Value,
        min: Option<f32>,
        max: Option<f32>,
        severity: &str,
    ) -> BiomechanicalRule {
        BiomechanicalRule {
            id: Uuid::new_v4(),
            rule_name: format!("{}-rule", rule_type),
            rule_type: rule_type.into(),
            body_parts,
            min_value: min,
            max_value: max,
            severity: severity.into(),
            correction_feedback: Some("Keep your joint angle in range.".into()),
        }
    }

    #[test]
    fn test_right_angle_measurement() {
        // a above vertex, c to the right of vertex: 90 degrees at b.
        let frame = frame_with(vec![(0.5, 0.2), (0.5, 0.5), (0.8, 0.5)]);
        let angle = angle_at(&frame, 0, 1, 2).unwrap();
        assert!((angle - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_rule_within_band_passes() {
        let frame = frame_with(vec![(0.5, 0.2), (0.5, 0.5), (0.8, 0.5)]);
        let rules = vec![rule(
            "angle",
            serde_json::json!([0, 1, 2]),
            Some(80.0),
            Some(100.0),
            "high",
        )];
        let result = score_against_rules(&rules, &[frame]);
        assert_eq!(result.score, 100);
        assert_eq!(result.feedback, "Biomechanically sound execution.");
    }

    #[test]
    fn test_violation_deducts_by_severity() {
        let frame = frame_with(vec![(0.5, 0.2), (0.5, 0.5), (0.8, 0.5)]);
        let rules = vec![
            rule("angle", serde_json::json!([0, 1, 2]), Some(120.0), None, "critical"),
            rule("distance", serde_json::json!([0, 1]), None, Some(0.1), "low"),
        ];
        let result = score_against_rules(&rules, &[frame]);
        // 90-degree angle under the 120 minimum (-25), 0.3 distance over 0.1 (-5)
        assert_eq!(result.score, 70);
        assert!(result.feedback.contains("Keep"));
    }

    #[test]
    fn test_score_floors_at_zero() {
        let frame = frame_with(vec![(0.5, 0.2), (0.5, 0.5), (0.8, 0.5)]);
        let rules: Vec<BiomechanicalRule> = (0..5)
            .map(|_| rule("angle", serde_json::json!([0, 1, 2]), Some(179.0), None, "critical"))
            .collect();
        let result = score_against_rules(&rules, &[frame]);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_unmeasurable_rule_is_skipped() {
        let frame = frame_with(vec![(0.5, 0.5)]);
        let rules = vec![rule("angle", serde_json::json!([0, 40, 41]), Some(10.0), None, "high")];
        let result = score_against_rules(&rules, &[frame]);
        assert_eq!(result.score, 100);
    }

    #[test]
    fn test_ratio_measurement() {
        // shoulder width 0.2, hip width 0.1 -> ratio 2.0
        let frame = frame_with(vec![(0.4, 0.3), (0.6, 0.3), (0.45, 0.6), (0.55, 0.6)]);
        let rules = vec![rule(
            "ratio",
            serde_json::json!([0, 1, 2, 3]),
            Some(2.5),
            None,
            "medium",
        )];
        let result = score_against_rules(&rules, &[frame]);
        assert_eq!(result.score, 90);
    }
}
