//! Reference-execution comparison: the observed pose frames are scored by
//! mean landmark deviation from the exemplar keypoints stored on the
//! exercise template. An exercise without a stored exemplar is a leg
//! failure, handled upstream by the fallback substitution.

use sqlx::PgPool;

use crate::services::movement::{normalize_exercise_name, PoseFrame, SubScore};

/// Mean landmark deviation at which similarity bottoms out at zero.
const DEVIATION_TOLERANCE: f64 = 0.25;

pub async fn compare_with_reference(
    db: &PgPool,
    exercise_name: &str,
    frames: &[PoseFrame],
) -> Result<SubScore, anyhow::Error> {
    let category = normalize_exercise_name(exercise_name);

    let reference_blob = sqlx::query_scalar::<_, Option<serde_json::Value>>(
        "SELECT reference_keypoints FROM exercise_templates WHERE category = $1",
    )
    .bind(&category)
    .fetch_optional(db)
    .await?
    .flatten()
    .ok_or_else(|| anyhow::anyhow!("No reference execution stored for '{}'", category))?;

    let reference: Vec<PoseFrame> = serde_json::from_value(reference_blob)?;
    if reference.is_empty() {
        anyhow::bail!("Reference execution for '{}' has no frames", category);
    }

    let score = similarity_score(&reference, frames);
    Ok(SubScore {
        score,
        feedback: similarity_feedback(score),
    })
}

/// Similarity in 0-100: mean Euclidean distance between corresponding
/// landmarks over the overlapping frame prefix, mapped linearly so a
/// deviation of `DEVIATION_TOLERANCE` or more scores zero.
pub fn similarity_score(reference: &[PoseFrame], observed: &[PoseFrame]) -> i32 {
    let frame_count = reference.len().min(observed.len());
    if frame_count == 0 {
        return 0;
    }

    let mut total = 0.0;
    let mut count = 0usize;
    for i in 0..frame_count {
        let points = reference[i].keypoints.len().min(observed[i].keypoints.len());
        for j in 0..points {
            let r = &reference[i].keypoints[j];
            let o = &observed[i].keypoints[j];
            total += ((r.x - o.x).powi(2) + (r.y - o.y).powi(2)).sqrt();
            count += 1;
        }
    }

    if count == 0 {
        return 0;
    }

    let mean_deviation = total / count as f64;
    let similarity = 1.0 - (mean_deviation / DEVIATION_TOLERANCE).min(1.0);
    (similarity * 100.0).round() as i32
}

fn similarity_feedback(score: i32) -> String {
    if score >= 85 {
        "Your movement closely matches the reference execution.".into()
    } else if score >= 70 {
        "Good match with the reference. Keep your positioning consistent.".into()
    } else {
        "Your movement drifts from the reference. Focus on matching the demonstrated positions."
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::movement::KeyPoint;

    fn frame(offset: f64) -> PoseFrame {
        PoseFrame {
            keypoints: (0..13)
                .map(|i| KeyPoint {
                    x: 0.4 + offset,
                    y: 0.1 + f64::from(i) * 0.06,
                    visibility: 0.9,
                })
                .collect(),
            timestamp_ms: 0.0,
        }
    }

    #[test]
    fn test_identical_frames_score_perfect() {
        let reference = vec![frame(0.0), frame(0.0)];
        let observed = vec![frame(0.0), frame(0.0)];
        assert_eq!(similarity_score(&reference, &observed), 100);
    }

    #[test]
    fn test_deviation_lowers_score() {
        let reference = vec![frame(0.0)];
        let near = vec![frame(0.05)];
        let far = vec![frame(0.2)];
        let near_score = similarity_score(&reference, &near);
        let far_score = similarity_score(&reference, &far);
        assert!(near_score > far_score);
        assert_eq!(near_score, 80); // 0.05 / 0.25 tolerance
        assert_eq!(far_score, 20);
    }

    #[test]
    fn test_beyond_tolerance_scores_zero() {
        let reference = vec![frame(0.0)];
        let observed = vec![frame(0.5)];
        assert_eq!(similarity_score(&reference, &observed), 0);
    }

    #[test]
    fn test_empty_observation_scores_zero() {
        let reference = vec![frame(0.0)];
        assert_eq!(similarity_score(&reference, &[]), 0);
    }

    #[test]
    fn test_feedback_bands_carry_cue_words() {
        assert!(similarity_feedback(90).contains("closely matches"));
        assert!(similarity_feedback(75).contains("Keep"));
        assert!(similarity_feedback(40).contains("Focus"));
    }
}
