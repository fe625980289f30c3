//! Personalized plan generation and adjustment. The AI gateway produces
//! the plan; proficiency-driven adjustment is a three-band step controller
//! over sets/reps/difficulty with fixed caps and floors.

use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::plan::{
    AdaptPlanRequest, Exercise, ExerciseType, PlanDifficulty, PlanPreferences, PlanWithExercises,
    RecommendedExercise, WorkoutPlan,
};
use crate::models::user::User;
use crate::services::ai_gateway::{AiGateway, PlanPrefs};

const MAX_SETS: i32 = 6;
const MIN_SETS: i32 = 1;
const MAX_REPS: i32 = 20;
const MIN_REPS: i32 = 5;
const MAX_EXERCISE_DIFFICULTY: i32 = 5;
const MIN_EXERCISE_DIFFICULTY: i32 = 1;

pub async fn generate_personalized_plan(
    db: &PgPool,
    ai: &AiGateway,
    user_id: Uuid,
    preferences: PlanPreferences,
) -> AppResult<PlanWithExercises> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound("User not found".into()))?;

    let prefs = resolve_preferences(preferences, &user);
    let generated = ai.generate_workout_plan(&prefs).await;

    let plan = sqlx::query_as::<_, WorkoutPlan>(
        r#"
        INSERT INTO workout_plans (id, user_id, name, description, difficulty, is_active)
        VALUES ($1, $2, $3, $4, $5, TRUE)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&generated.name)
    .bind(&generated.description)
    .bind(generated.difficulty)
    .fetch_one(db)
    .await?;

    let exercise_difficulty = match generated.difficulty {
        PlanDifficulty::Beginner => 2,
        PlanDifficulty::Intermediate => 3,
        PlanDifficulty::Advanced => 4,
    };

    let mut exercises = Vec::with_capacity(generated.exercises.len());
    for generated_exercise in &generated.exercises {
        let exercise = sqlx::query_as::<_, Exercise>(
            r#"
            INSERT INTO exercises
                (id, plan_id, name, description, exercise_type, difficulty, target_muscles,
                 day, position, sets, reps)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(plan.id)
        .bind(&generated_exercise.name)
        .bind(&generated_exercise.instructions)
        .bind(ExerciseType::Strength)
        .bind(exercise_difficulty)
        .bind(generated_exercise.target_muscles.join(","))
        .bind(generated_exercise.day)
        .bind(generated_exercise.order)
        .bind(generated_exercise.sets)
        .bind(generated_exercise.reps)
        .fetch_one(db)
        .await?;
        exercises.push(exercise);
    }

    Ok(PlanWithExercises { plan, exercises })
}

fn resolve_preferences(preferences: PlanPreferences, user: &User) -> PlanPrefs {
    let profile_goals = || -> Vec<String> {
        user.goals
            .as_deref()
            .map(|g| {
                g.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_else(|| vec!["general_fitness".into()])
    };

    PlanPrefs {
        fitness_level: preferences.fitness_level.unwrap_or(user.fitness_level),
        goals: preferences.goals.unwrap_or_else(profile_goals),
        time_available: preferences.time_available.unwrap_or(45),
        equipment: preferences
            .equipment
            .unwrap_or_else(|| vec!["bodyweight".into(), "dumbbells".into()]),
        injuries: preferences.injuries.unwrap_or_default(),
    }
}

/// Adjust one exercise for a 0-100 proficiency score. Scores of 85 and up
/// step difficulty/volume up, 60 and below step down, the band between
/// leaves the exercise untouched.
pub fn adapt_exercise(exercise: &mut Exercise, score: i32) {
    if score >= 85 {
        exercise.difficulty = (exercise.difficulty + 1).min(MAX_EXERCISE_DIFFICULTY);
        if let Some(sets) = exercise.sets {
            exercise.sets = Some((sets + 1).min(MAX_SETS));
        }
        if let Some(reps) = exercise.reps {
            exercise.reps = Some(((f64::from(reps) * 1.2).floor() as i32).min(MAX_REPS));
        }
    } else if score <= 60 {
        exercise.difficulty = (exercise.difficulty - 1).max(MIN_EXERCISE_DIFFICULTY);
        if let Some(sets) = exercise.sets {
            exercise.sets = Some((sets - 1).max(MIN_SETS));
        }
        if let Some(reps) = exercise.reps {
            exercise.reps = Some(((f64::from(reps) * 0.8).floor() as i32).max(MIN_REPS));
        }
    }
}

pub async fn adapt_plan_to_proficiency(
    db: &PgPool,
    user_id: Uuid,
    plan_id: Uuid,
    request: &AdaptPlanRequest,
) -> AppResult<PlanWithExercises> {
    let plan = fetch_plan(db, user_id, plan_id).await?;

    let mut exercises = fetch_exercises(db, plan_id).await?;
    for exercise in &mut exercises {
        let score = request
            .exercise_scores
            .get(&exercise.name)
            .copied()
            .unwrap_or(request.overall_performance);

        adapt_exercise(exercise, score);

        sqlx::query(
            "UPDATE exercises SET difficulty = $2, sets = $3, reps = $4 WHERE id = $1",
        )
        .bind(exercise.id)
        .bind(exercise.difficulty)
        .bind(exercise.sets)
        .bind(exercise.reps)
        .execute(db)
        .await?;
    }

    Ok(PlanWithExercises { plan, exercises })
}

/// Clone a plan one notch harder. The progression starts inactive so the
/// user can switch when ready.
pub async fn generate_progression_plan(
    db: &PgPool,
    user_id: Uuid,
    plan_id: Uuid,
) -> AppResult<PlanWithExercises> {
    let current = fetch_plan(db, user_id, plan_id).await?;
    let current_exercises = fetch_exercises(db, plan_id).await?;

    let progression = sqlx::query_as::<_, WorkoutPlan>(
        r#"
        INSERT INTO workout_plans (id, user_id, name, description, difficulty, is_active)
        VALUES ($1, $2, $3, $4, $5, FALSE)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(format!("{} - Progression", current.name))
    .bind(format!("Advanced version of {}", current.name))
    .bind(PlanDifficulty::Advanced)
    .fetch_one(db)
    .await?;

    let mut exercises = Vec::with_capacity(current_exercises.len());
    for source in &current_exercises {
        let progressed = progress_exercise(source);
        let exercise = sqlx::query_as::<_, Exercise>(
            r#"
            INSERT INTO exercises
                (id, plan_id, name, description, exercise_type, difficulty, target_muscles,
                 day, position, sets, reps, duration_min, weight)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(progression.id)
        .bind(&source.name)
        .bind(&source.description)
        .bind(source.exercise_type)
        .bind(progressed.difficulty)
        .bind(&source.target_muscles)
        .bind(source.day)
        .bind(source.position)
        .bind(progressed.sets)
        .bind(progressed.reps)
        .bind(progressed.duration_min)
        .bind(progressed.weight)
        .fetch_one(db)
        .await?;
        exercises.push(exercise);
    }

    Ok(PlanWithExercises {
        plan: progression,
        exercises,
    })
}

struct ProgressedVolume {
    difficulty: i32,
    sets: Option<i32>,
    reps: Option<i32>,
    duration_min: Option<i32>,
    weight: Option<f32>,
}

fn progress_exercise(exercise: &Exercise) -> ProgressedVolume {
    ProgressedVolume {
        difficulty: (exercise.difficulty + 1).min(MAX_EXERCISE_DIFFICULTY),
        sets: exercise.sets.map(|s| (s + 1).min(MAX_SETS)),
        reps: exercise
            .reps
            .map(|r| ((f64::from(r) * 1.15).floor() as i32).min(MAX_REPS)),
        duration_min: exercise
            .duration_min
            .map(|d| ((f64::from(d) * 1.1).floor() as i32).min(60)),
        weight: exercise.weight.map(|w| w * 1.1),
    }
}

async fn fetch_plan(db: &PgPool, user_id: Uuid, plan_id: Uuid) -> AppResult<WorkoutPlan> {
    sqlx::query_as::<_, WorkoutPlan>(
        "SELECT * FROM workout_plans WHERE id = $1 AND user_id = $2",
    )
    .bind(plan_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .ok_or(AppError::NotFound("Workout plan not found".into()))
}

async fn fetch_exercises(db: &PgPool, plan_id: Uuid) -> AppResult<Vec<Exercise>> {
    Ok(sqlx::query_as::<_, Exercise>(
        "SELECT * FROM exercises WHERE plan_id = $1 ORDER BY day ASC, position ASC",
    )
    .bind(plan_id)
    .fetch_all(db)
    .await?)
}

const EXERCISE_CATALOG: &[(&str, &[RecommendedExercise])] = &[
    (
        "chest",
        &[
            RecommendedExercise {
                name: "Push-ups",
                exercise_type: ExerciseType::Strength,
                difficulty: 2,
                description: "Classic bodyweight chest exercise",
            },
            RecommendedExercise {
                name: "Bench Press",
                exercise_type: ExerciseType::Strength,
                difficulty: 3,
                description: "Compound chest exercise with weights",
            },
            RecommendedExercise {
                name: "Chest Flyes",
                exercise_type: ExerciseType::Strength,
                difficulty: 2,
                description: "Isolation exercise for chest development",
            },
        ],
    ),
    (
        "back",
        &[
            RecommendedExercise {
                name: "Pull-ups",
                exercise_type: ExerciseType::Strength,
                difficulty: 4,
                description: "Upper body pulling exercise",
            },
            RecommendedExercise {
                name: "Bent-over Rows",
                exercise_type: ExerciseType::Strength,
                difficulty: 3,
                description: "Back strengthening exercise",
            },
            RecommendedExercise {
                name: "Lat Pulldowns",
                exercise_type: ExerciseType::Strength,
                difficulty: 2,
                description: "Lat-focused pulling exercise",
            },
        ],
    ),
    (
        "legs",
        &[
            RecommendedExercise {
                name: "Squats",
                exercise_type: ExerciseType::Strength,
                difficulty: 2,
                description: "Fundamental lower body exercise",
            },
            RecommendedExercise {
                name: "Lunges",
                exercise_type: ExerciseType::Strength,
                difficulty: 2,
                description: "Single-leg strengthening exercise",
            },
            RecommendedExercise {
                name: "Deadlifts",
                exercise_type: ExerciseType::Strength,
                difficulty: 4,
                description: "Full-body compound movement",
            },
        ],
    ),
    (
        "core",
        &[
            RecommendedExercise {
                name: "Plank",
                exercise_type: ExerciseType::Strength,
                difficulty: 1,
                description: "Isometric core strengthening",
            },
            RecommendedExercise {
                name: "Bicycle Crunches",
                exercise_type: ExerciseType::Strength,
                difficulty: 2,
                description: "Dynamic core exercise",
            },
            RecommendedExercise {
                name: "Russian Twists",
                exercise_type: ExerciseType::Strength,
                difficulty: 2,
                description: "Rotational core movement",
            },
        ],
    ),
    (
        "cardio",
        &[
            RecommendedExercise {
                name: "Running",
                exercise_type: ExerciseType::Cardio,
                difficulty: 2,
                description: "Aerobic endurance exercise",
            },
            RecommendedExercise {
                name: "Jump Rope",
                exercise_type: ExerciseType::Cardio,
                difficulty: 3,
                description: "High-intensity cardio workout",
            },
            RecommendedExercise {
                name: "Burpees",
                exercise_type: ExerciseType::Cardio,
                difficulty: 4,
                description: "Full-body cardio exercise",
            },
        ],
    ),
];

/// Filter the fixed catalog by target muscles and proximity to the
/// requested difficulty; deduplicated, max 10 results.
pub fn recommended_exercises(target_muscles: &[String], difficulty: i32) -> Vec<RecommendedExercise> {
    let mut recommended = Vec::new();

    for muscle in target_muscles {
        let muscle = muscle.trim().to_lowercase();
        let Some((_, exercises)) = EXERCISE_CATALOG.iter().find(|(name, _)| *name == muscle)
        else {
            continue;
        };
        for exercise in exercises.iter() {
            if (exercise.difficulty - difficulty).abs() <= 1 {
                recommended.push(exercise.clone());
            }
        }
    }

    let mut unique: Vec<RecommendedExercise> = Vec::new();
    for exercise in recommended {
        if !unique.iter().any(|e| e.name == exercise.name) {
            unique.push(exercise);
        }
    }
    unique.truncate(10);
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(difficulty: i32, sets: Option<i32>, reps: Option<i32>) -> Exercise {
        Exercise {
            id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            name: "Squats".into(),
            description: None,
            exercise_type: ExerciseType::Strength,
            difficulty,
            target_muscles: Some("quadriceps,glutes".into()),
            day: 1,
            position: 1,
            sets,
            reps,
            duration_min: None,
            weight: None,
        }
    }

    #[test]
    fn test_adapt_high_score_steps_up() {
        let mut e = exercise(3, Some(3), Some(10));
        adapt_exercise(&mut e, 90);
        assert_eq!(e.difficulty, 4);
        assert_eq!(e.sets, Some(4));
        assert_eq!(e.reps, Some(12)); // floor(10 * 1.2)
    }

    #[test]
    fn test_adapt_high_score_respects_caps() {
        let mut e = exercise(5, Some(6), Some(19));
        adapt_exercise(&mut e, 90);
        assert_eq!(e.difficulty, 5);
        assert_eq!(e.sets, Some(6));
        assert_eq!(e.reps, Some(20)); // floor(19 * 1.2) = 22, capped
    }

    #[test]
    fn test_adapt_low_score_steps_down() {
        let mut e = exercise(3, Some(3), Some(10));
        adapt_exercise(&mut e, 50);
        assert_eq!(e.difficulty, 2);
        assert_eq!(e.sets, Some(2));
        assert_eq!(e.reps, Some(8)); // floor(10 * 0.8)
    }

    #[test]
    fn test_adapt_low_score_respects_floors() {
        let mut e = exercise(1, Some(1), Some(6));
        adapt_exercise(&mut e, 40);
        assert_eq!(e.difficulty, 1);
        assert_eq!(e.sets, Some(1));
        assert_eq!(e.reps, Some(5)); // floor(6 * 0.8) = 4, floored
    }

    #[test]
    fn test_adapt_middle_band_is_unchanged() {
        let mut e = exercise(3, Some(3), Some(10));
        adapt_exercise(&mut e, 75);
        assert_eq!(e.difficulty, 3);
        assert_eq!(e.sets, Some(3));
        assert_eq!(e.reps, Some(10));
    }

    #[test]
    fn test_adapt_skips_absent_volume_fields() {
        let mut e = exercise(2, None, None);
        adapt_exercise(&mut e, 95);
        assert_eq!(e.difficulty, 3);
        assert_eq!(e.sets, None);
        assert_eq!(e.reps, None);
    }

    #[test]
    fn test_progression_scaling() {
        let mut e = exercise(3, Some(3), Some(10));
        e.duration_min = Some(30);
        e.weight = Some(40.0);
        let p = progress_exercise(&e);
        assert_eq!(p.difficulty, 4);
        assert_eq!(p.sets, Some(4));
        assert_eq!(p.reps, Some(11)); // floor(10 * 1.15)
        assert_eq!(p.duration_min, Some(33));
        assert!((p.weight.unwrap() - 44.0).abs() < 1e-4);
    }

    #[test]
    fn test_recommended_filters_by_difficulty_proximity() {
        let muscles = vec!["back".to_string()];
        let names: Vec<&str> = recommended_exercises(&muscles, 2)
            .iter()
            .map(|e| e.name)
            .collect();
        // Pull-ups (difficulty 4) is more than 1 away from 2.
        assert_eq!(names, vec!["Bent-over Rows", "Lat Pulldowns"]);
    }

    #[test]
    fn test_recommended_dedupes_and_caps() {
        let muscles = vec!["chest".to_string(), "chest".to_string(), "legs".to_string()];
        let recommended = recommended_exercises(&muscles, 2);
        let names: Vec<&str> = recommended.iter().map(|e| e.name).collect();
        let mut deduped = names.clone();
        deduped.dedup();
        assert_eq!(names, deduped);
        assert!(recommended.len() <= 10);
    }

    #[test]
    fn test_unknown_muscle_group_is_ignored() {
        let muscles = vec!["forearms".to_string()];
        assert!(recommended_exercises(&muscles, 2).is_empty());
    }
}
