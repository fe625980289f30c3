//! Achievement rules and level computation. Rules are a fixed, ordered
//! list of predicates over the user's stats and recent activity, evaluated
//! in declaration order with no early exit. Achievements are append-only
//! and never retracted; the (user, type, title) unique index in the
//! database is the final authority against double inserts.

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use rand::seq::SliceRandom;
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::achievement::{Achievement, LevelInfo};
use crate::models::analysis::MovementAnalysis;
use crate::models::session::{UserStats, WorkoutSession};

pub struct AchievementRule {
    pub achievement_type: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub points: i32,
    predicate: fn(&EvaluationContext) -> bool,
}

impl AchievementRule {
    pub fn key(&self) -> String {
        format!("{}-{}", self.achievement_type, self.title)
    }
}

/// Everything a rule predicate may look at. `sessions` and `analyses` are
/// ordered most recent first.
pub struct EvaluationContext<'a> {
    pub stats: &'a UserStats,
    pub sessions: &'a [WorkoutSession],
    pub analyses: &'a [MovementAnalysis],
    pub now: DateTime<Utc>,
}

pub const ACHIEVEMENT_RULES: &[AchievementRule] = &[
    AchievementRule {
        achievement_type: "streak",
        title: "7-Day Streak",
        description: "Completed workouts for 7 days in a row!",
        points: 100,
        predicate: |ctx| ctx.stats.current_streak >= 7,
    },
    AchievementRule {
        achievement_type: "streak",
        title: "30-Day Streak",
        description: "Incredible! 30 days of consistent workouts!",
        points: 100,
        predicate: |ctx| ctx.stats.current_streak >= 30,
    },
    AchievementRule {
        achievement_type: "perfectionist",
        title: "Perfectionist",
        description: "Achieved 95%+ form accuracy in a workout!",
        points: 100,
        predicate: |ctx| ctx.analyses.iter().any(|a| a.form_score >= 95),
    },
    AchievementRule {
        achievement_type: "explorer",
        title: "Exercise Explorer",
        description: "Tried 10 different types of exercises!",
        points: 100,
        predicate: |ctx| {
            let unique: HashSet<&str> = ctx.sessions.iter().map(|s| s.name.as_str()).collect();
            unique.len() >= 10
        },
    },
    AchievementRule {
        achievement_type: "milestone",
        title: "Century Club",
        description: "Completed 100 workouts!",
        points: 100,
        predicate: |ctx| ctx.stats.total_workouts >= 100,
    },
    AchievementRule {
        achievement_type: "milestone",
        title: "Calorie Crusher",
        description: "Burned over 10,000 calories total!",
        points: 100,
        predicate: |ctx| ctx.stats.total_calories_burned >= 10_000,
    },
    AchievementRule {
        achievement_type: "consistency",
        title: "Weekend Warrior",
        description: "Worked out on both weekend days!",
        points: 100,
        predicate: |ctx| {
            let weekend_days: HashSet<Weekday> = ctx
                .sessions
                .iter()
                .filter(|s| ctx.now - s.completed_at < Duration::days(7))
                .map(|s| s.completed_at.weekday())
                .filter(|d| matches!(d, Weekday::Sat | Weekday::Sun))
                .collect();
            weekend_days.len() >= 2
        },
    },
    AchievementRule {
        achievement_type: "improvement",
        title: "Form Master",
        description: "Improved movement form by 20% or more!",
        points: 100,
        predicate: |ctx| {
            if ctx.analyses.len() < 2 {
                return false;
            }
            let recent = &ctx.analyses[..ctx.analyses.len().min(5)];
            let older = &ctx.analyses[ctx.analyses.len().saturating_sub(5)..];
            mean_score(recent) - mean_score(older) >= 20.0
        },
    },
];

fn mean_score(analyses: &[MovementAnalysis]) -> f64 {
    if analyses.is_empty() {
        return 0.0;
    }
    analyses.iter().map(|a| f64::from(a.form_score)).sum::<f64>() / analyses.len() as f64
}

/// Rules that are satisfied and not yet recorded, in declaration order.
pub fn evaluate_new(
    ctx: &EvaluationContext,
    existing_keys: &HashSet<String>,
) -> Vec<&'static AchievementRule> {
    ACHIEVEMENT_RULES
        .iter()
        .filter(|rule| !existing_keys.contains(&rule.key()) && (rule.predicate)(ctx))
        .collect()
}

/// Evaluate all rules for the user and insert a row for every newly
/// satisfied one. Returns only the achievements created by this call, so a
/// second run with no new activity returns an empty list.
pub async fn check_achievements(db: &PgPool, user_id: Uuid) -> AppResult<Vec<Achievement>> {
    let Some(stats) = sqlx::query_as::<_, UserStats>(
        "SELECT * FROM user_stats WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?
    else {
        return Ok(Vec::new());
    };

    let existing_keys: HashSet<String> = sqlx::query_as::<_, (String, String)>(
        "SELECT achievement_type, title FROM achievements WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?
    .into_iter()
    .map(|(t, title)| format!("{}-{}", t, title))
    .collect();

    let sessions = sqlx::query_as::<_, WorkoutSession>(
        "SELECT * FROM workout_sessions WHERE user_id = $1 ORDER BY completed_at DESC LIMIT 100",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    let analyses = sqlx::query_as::<_, MovementAnalysis>(
        "SELECT * FROM movement_analyses WHERE user_id = $1 ORDER BY created_at DESC LIMIT 50",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    let ctx = EvaluationContext {
        stats: &stats,
        sessions: &sessions,
        analyses: &analyses,
        now: Utc::now(),
    };

    let mut earned = Vec::new();
    for rule in evaluate_new(&ctx, &existing_keys) {
        // ON CONFLICT: a concurrent check for the same user may have won the
        // race; the unique index makes that a no-op instead of a duplicate.
        let inserted = sqlx::query_as::<_, Achievement>(
            r#"
            INSERT INTO achievements (id, user_id, achievement_type, title, description, points)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, achievement_type, title) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(rule.achievement_type)
        .bind(rule.title)
        .bind(rule.description)
        .bind(rule.points)
        .fetch_optional(db)
        .await?;

        if let Some(achievement) = inserted {
            tracing::info!(user_id = %user_id, title = rule.title, "Achievement earned");
            earned.push(achievement);
        }
    }

    Ok(earned)
}

const LEVEL_TITLES: [&str; 10] = [
    "Fitness Newbie",
    "Workout Warrior",
    "Strength Seeker",
    "Endurance Expert",
    "Fitness Fanatic",
    "Training Titan",
    "Exercise Elite",
    "Gym Guardian",
    "Fitness Master",
    "Legendary Lifter",
];

/// Stateless XP/level derivation from stats and achievement count.
pub fn calculate_level(stats: &UserStats, achievement_count: i64) -> LevelInfo {
    let mut xp = i64::from(stats.total_workouts) * 10;
    xp += achievement_count * 50;
    xp += i64::from(stats.current_streak * 5).min(200);
    xp += i64::from(stats.total_calories_burned) / 100;

    let level = (xp / 1000 + 1) as i32;
    let xp_to_next_level = 1000 - xp % 1000;

    let title_index = (((level - 1) / 5) as usize).min(LEVEL_TITLES.len() - 1);

    LevelInfo {
        level,
        xp,
        xp_to_next_level,
        title: LEVEL_TITLES[title_index],
    }
}

pub async fn user_level(db: &PgPool, user_id: Uuid) -> AppResult<LevelInfo> {
    let stats = sqlx::query_as::<_, UserStats>("SELECT * FROM user_stats WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(db)
        .await?;

    let achievement_count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM achievements WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(db)
            .await?;

    Ok(calculate_level(&stats, achievement_count))
}

const DEFAULT_MESSAGES: [&str; 5] = [
    "Every workout counts! You've got this!",
    "Progress, not perfection. Keep moving forward!",
    "Your future self will thank you for today's effort!",
    "Strong people don't get it easy, they get it by working hard!",
    "The only workout you regret is the one you didn't do!",
];

pub async fn motivational_message(db: &PgPool, user_id: Uuid) -> AppResult<String> {
    let stats = sqlx::query_as::<_, UserStats>("SELECT * FROM user_stats WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?;

    let latest_achievement = sqlx::query_as::<_, Achievement>(
        "SELECT * FROM achievements WHERE user_id = $1 ORDER BY earned_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;

    let mut messages = Vec::new();

    if let Some(stats) = &stats {
        if stats.current_streak >= 7 {
            messages.push(format!(
                "Amazing! You're on a {}-day streak!",
                stats.current_streak
            ));
        } else if stats.current_streak >= 3 {
            messages.push(format!(
                "Great momentum! {} days and counting!",
                stats.current_streak
            ));
        }

        if stats.weekly_goal > 0 {
            if stats.weekly_progress >= stats.weekly_goal {
                messages.push("You've smashed your weekly goal! Time to celebrate!".into());
            } else if stats.weekly_progress == stats.weekly_goal - 1 {
                messages.push("So close! One more workout to hit your weekly goal!".into());
            }
        }
    }

    if let Some(achievement) = &latest_achievement {
        if Utc::now() - achievement.earned_at < Duration::hours(24) {
            messages.push(format!(
                "Congratulations on earning \"{}\"!",
                achievement.title
            ));
        }
    }

    if messages.is_empty() {
        messages.push(
            DEFAULT_MESSAGES
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or(DEFAULT_MESSAGES[0])
                .to_string(),
        );
    }

    Ok(messages
        .choose(&mut rand::thread_rng())
        .cloned()
        .unwrap_or_else(|| DEFAULT_MESSAGES[0].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(workouts: i32, calories: i32, streak: i32) -> UserStats {
        UserStats {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            current_streak: streak,
            longest_streak: streak,
            total_workouts: workouts,
            total_calories_burned: calories,
            weekly_goal: 4,
            weekly_progress: 0,
            last_workout_date: None,
            updated_at: Utc::now(),
        }
    }

    fn session(name: &str, completed_at: DateTime<Utc>) -> WorkoutSession {
        WorkoutSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan_id: None,
            name: name.into(),
            session_type: "strength".into(),
            duration_min: 30,
            calories_burned: Some(200),
            intensity: None,
            completed_at,
        }
    }

    fn analysis(form_score: i32) -> MovementAnalysis {
        MovementAnalysis {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            session_id: None,
            exercise_name: "Squats".into(),
            video_data: None,
            form_score,
            analysis_result: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_xp_formula() {
        let info = calculate_level(&stats(156, 23_450, 12), 4);
        // 1560 + 200 + 60 + 234 = 2054
        assert_eq!(info.xp, 2054);
        assert_eq!(info.level, 3);
        assert_eq!(info.xp_to_next_level, 946);
        assert_eq!(info.title, "Fitness Newbie");
    }

    #[test]
    fn test_xp_streak_bonus_is_capped() {
        let low = calculate_level(&stats(0, 0, 40), 0);
        let high = calculate_level(&stats(0, 0, 400), 0);
        assert_eq!(low.xp, 200);
        assert_eq!(high.xp, 200);
    }

    #[test]
    fn test_xp_monotonic_in_each_input() {
        let base = calculate_level(&stats(10, 1000, 2), 1);
        assert!(calculate_level(&stats(11, 1000, 2), 1).xp > base.xp);
        assert!(calculate_level(&stats(10, 1100, 2), 1).xp > base.xp);
        assert!(calculate_level(&stats(10, 1000, 3), 1).xp > base.xp);
        assert!(calculate_level(&stats(10, 1000, 2), 2).xp > base.xp);
    }

    #[test]
    fn test_level_title_buckets() {
        // Level 6 falls in the second title bucket (one step every 5 levels).
        let info = calculate_level(&stats(500, 0, 0), 0); // 5000 XP -> level 6
        assert_eq!(info.level, 6);
        assert_eq!(info.title, "Workout Warrior");

        // Far beyond the ladder clamps to the last title.
        let info = calculate_level(&stats(10_000, 0, 0), 0); // level 101
        assert_eq!(info.title, "Legendary Lifter");
    }

    #[test]
    fn test_streak_rules_fire_in_order() {
        let s = stats(1, 0, 30);
        let ctx = EvaluationContext {
            stats: &s,
            sessions: &[],
            analyses: &[],
            now: Utc::now(),
        };
        let new = evaluate_new(&ctx, &HashSet::new());
        let titles: Vec<&str> = new.iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["7-Day Streak", "30-Day Streak"]);
    }

    #[test]
    fn test_already_recorded_rules_are_skipped() {
        let s = stats(150, 20_000, 10);
        let ctx = EvaluationContext {
            stats: &s,
            sessions: &[],
            analyses: &[],
            now: Utc::now(),
        };

        let first: HashSet<String> = evaluate_new(&ctx, &HashSet::new())
            .iter()
            .map(|r| r.key())
            .collect();
        assert!(!first.is_empty());

        // Second pass with everything recorded finds nothing new.
        assert!(evaluate_new(&ctx, &first).is_empty());
    }

    #[test]
    fn test_perfectionist_requires_95() {
        let s = stats(1, 0, 0);
        let analyses = vec![analysis(94)];
        let ctx = EvaluationContext {
            stats: &s,
            sessions: &[],
            analyses: &analyses,
            now: Utc::now(),
        };
        assert!(evaluate_new(&ctx, &HashSet::new()).is_empty());

        let analyses = vec![analysis(95)];
        let ctx = EvaluationContext {
            stats: &s,
            sessions: &[],
            analyses: &analyses,
            now: Utc::now(),
        };
        let titles: Vec<&str> = evaluate_new(&ctx, &HashSet::new())
            .iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["Perfectionist"]);
    }

    #[test]
    fn test_weekend_warrior_needs_both_days() {
        let now = Utc::now();
        // Any 7 consecutive days contain exactly one Saturday and one Sunday.
        let weekend: Vec<DateTime<Utc>> = (0..7)
            .map(|k| now - Duration::days(k))
            .filter(|d| matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .collect();
        assert_eq!(weekend.len(), 2);

        let s = stats(2, 0, 0);
        let sessions = vec![
            session("Leg day", weekend[0]),
            session("Cardio", weekend[1]),
        ];
        let ctx = EvaluationContext {
            stats: &s,
            sessions: &sessions,
            analyses: &[],
            now,
        };
        let titles: Vec<&str> = evaluate_new(&ctx, &HashSet::new())
            .iter()
            .map(|r| r.title)
            .collect();
        assert!(titles.contains(&"Weekend Warrior"));

        let sessions = vec![session("Leg day", weekend[0])];
        let ctx = EvaluationContext {
            stats: &s,
            sessions: &sessions,
            analyses: &[],
            now,
        };
        let titles: Vec<&str> = evaluate_new(&ctx, &HashSet::new())
            .iter()
            .map(|r| r.title)
            .collect();
        assert!(!titles.contains(&"Weekend Warrior"));
    }

    #[test]
    fn test_form_master_improvement_threshold() {
        let s = stats(1, 0, 0);
        // Most recent first: five 90s followed by five 65s -> +25 improvement.
        let analyses: Vec<MovementAnalysis> = [90, 90, 90, 90, 90, 65, 65, 65, 65, 65]
            .iter()
            .map(|&score| analysis(score))
            .collect();
        let ctx = EvaluationContext {
            stats: &s,
            sessions: &[],
            analyses: &analyses,
            now: Utc::now(),
        };
        let titles: Vec<&str> = evaluate_new(&ctx, &HashSet::new())
            .iter()
            .map(|r| r.title)
            .collect();
        assert!(titles.contains(&"Form Master"));

        // A single analysis can never qualify.
        let analyses = vec![analysis(99)];
        let ctx = EvaluationContext {
            stats: &s,
            sessions: &[],
            analyses: &analyses,
            now: Utc::now(),
        };
        let titles: Vec<&str> = evaluate_new(&ctx, &HashSet::new())
            .iter()
            .map(|r| r.title)
            .collect();
        assert!(!titles.contains(&"Form Master"));
    }
}
