//! Rolling per-user aggregates and achievement unlocks.
//!
//! Pure functions over `UserStats`; the storage layer applies them inside
//! the finalize transaction so accounting happens exactly once per session.

use chrono::NaiveDate;

use crate::types::{Achievement, GameType, UserStats};

/// Fold one newly-completed session into the user's aggregates.
///
/// `average_score` is the mean of the per-game-type best scores, not of all
/// session scores. `average_confidence` is a recency-weighted blend. Both
/// semantics are kept as-is for compatibility with existing user data.
pub fn apply_session(
    stats: &mut UserStats,
    game_type: GameType,
    score: u8,
    duration_seconds: i64,
    played_on: NaiveDate,
) {
    stats.total_games_played += 1;
    stats.total_time_seconds += duration_seconds.max(0);

    let best = stats.best_scores.entry(game_type).or_insert(0);
    *best = (*best).max(score);

    let sum: u32 = stats.best_scores.values().map(|&s| s as u32).sum();
    stats.average_score = sum as f64 / stats.best_scores.len() as f64;

    stats.average_confidence = (stats.average_confidence + score as f64 / 100.0) / 2.0;

    match stats.last_played {
        Some(last) if last == played_on => {}
        Some(last) if played_on.pred_opt() == Some(last) => {
            stats.streak_current += 1;
        }
        _ => {
            stats.streak_current = 1;
        }
    }
    stats.streak_longest = stats.streak_longest.max(stats.streak_current);
    stats.last_played = Some(played_on);
}

/// Achievements earned by the current aggregate state that the user does
/// not already hold. Each type unlocks at most once.
pub fn check_achievements(stats: &UserStats, already_unlocked: &[Achievement]) -> Vec<Achievement> {
    let mut earned = Vec::new();

    if stats.total_games_played >= 1 {
        earned.push(Achievement::FirstGame);
    }
    if stats.streak_current >= 5 {
        earned.push(Achievement::Streak5);
    }
    if stats.streak_current >= 10 {
        earned.push(Achievement::Streak10);
    }

    earned.retain(|a| !already_unlocked.contains(a));
    earned
}
