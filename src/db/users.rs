//! Per-user aggregate stats and achievement rows.
//!
//! Functions take any SQLite executor so the finalize transaction can run
//! them on its own connection.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::Sqlite;
use sqlx::{Executor, Row, SqlitePool};

use crate::error::Result;
use crate::types::{Achievement, GameType, UserStats};

/// Load the stats row for a user, if one exists.
pub async fn get_stats<'e, E>(executor: E, user_id: &str) -> Result<Option<UserStats>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r#"
        SELECT total_games_played, total_time_seconds, average_score,
               average_confidence, best_rapid_fire, best_conductor,
               best_triple_step, streak_current, streak_longest, last_played
        FROM user_stats
        WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    let row = match row {
        Some(row) => row,
        None => return Ok(None),
    };

    let mut best_scores = BTreeMap::new();
    for (game_type, column) in [
        (GameType::RapidFire, "best_rapid_fire"),
        (GameType::Conductor, "best_conductor"),
        (GameType::TripleStep, "best_triple_step"),
    ] {
        if let Some(best) = row.get::<Option<i64>, _>(column) {
            best_scores.insert(game_type, best as u8);
        }
    }

    let last_played = row
        .get::<Option<String>, _>("last_played")
        .and_then(|s| s.parse::<NaiveDate>().ok());

    Ok(Some(UserStats {
        total_games_played: row.get("total_games_played"),
        total_time_seconds: row.get("total_time_seconds"),
        average_score: row.get("average_score"),
        average_confidence: row.get("average_confidence"),
        best_scores,
        streak_current: row.get("streak_current"),
        streak_longest: row.get("streak_longest"),
        last_played,
    }))
}

/// Upsert the full stats row for a user.
pub async fn save_stats<'e, E>(executor: E, user_id: &str, stats: &UserStats) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let best = |gt: GameType| stats.best_scores.get(&gt).map(|&s| s as i64);

    sqlx::query(
        r#"
        INSERT INTO user_stats (
            user_id, total_games_played, total_time_seconds, average_score,
            average_confidence, best_rapid_fire, best_conductor,
            best_triple_step, streak_current, streak_longest, last_played
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id) DO UPDATE SET
            total_games_played = excluded.total_games_played,
            total_time_seconds = excluded.total_time_seconds,
            average_score = excluded.average_score,
            average_confidence = excluded.average_confidence,
            best_rapid_fire = excluded.best_rapid_fire,
            best_conductor = excluded.best_conductor,
            best_triple_step = excluded.best_triple_step,
            streak_current = excluded.streak_current,
            streak_longest = excluded.streak_longest,
            last_played = excluded.last_played
        "#,
    )
    .bind(user_id)
    .bind(stats.total_games_played)
    .bind(stats.total_time_seconds)
    .bind(stats.average_score)
    .bind(stats.average_confidence)
    .bind(best(GameType::RapidFire))
    .bind(best(GameType::Conductor))
    .bind(best(GameType::TripleStep))
    .bind(stats.streak_current)
    .bind(stats.streak_longest)
    .bind(stats.last_played.map(|d| d.to_string()))
    .execute(executor)
    .await?;

    Ok(())
}

/// The user's unlocked achievements, oldest first.
pub async fn achievements<'e, E>(executor: E, user_id: &str) -> Result<Vec<Achievement>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        SELECT achievement
        FROM achievements
        WHERE user_id = ?
        ORDER BY unlocked_at ASC, id ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| Achievement::from_string(&row.get::<String, _>("achievement")))
        .collect())
}

/// Record an unlock. The unique (user_id, achievement) constraint makes
/// repeats a no-op.
pub async fn unlock_achievement<'e, E>(
    executor: E,
    user_id: &str,
    achievement: Achievement,
    unlocked_at: DateTime<Utc>,
) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO achievements (user_id, achievement, unlocked_at)
        VALUES (?, ?, ?)
        "#,
    )
    .bind(user_id)
    .bind(achievement.as_str())
    .bind(unlocked_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

/// Account removal: drop the user's sessions, stats and achievements in one
/// transaction.
pub async fn delete_account(pool: &SqlitePool, user_id: &str) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM user_stats WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM achievements WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    #[tokio::test]
    async fn test_stats_round_trip() {
        let pool = memory_pool().await.unwrap();
        assert!(get_stats(&pool, "u1").await.unwrap().is_none());

        let mut stats = UserStats {
            total_games_played: 3,
            total_time_seconds: 400,
            average_score: 72.5,
            average_confidence: 0.61,
            streak_current: 2,
            streak_longest: 4,
            last_played: Some("2026-08-29".parse().unwrap()),
            ..UserStats::default()
        };
        stats.best_scores.insert(GameType::RapidFire, 80);
        stats.best_scores.insert(GameType::TripleStep, 65);

        save_stats(&pool, "u1", &stats).await.unwrap();
        let loaded = get_stats(&pool, "u1").await.unwrap().unwrap();
        assert_eq!(loaded, stats);

        // upsert overwrites
        stats.total_games_played = 4;
        save_stats(&pool, "u1", &stats).await.unwrap();
        let loaded = get_stats(&pool, "u1").await.unwrap().unwrap();
        assert_eq!(loaded.total_games_played, 4);
    }

    #[tokio::test]
    async fn test_achievement_unlocks_are_unique() {
        let pool = memory_pool().await.unwrap();
        let now = Utc::now();

        unlock_achievement(&pool, "u1", Achievement::FirstGame, now).await.unwrap();
        unlock_achievement(&pool, "u1", Achievement::FirstGame, now).await.unwrap();
        unlock_achievement(&pool, "u1", Achievement::Streak5, now).await.unwrap();

        let unlocked = achievements(&pool, "u1").await.unwrap();
        assert_eq!(unlocked, vec![Achievement::FirstGame, Achievement::Streak5]);
    }

    #[tokio::test]
    async fn test_delete_account_removes_everything() {
        let pool = memory_pool().await.unwrap();
        let now = Utc::now();

        crate::db::sessions::create(
            &pool,
            "u1",
            GameType::RapidFire,
            crate::types::Difficulty::Easy,
            now,
        )
        .await
        .unwrap();
        save_stats(&pool, "u1", &UserStats::default()).await.unwrap();
        unlock_achievement(&pool, "u1", Achievement::FirstGame, now).await.unwrap();

        delete_account(&pool, "u1").await.unwrap();

        assert!(get_stats(&pool, "u1").await.unwrap().is_none());
        assert!(achievements(&pool, "u1").await.unwrap().is_empty());
        let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = 'u1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(sessions, 0);
    }
}
