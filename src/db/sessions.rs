//! Session rows and the single allowed open -> completed transition.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

use crate::error::{CoreError, Result};
use crate::stats;
use crate::types::{
    Achievement, AiAnalysis, Difficulty, GameSession, GameSpecificData, GameType, Performance,
    Period, TimeRange,
};

use super::users;

/// Result of a successful finalize transaction.
#[derive(Debug)]
pub struct FinalizedOutcome {
    pub session: GameSession,
    pub newly_unlocked: Vec<Achievement>,
}

/// Create a new open session with zeroed performance.
pub async fn create(
    pool: &SqlitePool,
    user_id: &str,
    game_type: GameType,
    difficulty: Difficulty,
    started_at: DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO sessions (user_id, game_type, difficulty, started_at, is_completed)
        VALUES (?, ?, ?, ?, 0)
        "#,
    )
    .bind(user_id)
    .bind(game_type.as_str())
    .bind(difficulty.as_str())
    .bind(started_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Fetch one session by id.
pub async fn get(pool: &SqlitePool, id: i64) -> Result<Option<GameSession>> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, game_type, difficulty, started_at, ended_at,
               duration_seconds, score, accuracy, speed, energy_consistency,
               word_integration, total_prompts, completed_prompts,
               game_data, ai_analysis, is_completed
        FROM sessions
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(session_from_row).transpose()
}

/// Complete a session and fold it into the user's aggregates in one
/// transaction.
///
/// The conditional flip on `is_completed = 0` is the transaction's first
/// statement, so it takes the write lock before any read. A concurrent
/// end-call for the same id waits on that lock, then sees zero rows and
/// resolves to `AlreadyCompleted` by re-reading, never a busy error from
/// a stale read snapshot.
pub async fn finalize(
    pool: &SqlitePool,
    id: i64,
    user_id: &str,
    perf: Performance,
    data: &GameSpecificData,
    ended_at: DateTime<Utc>,
) -> Result<FinalizedOutcome> {
    let game_data_json = serde_json::to_string(data)
        .map_err(|e| CoreError::validation("gameSpecificData", e.to_string()))?;

    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        r#"
        UPDATE sessions
        SET ended_at = ?,
            score = ?, accuracy = ?, speed = ?, energy_consistency = ?,
            word_integration = ?, total_prompts = ?, completed_prompts = ?,
            game_data = ?, is_completed = 1
        WHERE id = ? AND user_id = ? AND is_completed = 0
        "#,
    )
    .bind(ended_at.to_rfc3339())
    .bind(perf.score as i64)
    .bind(perf.accuracy as i64)
    .bind(perf.speed as i64)
    .bind(perf.energy_consistency as i64)
    .bind(perf.word_integration as i64)
    .bind(perf.total_prompts as i64)
    .bind(perf.completed_prompts as i64)
    .bind(&game_data_json)
    .bind(id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        let existing = sqlx::query("SELECT user_id FROM sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        return Err(match existing {
            Some(row) if row.get::<String, _>("user_id") == user_id => {
                CoreError::AlreadyCompleted(id)
            }
            // A foreign session id is indistinguishable from a missing one.
            _ => CoreError::SessionNotFound(id),
        });
    }

    let row = sqlx::query("SELECT game_type, difficulty, started_at FROM sessions WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    let game_type = GameType::from_str(&row.get::<String, _>("game_type"))?;
    if data.game_type() != game_type {
        // Dropping the transaction rolls the flip back.
        return Err(CoreError::validation(
            "gameSpecificData",
            data.game_type().as_str(),
        ));
    }

    let started_at = parse_timestamp(&row.get::<String, _>("started_at"))?;
    let duration_seconds = duration_between(started_at, ended_at);
    sqlx::query("UPDATE sessions SET duration_seconds = ? WHERE id = ?")
        .bind(duration_seconds)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let mut user_stats = users::get_stats(&mut *tx, user_id).await?.unwrap_or_default();
    let already = users::achievements(&mut *tx, user_id).await?;

    let session = GameSession {
        id,
        user_id: user_id.to_string(),
        game_type,
        difficulty: Difficulty::from_str(&row.get::<String, _>("difficulty"))
            .unwrap_or(Difficulty::Easy),
        started_at,
        ended_at: Some(ended_at),
        duration_seconds,
        performance: perf,
        game_data: Some(data.clone()),
        ai_analysis: None,
        is_completed: true,
    };

    stats::apply_session(
        &mut user_stats,
        session.game_type,
        perf.score,
        duration_seconds,
        ended_at.date_naive(),
    );
    users::save_stats(&mut *tx, user_id, &user_stats)
        .await
        .map_err(|e| CoreError::StatsUpdate(e.to_string()))?;

    let newly_unlocked = stats::check_achievements(&user_stats, &already);
    for achievement in &newly_unlocked {
        users::unlock_achievement(&mut *tx, user_id, *achievement, ended_at).await?;
    }

    tx.commit().await?;

    Ok(FinalizedOutcome {
        session,
        newly_unlocked,
    })
}

/// Attach the AI analysis to an already-completed session. Best-effort;
/// the caller logs failures and moves on.
pub async fn attach_analysis(pool: &SqlitePool, id: i64, analysis: &AiAnalysis) -> Result<()> {
    let json = serde_json::to_string(analysis)
        .map_err(|e| CoreError::validation("aiAnalysis", e.to_string()))?;

    sqlx::query("UPDATE sessions SET ai_analysis = ? WHERE id = ? AND is_completed = 1")
        .bind(json)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Completed sessions for a user within the rolling window ending now,
/// oldest first.
pub async fn completed_in_range(
    pool: &SqlitePool,
    user_id: &str,
    range: TimeRange,
    now: DateTime<Utc>,
) -> Result<Vec<GameSession>> {
    completed_between(pool, user_id, range.current_period(now), None).await
}

/// Completed sessions inside `[period.start, period.end)`, optionally
/// restricted to one game type, oldest first.
pub async fn completed_between(
    pool: &SqlitePool,
    user_id: &str,
    period: Period,
    game_type: Option<GameType>,
) -> Result<Vec<GameSession>> {
    // RFC 3339 UTC timestamps compare lexicographically.
    let rows = match game_type {
        Some(gt) => {
            sqlx::query(
                r#"
                SELECT id, user_id, game_type, difficulty, started_at, ended_at,
                       duration_seconds, score, accuracy, speed, energy_consistency,
                       word_integration, total_prompts, completed_prompts,
                       game_data, ai_analysis, is_completed
                FROM sessions
                WHERE user_id = ? AND is_completed = 1
                  AND ended_at >= ? AND ended_at < ?
                  AND game_type = ?
                ORDER BY ended_at ASC
                "#,
            )
            .bind(user_id)
            .bind(period.start.to_rfc3339())
            .bind(period.end.to_rfc3339())
            .bind(gt.as_str())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT id, user_id, game_type, difficulty, started_at, ended_at,
                       duration_seconds, score, accuracy, speed, energy_consistency,
                       word_integration, total_prompts, completed_prompts,
                       game_data, ai_analysis, is_completed
                FROM sessions
                WHERE user_id = ? AND is_completed = 1
                  AND ended_at >= ? AND ended_at < ?
                ORDER BY ended_at ASC
                "#,
            )
            .bind(user_id)
            .bind(period.start.to_rfc3339())
            .bind(period.end.to_rfc3339())
            .fetch_all(pool)
            .await?
        }
    };

    rows.into_iter().map(session_from_row).collect()
}

fn duration_between(started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> i64 {
    let millis = ended_at.signed_duration_since(started_at).num_milliseconds();
    ((millis as f64 / 1000.0).round() as i64).max(0)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CoreError::validation("timestamp", s))
}

fn session_from_row(row: SqliteRow) -> Result<GameSession> {
    let game_type_str: String = row.get("game_type");
    let difficulty_str: String = row.get("difficulty");
    let game_data: Option<String> = row.get("game_data");
    let ai_analysis: Option<String> = row.get("ai_analysis");
    let ended_at: Option<String> = row.get("ended_at");

    Ok(GameSession {
        id: row.get("id"),
        user_id: row.get("user_id"),
        game_type: GameType::from_str(&game_type_str)?,
        difficulty: Difficulty::from_str(&difficulty_str)?,
        started_at: parse_timestamp(&row.get::<String, _>("started_at"))?,
        ended_at: ended_at.as_deref().map(parse_timestamp).transpose()?,
        duration_seconds: row.get("duration_seconds"),
        performance: Performance {
            score: row.get::<i64, _>("score") as u8,
            accuracy: row.get::<i64, _>("accuracy") as u8,
            speed: row.get::<i64, _>("speed") as u8,
            energy_consistency: row.get::<i64, _>("energy_consistency") as u8,
            word_integration: row.get::<i64, _>("word_integration") as u8,
            total_prompts: row.get::<i64, _>("total_prompts") as u32,
            completed_prompts: row.get::<i64, _>("completed_prompts") as u32,
        },
        game_data: game_data.as_deref().and_then(|j| serde_json::from_str(j).ok()),
        ai_analysis: ai_analysis.as_deref().and_then(|j| serde_json::from_str(j).ok()),
        is_completed: row.get::<i64, _>("is_completed") != 0,
    })
}
