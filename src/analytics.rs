//! Read-only progress analytics over persisted sessions.
//!
//! Report shapes are built by pure functions over the fetched session list,
//! so an unchanged store always produces identical output; thin async
//! wrappers do the fetching.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::warn;

use crate::ai::decode::{extract_bullets, extract_json_object};
use crate::ai::{prompts, AnalysisOrchestrator};
use crate::db::{sessions, users};
use crate::error::Result;
use crate::types::{Achievement, GameSession, GameType, Period, TimeRange};

/// Buckets of the fixed score distribution, in order.
pub const DISTRIBUTION_LABELS: [&str; 5] = ["0-20", "21-40", "41-60", "61-80", "81-100"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameTypeBreakdown {
    pub game_type: GameType,
    pub sessions: usize,
    pub average_score: u8,
    pub best_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendBucket {
    pub week_start: String,
    pub sessions: usize,
    pub average_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewReport {
    pub total_sessions: usize,
    pub total_time_seconds: i64,
    pub average_score: u8,
    pub best_score: u8,
    /// Second-half vs first-half score change in percent; 0 with fewer
    /// than 4 sessions in range.
    pub improvement: i64,
    pub by_game_type: Vec<GameTypeBreakdown>,
    pub weekly_trend: Vec<TrendBucket>,
    pub achievements: Vec<Achievement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStats {
    pub sessions: usize,
    pub average_score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameMetric {
    pub name: &'static str,
    pub value: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub total_sessions: usize,
    /// Counts per fixed bucket 0-20 / 21-40 / 41-60 / 61-80 / 81-100.
    pub score_distribution: [usize; 5],
    pub consistency: u8,
    pub daily: BTreeMap<String, GroupStats>,
    pub weekly: BTreeMap<String, GroupStats>,
    pub monthly: BTreeMap<String, GroupStats>,
    pub game_metric: Option<GameMetric>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodSummary {
    pub period: Period,
    pub sessions: usize,
    pub average_score: f64,
    pub total_time_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub period1: PeriodSummary,
    pub period2: PeriodSummary,
    /// (p1 - p2) / p2 * 100 per metric; 0 whenever the p2 value is 0.
    pub sessions_change: f64,
    pub average_score_change: f64,
    pub total_time_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsightsReport {
    pub summary: String,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Fallback insights when the feedback provider is unreachable or its
/// output is undecodable.
pub fn default_insights() -> InsightsReport {
    InsightsReport {
        summary: "Practice is accumulating; keep a regular cadence.".to_string(),
        strengths: vec!["Consistent training habit".to_string()],
        areas_for_improvement: vec!["Push difficulty up once scores plateau".to_string()],
        recommendations: vec![
            "Alternate game types to train different skills".to_string(),
            "Review your lowest-scoring sessions for patterns".to_string(),
        ],
    }
}

// ---------------------------------------------------------------------------
// async query layer

pub async fn overview(
    pool: &SqlitePool,
    user_id: &str,
    range: TimeRange,
    now: DateTime<Utc>,
) -> Result<OverviewReport> {
    let sessions = sessions::completed_in_range(pool, user_id, range, now).await?;
    let achievements = users::achievements(pool, user_id).await?;
    Ok(build_overview(&sessions, achievements, now))
}

pub async fn analytics(
    pool: &SqlitePool,
    user_id: &str,
    game_type: Option<GameType>,
    range: TimeRange,
    now: DateTime<Utc>,
) -> Result<AnalyticsReport> {
    let sessions =
        sessions::completed_between(pool, user_id, range.current_period(now), game_type).await?;
    Ok(build_analytics(&sessions, game_type))
}

pub async fn compare(
    pool: &SqlitePool,
    user_id: &str,
    period1: Period,
    period2: Period,
    game_type: Option<GameType>,
) -> Result<ComparisonReport> {
    let first = sessions::completed_between(pool, user_id, period1, game_type).await?;
    let second = sessions::completed_between(pool, user_id, period2, game_type).await?;
    Ok(build_comparison(period1, &first, period2, &second))
}

/// Provider-backed insights over the recent aggregate. Same fallback
/// guarantee as session analysis: never fails the caller.
pub async fn insights(
    pool: &SqlitePool,
    orchestrator: &AnalysisOrchestrator,
    user_id: &str,
    range: TimeRange,
    now: DateTime<Utc>,
) -> Result<InsightsReport> {
    let sessions = sessions::completed_in_range(pool, user_id, range, now).await?;

    let average = mean(sessions.iter().map(|s| s.performance.score as f64));
    let best = sessions.iter().map(|s| s.performance.score).max().unwrap_or(0);
    let prompt = prompts::build_insights(sessions.len(), average, best, range_label(range));

    match orchestrator.call(&prompt).await {
        Ok(text) => Ok(decode_insights(&text)),
        Err(err) => {
            warn!(user_id, error = %err, "insights generation failed, using default");
            Ok(default_insights())
        }
    }
}

// ---------------------------------------------------------------------------
// pure builders

pub fn build_overview(
    sessions: &[GameSession],
    achievements: Vec<Achievement>,
    now: DateTime<Utc>,
) -> OverviewReport {
    let scores: Vec<u8> = sessions.iter().map(|s| s.performance.score).collect();

    let mut by_game_type = Vec::new();
    for game_type in GameType::ALL {
        let of_type: Vec<&GameSession> =
            sessions.iter().filter(|s| s.game_type == game_type).collect();
        if of_type.is_empty() {
            continue;
        }
        by_game_type.push(GameTypeBreakdown {
            game_type,
            sessions: of_type.len(),
            average_score: round_mean(of_type.iter().map(|s| s.performance.score as f64)),
            best_score: of_type.iter().map(|s| s.performance.score).max().unwrap_or(0),
        });
    }

    OverviewReport {
        total_sessions: sessions.len(),
        total_time_seconds: sessions.iter().map(|s| s.duration_seconds).sum(),
        average_score: round_mean(scores.iter().map(|&s| s as f64)),
        best_score: scores.iter().copied().max().unwrap_or(0),
        improvement: improvement(&scores),
        by_game_type,
        weekly_trend: weekly_trend(sessions, now),
        achievements,
    }
}

pub fn build_analytics(sessions: &[GameSession], game_type: Option<GameType>) -> AnalyticsReport {
    let scores: Vec<f64> = sessions.iter().map(|s| s.performance.score as f64).collect();

    let mut score_distribution = [0usize; 5];
    for session in sessions {
        score_distribution[bucket_index(session.performance.score)] += 1;
    }

    let consistency = if scores.is_empty() {
        0
    } else {
        let spread = (100.0 - stddev(&scores) / 2.0).round();
        spread.max(0.0) as u8
    };

    AnalyticsReport {
        total_sessions: sessions.len(),
        score_distribution,
        consistency,
        daily: group_by(sessions, |at| at.format("%Y-%m-%d").to_string()),
        weekly: group_by(sessions, |at| at.format("%G-W%V").to_string()),
        monthly: group_by(sessions, |at| at.format("%Y-%m").to_string()),
        game_metric: game_type.map(|gt| game_metric(sessions, gt)),
    }
}

pub fn build_comparison(
    period1: Period,
    first: &[GameSession],
    period2: Period,
    second: &[GameSession],
) -> ComparisonReport {
    let summarize = |period: Period, sessions: &[GameSession]| PeriodSummary {
        period,
        sessions: sessions.len(),
        average_score: mean(sessions.iter().map(|s| s.performance.score as f64)),
        total_time_seconds: sessions.iter().map(|s| s.duration_seconds).sum(),
    };

    let p1 = summarize(period1, first);
    let p2 = summarize(period2, second);

    let sessions_change = percentage_change(p1.sessions as f64, p2.sessions as f64);
    let average_score_change = percentage_change(p1.average_score, p2.average_score);
    let total_time_change =
        percentage_change(p1.total_time_seconds as f64, p2.total_time_seconds as f64);

    ComparisonReport {
        period1: p1,
        period2: p2,
        sessions_change,
        average_score_change,
        total_time_change,
    }
}

/// `(p1 - p2) / p2 * 100`, clamped to 0 when the reference value is 0.
/// The clamp is deliberate compatibility behavior, not a numeric accident.
pub fn percentage_change(p1: f64, p2: f64) -> f64 {
    if p2 == 0.0 {
        return 0.0;
    }
    (p1 - p2) / p2 * 100.0
}

/// Decode insights text through the structured -> bullet-heuristic ->
/// default tiers, mirroring the session-analysis decoder.
pub fn decode_insights(text: &str) -> InsightsReport {
    #[derive(Debug, Default, serde::Deserialize)]
    #[serde(default, rename_all = "camelCase")]
    struct PartialInsights {
        summary: Option<String>,
        strengths: Vec<String>,
        areas_for_improvement: Vec<String>,
        recommendations: Vec<String>,
    }

    // tier 1: embedded JSON object
    if let Some(json) = extract_json_object(text) {
        if let Ok(partial) = serde_json::from_str::<PartialInsights>(json) {
            let relevant = partial.summary.is_some()
                || !partial.strengths.is_empty()
                || !partial.areas_for_improvement.is_empty()
                || !partial.recommendations.is_empty();
            if relevant {
                let defaults = default_insights();
                return InsightsReport {
                    summary: partial.summary.unwrap_or(defaults.summary),
                    strengths: non_empty_or(partial.strengths, defaults.strengths),
                    areas_for_improvement: non_empty_or(
                        partial.areas_for_improvement,
                        defaults.areas_for_improvement,
                    ),
                    recommendations: non_empty_or(
                        partial.recommendations,
                        defaults.recommendations,
                    ),
                };
            }
        }
    }

    // tier 2: bulleted prose becomes recommendations
    let bullets = extract_bullets(text);
    if !bullets.is_empty() {
        return InsightsReport {
            recommendations: bullets,
            ..default_insights()
        };
    }

    // tier 3
    default_insights()
}

fn non_empty_or(values: Vec<String>, fallback: Vec<String>) -> Vec<String> {
    if values.is_empty() {
        fallback
    } else {
        values
    }
}

fn range_label(range: TimeRange) -> &'static str {
    match range {
        TimeRange::Week => "week",
        TimeRange::Month => "month",
        TimeRange::Quarter => "quarter",
        TimeRange::Year => "year",
    }
}

fn bucket_index(score: u8) -> usize {
    match score {
        0..=20 => 0,
        21..=40 => 1,
        41..=60 => 2,
        61..=80 => 3,
        _ => 4,
    }
}

fn improvement(scores: &[u8]) -> i64 {
    if scores.len() < 4 {
        return 0;
    }
    let half = scores.len() / 2;
    let first = mean(scores[..half].iter().map(|&s| s as f64));
    let second = mean(scores[half..].iter().map(|&s| s as f64));
    if first == 0.0 {
        return 0;
    }
    ((second - first) / first * 100.0).round() as i64
}

/// Four week-sized buckets ending at `now`. Each window is half-open
/// except the last, which is closed at `now` so a session ending exactly
/// on the query boundary still lands in a bucket.
fn weekly_trend(sessions: &[GameSession], now: DateTime<Utc>) -> Vec<TrendBucket> {
    (0..4i64)
        .map(|i| {
            let start = now - Duration::weeks(4 - i);
            let end = now - Duration::weeks(3 - i);
            let last = i == 3;
            let in_bucket: Vec<&GameSession> = sessions
                .iter()
                .filter(|s| {
                    s.ended_at
                        .map(|at| at >= start && (at < end || (last && at == end)))
                        .unwrap_or(false)
                })
                .collect();
            TrendBucket {
                week_start: start.format("%Y-%m-%d").to_string(),
                sessions: in_bucket.len(),
                average_score: round_mean(in_bucket.iter().map(|s| s.performance.score as f64)),
            }
        })
        .collect()
}

fn group_by<F>(sessions: &[GameSession], key: F) -> BTreeMap<String, GroupStats>
where
    F: Fn(DateTime<Utc>) -> String,
{
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for session in sessions {
        if let Some(at) = session.ended_at {
            groups
                .entry(key(at))
                .or_default()
                .push(session.performance.score as f64);
        }
    }

    groups
        .into_iter()
        .map(|(key, scores)| {
            let stats = GroupStats {
                sessions: scores.len(),
                average_score: round_mean(scores.iter().copied()),
            };
            (key, stats)
        })
        .collect()
}

fn game_metric(sessions: &[GameSession], game_type: GameType) -> GameMetric {
    let (name, values): (&'static str, Vec<f64>) = match game_type {
        GameType::RapidFire => (
            "response_rate",
            sessions
                .iter()
                .map(|s| {
                    let p = &s.performance;
                    if p.total_prompts == 0 {
                        0.0
                    } else {
                        p.completed_prompts as f64 / p.total_prompts as f64 * 100.0
                    }
                })
                .collect(),
        ),
        GameType::Conductor => (
            "energy_consistency",
            sessions
                .iter()
                .map(|s| s.performance.energy_consistency as f64)
                .collect(),
        ),
        GameType::TripleStep => (
            "word_integration",
            sessions
                .iter()
                .map(|s| s.performance.word_integration as f64)
                .collect(),
        ),
    };

    GameMetric {
        name,
        value: round_mean(values.into_iter()),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let collected: Vec<f64> = values.collect();
    if collected.is_empty() {
        return 0.0;
    }
    collected.iter().sum::<f64>() / collected.len() as f64
}

fn round_mean(values: impl Iterator<Item = f64>) -> u8 {
    crate::types::to_percent(mean(values))
}

/// Population standard deviation.
fn stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Difficulty, Performance};

    fn session_at(score: u8, game_type: GameType, ended_at: DateTime<Utc>) -> GameSession {
        GameSession {
            id: 0,
            user_id: "u1".to_string(),
            game_type,
            difficulty: Difficulty::Easy,
            started_at: ended_at - Duration::seconds(120),
            ended_at: Some(ended_at),
            duration_seconds: 120,
            performance: Performance {
                score,
                accuracy: score,
                energy_consistency: if game_type == GameType::Conductor { score } else { 0 },
                word_integration: if game_type == GameType::TripleStep { score } else { 0 },
                total_prompts: 10,
                completed_prompts: (score as u32) / 10,
                ..Performance::default()
            },
            game_data: None,
            ai_analysis: None,
            is_completed: true,
        }
    }

    fn days_ago(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
        now - Duration::days(days)
    }

    #[test]
    fn test_overview_improvement_halves() {
        let now = Utc::now();
        let sessions: Vec<GameSession> = [50u8, 60, 70, 80]
            .iter()
            .enumerate()
            .map(|(i, &score)| {
                session_at(score, GameType::RapidFire, days_ago(now, 8 - i as i64))
            })
            .collect();

        let report = build_overview(&sessions, vec![Achievement::FirstGame], now);
        // ((75 - 55) / 55) * 100 = 36.36 rounds to 36
        assert_eq!(report.improvement, 36);
        assert_eq!(report.total_sessions, 4);
        assert_eq!(report.best_score, 80);
        assert_eq!(report.average_score, 65);
        assert_eq!(report.total_time_seconds, 480);
        assert_eq!(report.achievements, vec![Achievement::FirstGame]);
    }

    #[test]
    fn test_overview_improvement_needs_four_sessions() {
        let now = Utc::now();
        let sessions: Vec<GameSession> = [40u8, 90, 90]
            .iter()
            .map(|&s| session_at(s, GameType::RapidFire, days_ago(now, 1)))
            .collect();

        let report = build_overview(&sessions, vec![], now);
        assert_eq!(report.improvement, 0);
    }

    #[test]
    fn test_overview_game_type_breakdown_and_trend() {
        let now = Utc::now();
        let sessions = vec![
            session_at(60, GameType::RapidFire, days_ago(now, 20)),
            session_at(80, GameType::RapidFire, days_ago(now, 2)),
            session_at(70, GameType::Conductor, days_ago(now, 2)),
        ];

        let report = build_overview(&sessions, vec![], now);

        let rapid = report
            .by_game_type
            .iter()
            .find(|b| b.game_type == GameType::RapidFire)
            .unwrap();
        assert_eq!(rapid.sessions, 2);
        assert_eq!(rapid.average_score, 70);
        assert_eq!(rapid.best_score, 80);
        // tripleStep never played, so it is absent
        assert!(!report.by_game_type.iter().any(|b| b.game_type == GameType::TripleStep));

        assert_eq!(report.weekly_trend.len(), 4);
        let last_week = report.weekly_trend.last().unwrap();
        assert_eq!(last_week.sessions, 2);
        assert_eq!(last_week.average_score, 75);
    }

    #[test]
    fn test_trend_counts_session_on_the_window_boundary() {
        let now = Utc::now();
        let sessions = vec![
            session_at(60, GameType::RapidFire, days_ago(now, 3)),
            session_at(80, GameType::RapidFire, now),
        ];

        let report = build_overview(&sessions, vec![], now);
        assert_eq!(report.total_sessions, 2);

        // every reported session lands in exactly one bucket
        let bucketed: usize = report.weekly_trend.iter().map(|b| b.sessions).sum();
        assert_eq!(bucketed, 2);
        assert_eq!(report.weekly_trend.last().unwrap().sessions, 2);
    }

    #[test]
    fn test_analytics_distribution_and_consistency() {
        let now = Utc::now();
        let sessions = vec![
            session_at(10, GameType::RapidFire, days_ago(now, 3)),
            session_at(20, GameType::RapidFire, days_ago(now, 3)),
            session_at(21, GameType::RapidFire, days_ago(now, 2)),
            session_at(60, GameType::RapidFire, days_ago(now, 2)),
            session_at(61, GameType::RapidFire, days_ago(now, 1)),
            session_at(100, GameType::RapidFire, days_ago(now, 1)),
        ];

        let report = build_analytics(&sessions, None);
        assert_eq!(report.score_distribution, [2, 1, 1, 1, 1]);
        assert_eq!(report.total_sessions, 6);
        assert!(report.consistency <= 100);
        assert_eq!(report.daily.len(), 3);
        assert!(report.game_metric.is_none());
    }

    #[test]
    fn test_analytics_identical_scores_are_maximally_consistent() {
        let now = Utc::now();
        let sessions: Vec<GameSession> = (0..3i64)
            .map(|i| session_at(70, GameType::Conductor, days_ago(now, i)))
            .collect();

        let report = build_analytics(&sessions, Some(GameType::Conductor));
        // stddev 0 gives consistency 100
        assert_eq!(report.consistency, 100);
        let metric = report.game_metric.unwrap();
        assert_eq!(metric.name, "energy_consistency");
        assert_eq!(metric.value, 70);
    }

    #[test]
    fn test_analytics_empty_store() {
        let report = build_analytics(&[], None);
        assert_eq!(report.total_sessions, 0);
        assert_eq!(report.score_distribution, [0, 0, 0, 0, 0]);
        assert_eq!(report.consistency, 0);
        assert!(report.daily.is_empty());
    }

    #[test]
    fn test_analytics_is_deterministic() {
        let now = Utc::now();
        let sessions = vec![
            session_at(55, GameType::TripleStep, days_ago(now, 4)),
            session_at(72, GameType::TripleStep, days_ago(now, 1)),
        ];
        let first = build_analytics(&sessions, Some(GameType::TripleStep));
        let second = build_analytics(&sessions, Some(GameType::TripleStep));
        assert_eq!(first, second);
    }

    #[test]
    fn test_comparison_zero_denominator_clamps_to_zero() {
        let now = Utc::now();
        let period1 = TimeRange::Week.current_period(now);
        let period2 = TimeRange::Week.previous_period(now);

        let first = vec![session_at(80, GameType::RapidFire, days_ago(now, 1))];
        let report = build_comparison(period1, &first, period2, &[]);

        assert_eq!(report.sessions_change, 0.0);
        assert_eq!(report.average_score_change, 0.0);
        assert_eq!(report.total_time_change, 0.0);
        assert_eq!(report.period1.sessions, 1);
        assert_eq!(report.period2.sessions, 0);
    }

    #[test]
    fn test_comparison_percentage_change() {
        let now = Utc::now();
        let period1 = TimeRange::Week.current_period(now);
        let period2 = TimeRange::Week.previous_period(now);

        let first = vec![
            session_at(90, GameType::RapidFire, days_ago(now, 1)),
            session_at(90, GameType::RapidFire, days_ago(now, 2)),
        ];
        let second = vec![session_at(60, GameType::RapidFire, days_ago(now, 8))];

        let report = build_comparison(period1, &first, period2, &second);
        assert_eq!(report.sessions_change, 100.0);
        assert_eq!(report.average_score_change, 50.0);
        assert_eq!(report.total_time_change, 100.0);
    }

    #[test]
    fn test_decode_insights_structured() {
        let text = r#"{"summary": "Solid month.", "strengths": ["energy"], "recommendations": ["try hard mode"]}"#;
        let insights = decode_insights(text);
        assert_eq!(insights.summary, "Solid month.");
        assert_eq!(insights.strengths, vec!["energy".to_string()]);
        assert_eq!(insights.recommendations, vec!["try hard mode".to_string()]);
        // absent list falls back to the default
        assert_eq!(
            insights.areas_for_improvement,
            default_insights().areas_for_improvement
        );
    }

    #[test]
    fn test_decode_insights_bullets_then_default() {
        let bullets = decode_insights("Some thoughts:\n- breathe more\n- slow down");
        assert_eq!(
            bullets.recommendations,
            vec!["breathe more".to_string(), "slow down".to_string()]
        );

        let fallback = decode_insights("nothing usable here");
        assert_eq!(fallback, default_insights());
    }
}
