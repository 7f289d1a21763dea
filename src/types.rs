use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The three training games. Stored and serialized in camelCase to match
/// the client payloads; kebab-case is accepted on parse for CLI use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameType {
    RapidFire,
    Conductor,
    TripleStep,
}

impl GameType {
    pub const ALL: [GameType; 3] = [GameType::RapidFire, GameType::Conductor, GameType::TripleStep];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::RapidFire => "rapidFire",
            GameType::Conductor => "conductor",
            GameType::TripleStep => "tripleStep",
        }
    }
}

impl std::fmt::Display for GameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rapidFire" | "rapid-fire" => Ok(GameType::RapidFire),
            "conductor" => Ok(GameType::Conductor),
            "tripleStep" | "triple-step" => Ok(GameType::TripleStep),
            other => Err(CoreError::validation("gameType", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// How many prompts a session of this difficulty is dealt.
    pub fn prompt_count(&self) -> usize {
        match self {
            Difficulty::Easy => 5,
            Difficulty::Medium => 8,
            Difficulty::Hard => 12,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(CoreError::validation("difficulty", other)),
        }
    }
}

/// Raw counters submitted by the client at end-session, before scoring.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPerformance {
    pub total_prompts: u32,
    pub completed_prompts: u32,
}

/// Game-specific telemetry, tagged by game type so each variant carries
/// only its own fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "gameType", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GameSpecificData {
    RapidFire {
        total_prompts: u32,
        completed_responses: u32,
        /// Mean response latency, already normalized by the client to 0-100.
        response_time: f64,
        #[serde(default)]
        responses: Vec<String>,
    },
    Conductor {
        energy_consistency: f64,
        #[serde(default)]
        energy_peaks: u32,
        #[serde(default)]
        breathe_cues_hit: u32,
        #[serde(default)]
        breathe_cues_total: u32,
        #[serde(default)]
        energy_timeline: Vec<u8>,
    },
    TripleStep {
        words_attempted: u32,
        successful_integrations: u32,
        /// Mean integration time, normalized by the client to 0-100.
        average_time: f64,
        #[serde(default)]
        integrated_words: Vec<String>,
    },
}

impl GameSpecificData {
    pub fn game_type(&self) -> GameType {
        match self {
            GameSpecificData::RapidFire { .. } => GameType::RapidFire,
            GameSpecificData::Conductor { .. } => GameType::Conductor,
            GameSpecificData::TripleStep { .. } => GameType::TripleStep,
        }
    }
}

/// Normalized performance. All percentage fields are integers in 0-100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub score: u8,
    pub accuracy: u8,
    pub speed: u8,
    pub energy_consistency: u8,
    pub word_integration: u8,
    pub total_prompts: u32,
    pub completed_prompts: u32,
}

/// Best-effort qualitative enrichment attached after session completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    pub speech_clarity: u8,
    pub energy_level: u8,
    pub coherence: u8,
    pub confidence: u8,
    pub fluency: u8,
    pub overall_rating: u8,
    pub feedback: Vec<String>,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
}

/// One play-through of a single game, bounded by start/end.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub id: i64,
    pub user_id: String,
    pub game_type: GameType,
    pub difficulty: Difficulty,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub performance: Performance,
    pub game_data: Option<GameSpecificData>,
    pub ai_analysis: Option<AiAnalysis>,
    pub is_completed: bool,
}

/// Per-user rolling aggregates, mutated exactly once per completed session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserStats {
    pub total_games_played: i64,
    pub total_time_seconds: i64,
    pub average_score: f64,
    pub average_confidence: f64,
    pub best_scores: BTreeMap<GameType, u8>,
    pub streak_current: i64,
    pub streak_longest: i64,
    pub last_played: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Achievement {
    #[serde(rename = "first_game")]
    FirstGame,
    #[serde(rename = "streak_5")]
    Streak5,
    #[serde(rename = "streak_10")]
    Streak10,
}

impl Achievement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Achievement::FirstGame => "first_game",
            Achievement::Streak5 => "streak_5",
            Achievement::Streak10 => "streak_10",
        }
    }

    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "first_game" => Some(Achievement::FirstGame),
            "streak_5" => Some(Achievement::Streak5),
            "streak_10" => Some(Achievement::Streak10),
            _ => None,
        }
    }
}

impl std::fmt::Display for Achievement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rolling window bounding an analytics query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeRange {
    pub fn duration(&self) -> Duration {
        match self {
            TimeRange::Week => Duration::weeks(1),
            TimeRange::Month => Duration::days(30),
            TimeRange::Quarter => Duration::days(90),
            TimeRange::Year => Duration::days(365),
        }
    }

    /// Start of the window ending at `now`.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }

    /// The window ending at `now`.
    pub fn current_period(&self, now: DateTime<Utc>) -> Period {
        Period {
            start: self.since(now),
            end: now,
        }
    }

    /// The adjacent window immediately before `current_period`.
    pub fn previous_period(&self, now: DateTime<Utc>) -> Period {
        let end = self.since(now);
        Period {
            start: end - self.duration(),
            end,
        }
    }
}

impl FromStr for TimeRange {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "week" => Ok(TimeRange::Week),
            "month" => Ok(TimeRange::Month),
            "quarter" => Ok(TimeRange::Quarter),
            "year" => Ok(TimeRange::Year),
            other => Err(CoreError::validation("timeRange", other)),
        }
    }
}

/// A half-open `[start, end)` window used by period comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Period {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

/// Clamp a float to 0-100 and round to the nearest integer percentage.
pub fn to_percent(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u8
}
