pub mod ai;
pub mod analytics;
pub mod catalog;
pub mod db;
pub mod error;
pub mod scoring;
pub mod session;
pub mod stats;
pub mod types;

pub use error::{CoreError, ProviderError};
pub use session::{CompletedSession, SessionService, StartedSession};
pub use types::{
    Achievement, AiAnalysis, Difficulty, GameSession, GameSpecificData, GameType, Performance,
    RawPerformance, TimeRange, UserStats,
};
