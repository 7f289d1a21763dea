use thiserror::Error;

/// Domain errors surfaced by the session lifecycle and analytics layer.
///
/// Only `Validation`, `SessionNotFound`, `AlreadyCompleted` and `Storage`
/// ever reach a caller of the public operations; AI-provider failures are
/// absorbed inside the orchestrator and stats failures roll back the
/// finalize transaction as a whole.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid {field}: {value:?}")]
    Validation { field: &'static str, value: String },

    #[error("session {0} not found")]
    SessionNotFound(i64),

    #[error("session {0} is already completed")]
    AlreadyCompleted(i64),

    #[error("stats update failed: {0}")]
    StatsUpdate(String),

    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

impl CoreError {
    pub fn validation(field: &'static str, value: impl Into<String>) -> Self {
        CoreError::Validation {
            field,
            value: value.into(),
        }
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

/// Failures of the external feedback provider. Never escapes
/// `AnalysisOrchestrator::analyze`; every variant collapses to the
/// default analysis.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider timed out after {0}s")]
    Timeout(u64),

    #[error("provider returned an empty response")]
    EmptyResponse,
}
