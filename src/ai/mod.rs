//! Best-effort AI enrichment.
//!
//! `AnalysisOrchestrator::analyze` never fails: provider outages, malformed
//! text and missing telemetry all collapse into `default_analysis()`.

pub mod decode;
pub mod prompts;
pub mod provider;

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::error::ProviderError;
use crate::types::{to_percent, AiAnalysis, GameSession};

use decode::{decode, PartialAnalysis};
use provider::{FeedbackProvider, ProviderConfig};

/// The fixed fallback attached when enrichment cannot produce anything
/// better. All metrics sit at a neutral 75.
pub fn default_analysis() -> AiAnalysis {
    AiAnalysis {
        speech_clarity: 75,
        energy_level: 75,
        coherence: 75,
        confidence: 75,
        fluency: 75,
        overall_rating: 75,
        feedback: vec![
            "Keep practicing to build consistency.".to_string(),
            "Try recording yourself to spot filler words.".to_string(),
        ],
        strengths: vec!["Completed the full session".to_string()],
        areas_for_improvement: vec!["Focus on pacing and breath control".to_string()],
    }
}

pub struct AnalysisOrchestrator {
    provider: Arc<dyn FeedbackProvider>,
    timeout: Duration,
}

impl AnalysisOrchestrator {
    pub fn new(provider: Arc<dyn FeedbackProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Build from environment configuration, falling back to the disabled
    /// provider when none is set.
    pub fn from_env() -> Self {
        match ProviderConfig::from_env() {
            Some(config) => {
                let timeout = Duration::from_secs(config.timeout_secs);
                Self::new(Arc::new(provider::HttpFeedbackProvider::new(config)), timeout)
            }
            None => Self::new(
                Arc::new(provider::DisabledProvider),
                Duration::from_secs(ProviderConfig::DEFAULT_TIMEOUT_SECS),
            ),
        }
    }

    /// Run the game-type-specific pipeline and return a fully populated
    /// analysis. Infallible by contract; failures are logged only.
    pub async fn analyze(&self, session: &GameSession) -> AiAnalysis {
        match self.try_analyze(session).await {
            Ok(analysis) => analysis,
            Err(err) => {
                warn!(
                    session_id = session.id,
                    game_type = %session.game_type,
                    error = %err,
                    "AI analysis failed, using default"
                );
                default_analysis()
            }
        }
    }

    async fn try_analyze(&self, session: &GameSession) -> Result<AiAnalysis, ProviderError> {
        let data = session
            .game_data
            .as_ref()
            .ok_or_else(|| ProviderError::Unavailable("session has no game data".to_string()))?;

        let (first_prompt, second_prompt) = prompts::build_pair(session, data);

        // Both sub-analyses run concurrently; the result is attached once,
        // never incrementally.
        let (first, second) = tokio::join!(self.call(&first_prompt), self.call(&second_prompt));
        let (first, second) = (first?, second?);

        let merged = decode(&first).partial.merge(decode(&second).partial);
        Ok(apply_partial(default_analysis(), merged))
    }

    pub(crate) async fn call(&self, prompt: &str) -> Result<String, ProviderError> {
        match tokio::time::timeout(self.timeout, self.provider.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout.as_secs())),
        }
    }
}

/// Fill an analysis with whatever the decoders recovered, keeping defaults
/// for the rest.
fn apply_partial(mut base: AiAnalysis, partial: PartialAnalysis) -> AiAnalysis {
    if let Some(v) = partial.speech_clarity {
        base.speech_clarity = to_percent(v);
    }
    if let Some(v) = partial.energy_level {
        base.energy_level = to_percent(v);
    }
    if let Some(v) = partial.coherence {
        base.coherence = to_percent(v);
    }
    if let Some(v) = partial.confidence {
        base.confidence = to_percent(v);
    }
    if let Some(v) = partial.fluency {
        base.fluency = to_percent(v);
    }
    if let Some(v) = partial.overall_rating {
        base.overall_rating = to_percent(v);
    }
    if !partial.feedback.is_empty() {
        base.feedback = partial.feedback;
    }
    if !partial.strengths.is_empty() {
        base.strengths = partial.strengths;
    }
    if !partial.areas_for_improvement.is_empty() {
        base.areas_for_improvement = partial.areas_for_improvement;
    }
    base
}
