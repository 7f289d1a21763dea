//! Session lifecycle orchestration: start, end, account removal.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::ai::AnalysisOrchestrator;
use crate::catalog::PromptCatalog;
use crate::db::{sessions, users};
use crate::error::{CoreError, Result};
use crate::scoring;
use crate::types::{
    Achievement, AiAnalysis, GameSession, GameSpecificData, RawPerformance,
};

#[derive(Debug, Serialize)]
pub struct StartedSession {
    pub session_id: i64,
    pub prompts: Vec<String>,
}

#[derive(Debug)]
pub struct CompletedSession {
    pub session: GameSession,
    pub analysis: AiAnalysis,
    pub newly_unlocked: Vec<Achievement>,
}

pub struct SessionService {
    pool: SqlitePool,
    orchestrator: AnalysisOrchestrator,
    catalog: Box<dyn PromptCatalog>,
}

impl SessionService {
    pub fn new(
        pool: SqlitePool,
        orchestrator: AnalysisOrchestrator,
        catalog: Box<dyn PromptCatalog>,
    ) -> Self {
        Self {
            pool,
            orchestrator,
            catalog,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn orchestrator(&self) -> &AnalysisOrchestrator {
        &self.orchestrator
    }

    /// Open a session. Game type and difficulty arrive as client strings
    /// and are validated here; nothing is written on failure.
    pub async fn start(
        &self,
        user_id: &str,
        game_type: &str,
        difficulty: &str,
    ) -> Result<StartedSession> {
        let game_type = game_type.parse()?;
        let difficulty = difficulty.parse()?;

        let prompts = self.catalog.draw(game_type, difficulty).await?;
        let session_id =
            sessions::create(&self.pool, user_id, game_type, difficulty, Utc::now()).await?;

        info!(user_id, session_id, %game_type, %difficulty, "session started");

        Ok(StartedSession {
            session_id,
            prompts,
        })
    }

    /// Complete a session: score, persist the one allowed state flip plus
    /// the stats fold in a single transaction, then enrich best-effort.
    ///
    /// Only scoring and the finalize write can fail the caller. AI
    /// enrichment failures are logged and replaced by the default
    /// analysis; a disconnecting caller loses nothing already persisted.
    pub async fn end(
        &self,
        user_id: &str,
        session_id: i64,
        raw: RawPerformance,
        data: GameSpecificData,
    ) -> Result<CompletedSession> {
        let perf = scoring::compute(data.game_type(), raw, &data)?;
        let ended_at = Utc::now();

        let outcome =
            sessions::finalize(&self.pool, session_id, user_id, perf, &data, ended_at).await?;
        let mut session = outcome.session;

        info!(
            user_id,
            session_id,
            score = perf.score,
            unlocked = outcome.newly_unlocked.len(),
            "session completed"
        );

        let analysis = self.orchestrator.analyze(&session).await;
        if let Err(err) = sessions::attach_analysis(&self.pool, session_id, &analysis).await {
            error!(session_id, error = %err, "failed to attach AI analysis");
        } else {
            session.ai_analysis = Some(analysis.clone());
        }

        Ok(CompletedSession {
            session,
            analysis,
            newly_unlocked: outcome.newly_unlocked,
        })
    }

    /// Fetch a session, hiding other users' sessions.
    pub async fn get(&self, user_id: &str, session_id: i64) -> Result<GameSession> {
        let session = sessions::get(&self.pool, session_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or(CoreError::SessionNotFound(session_id))?;
        Ok(session)
    }

    /// Bulk removal of everything the user owns.
    pub async fn delete_account(&self, user_id: &str) -> Result<()> {
        users::delete_account(&self.pool, user_id).await?;
        info!(user_id, "account data deleted");
        Ok(())
    }
}
