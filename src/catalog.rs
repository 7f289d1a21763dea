//! Prompt/word/topic content dealt at session start. External collaborator
//! behind a trait; the built-in catalog serves the CLI and tests.

use async_trait::async_trait;
use rand::seq::SliceRandom;

use crate::error::Result;
use crate::types::{Difficulty, GameType};

#[async_trait]
pub trait PromptCatalog: Send + Sync {
    /// Deal the prompts for one session. Only consulted at session start;
    /// content never influences scoring or analytics.
    async fn draw(&self, game_type: GameType, difficulty: Difficulty) -> Result<Vec<String>>;
}

const RAPID_FIRE_PROMPTS: &[&str] = &[
    "Leadership is like...",
    "A deadline is like...",
    "Trust is like...",
    "A meeting is like...",
    "Feedback is like...",
    "A budget is like...",
    "Teamwork is like...",
    "A launch is like...",
    "Learning is like...",
    "A mistake is like...",
    "Planning is like...",
    "A negotiation is like...",
];

const CONDUCTOR_TOPICS: &[&str] = &[
    "The best advice you ever received",
    "A skill everyone should learn",
    "Your ideal morning routine",
    "A place that changed you",
    "The future of your field",
    "Something you changed your mind about",
    "A habit worth keeping",
    "What makes a good teacher",
];

const TRIPLE_STEP_WORDS: &[&str] = &[
    "umbrella", "compass", "anchor", "ladder", "mirror", "bridge", "engine", "garden",
    "lantern", "quilt", "saddle", "telescope", "whistle", "harbor", "kite", "orchard",
];

pub struct StaticCatalog;

#[async_trait]
impl PromptCatalog for StaticCatalog {
    async fn draw(&self, game_type: GameType, difficulty: Difficulty) -> Result<Vec<String>> {
        let source: &[&str] = match game_type {
            GameType::RapidFire => RAPID_FIRE_PROMPTS,
            GameType::Conductor => CONDUCTOR_TOPICS,
            GameType::TripleStep => TRIPLE_STEP_WORDS,
        };

        let count = difficulty.prompt_count().min(source.len());
        let drawn = source
            .choose_multiple(&mut rand::thread_rng(), count)
            .map(|s| s.to_string())
            .collect();

        Ok(drawn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_draw_respects_difficulty_count() {
        let catalog = StaticCatalog;

        let easy = catalog.draw(GameType::RapidFire, Difficulty::Easy).await.unwrap();
        assert_eq!(easy.len(), 5);

        let hard = catalog.draw(GameType::RapidFire, Difficulty::Hard).await.unwrap();
        assert_eq!(hard.len(), 12);
    }

    #[tokio::test]
    async fn test_draw_has_no_duplicates() {
        let catalog = StaticCatalog;
        let words = catalog.draw(GameType::TripleStep, Difficulty::Hard).await.unwrap();

        let mut deduped = words.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), words.len());
    }
}
