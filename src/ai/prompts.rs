//! Prompt builders for the per-game-type analysis pipelines.

use crate::types::{GameSession, GameSpecificData};

const RESPONSE_FORMAT: &str = "Reply with a JSON object using camelCase keys \
    (speechClarity, energyLevel, coherence, confidence, fluency, overallRating, \
    feedback, strengths, areasForImprovement). Scores are integers from 0 to 100.";

/// The two sub-analysis prompts for a session, run concurrently.
pub fn build_pair(session: &GameSession, data: &GameSpecificData) -> (String, String) {
    match data {
        GameSpecificData::RapidFire {
            total_prompts,
            completed_responses,
            responses,
            ..
        } => {
            let transcript = if responses.is_empty() {
                "(no transcript captured)".to_string()
            } else {
                responses.join("\n")
            };
            let per_response = format!(
                "A speaker played a rapid-fire analogy game, answering {completed} of \
                 {total} prompts. Assess speech clarity, confidence and fluency of the \
                 individual responses below.\n{transcript}\n{format}",
                completed = completed_responses,
                total = total_prompts,
                transcript = transcript,
                format = RESPONSE_FORMAT,
            );
            let coherence = format!(
                "Across the same rapid-fire session (score {score}/100, accuracy \
                 {accuracy}%), rate the overall coherence of the speaker's answers and \
                 give an overallRating.\n{format}",
                score = session.performance.score,
                accuracy = session.performance.accuracy,
                format = RESPONSE_FORMAT,
            );
            (per_response, coherence)
        }
        GameSpecificData::Conductor {
            energy_consistency,
            energy_peaks,
            breathe_cues_hit,
            breathe_cues_total,
            energy_timeline,
        } => {
            let transitions = format!(
                "A speaker played a vocal-energy conducting game. Energy consistency \
                 was {consistency:.0}/100 with {peaks} peaks over the timeline \
                 {timeline:?}. Assess the energy transitions (energyLevel) and overall \
                 control.\n{format}",
                consistency = energy_consistency,
                peaks = energy_peaks,
                timeline = energy_timeline,
                format = RESPONSE_FORMAT,
            );
            let breathing = format!(
                "In the same session the speaker hit {hit} of {total} breathe cues. \
                 Rate confidence and fluency of delivery around those cues.\n{format}",
                hit = breathe_cues_hit,
                total = breathe_cues_total,
                format = RESPONSE_FORMAT,
            );
            (transitions, breathing)
        }
        GameSpecificData::TripleStep {
            words_attempted,
            successful_integrations,
            integrated_words,
            ..
        } => {
            let integration = format!(
                "A speaker played a word-integration game, weaving {hit} of {total} \
                 random words into an ongoing talk (words: {words:?}). Rate how \
                 naturally the words were integrated (speechClarity, fluency).\n{format}",
                hit = successful_integrations,
                total = words_attempted,
                words = integrated_words,
                format = RESPONSE_FORMAT,
            );
            let coherence = format!(
                "For the same talk (score {score}/100), rate how coherent the speech \
                 remained despite the interruptions, and give an overallRating.\n{format}",
                score = session.performance.score,
                format = RESPONSE_FORMAT,
            );
            (integration, coherence)
        }
    }
}

/// Prompt for progress insights over recent aggregate performance.
pub fn build_insights(
    total_sessions: usize,
    average_score: f64,
    best_score: u8,
    range_label: &str,
) -> String {
    format!(
        "A public-speaking trainee completed {total_sessions} sessions in the last \
         {range_label}, averaging {average_score:.0}/100 with a best of {best_score}. \
         Give practical insights. Reply with a JSON object with keys summary, \
         strengths, areasForImprovement, recommendations (lists of short strings)."
    )
}
