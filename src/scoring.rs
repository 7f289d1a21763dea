//! Pure scoring: raw in-game telemetry to normalized 0-100 performance.

use crate::error::{CoreError, Result};
use crate::types::{to_percent, GameSpecificData, GameType, Performance, RawPerformance};

/// Derive normalized performance for a finished session.
///
/// Deterministic and side-effect free. Zero-denominator inputs yield an
/// accuracy of 0 rather than NaN. Fails only when the telemetry variant
/// does not match the session's game type.
pub fn compute(
    game_type: GameType,
    raw: RawPerformance,
    data: &GameSpecificData,
) -> Result<Performance> {
    if data.game_type() != game_type {
        return Err(CoreError::validation(
            "gameSpecificData",
            data.game_type().as_str(),
        ));
    }

    let mut perf = Performance {
        total_prompts: raw.total_prompts,
        completed_prompts: raw.completed_prompts,
        ..Performance::default()
    };

    match data {
        GameSpecificData::RapidFire {
            total_prompts,
            completed_responses,
            response_time,
            ..
        } => {
            let accuracy = ratio_percent(*completed_responses, *total_prompts);
            perf.accuracy = accuracy;
            perf.score = accuracy;
            perf.speed = to_percent(*response_time);
        }
        GameSpecificData::Conductor {
            energy_consistency, ..
        } => {
            let accuracy = to_percent(*energy_consistency);
            perf.accuracy = accuracy;
            perf.score = accuracy;
            perf.energy_consistency = accuracy;
        }
        GameSpecificData::TripleStep {
            words_attempted,
            successful_integrations,
            average_time,
            ..
        } => {
            let accuracy = ratio_percent(*successful_integrations, *words_attempted);
            perf.accuracy = accuracy;
            perf.word_integration = accuracy;
            perf.score = accuracy;
            perf.speed = to_percent(*average_time);
        }
    }

    Ok(perf)
}

fn ratio_percent(numerator: u32, denominator: u32) -> u8 {
    if denominator == 0 {
        return 0;
    }
    to_percent(numerator as f64 / denominator as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(total: u32, completed: u32) -> RawPerformance {
        RawPerformance {
            total_prompts: total,
            completed_prompts: completed,
        }
    }

    #[test]
    fn test_rapid_fire_accuracy() {
        let data = GameSpecificData::RapidFire {
            total_prompts: 10,
            completed_responses: 7,
            response_time: 62.0,
            responses: vec![],
        };
        let perf = compute(GameType::RapidFire, raw(10, 7), &data).unwrap();
        assert_eq!(perf.accuracy, 70);
        assert_eq!(perf.score, 70);
        assert_eq!(perf.speed, 62);
        assert_eq!(perf.total_prompts, 10);
        assert_eq!(perf.completed_prompts, 7);
    }

    #[test]
    fn test_rapid_fire_zero_prompts() {
        let data = GameSpecificData::RapidFire {
            total_prompts: 0,
            completed_responses: 0,
            response_time: 0.0,
            responses: vec![],
        };
        let perf = compute(GameType::RapidFire, raw(0, 0), &data).unwrap();
        assert_eq!(perf.accuracy, 0);
        assert_eq!(perf.score, 0);
    }

    #[test]
    fn test_conductor_mirrors_energy_consistency() {
        let data = GameSpecificData::Conductor {
            energy_consistency: 88.4,
            energy_peaks: 4,
            breathe_cues_hit: 3,
            breathe_cues_total: 4,
            energy_timeline: vec![40, 70, 90],
        };
        let perf = compute(GameType::Conductor, raw(0, 0), &data).unwrap();
        assert_eq!(perf.accuracy, 88);
        assert_eq!(perf.score, 88);
        assert_eq!(perf.energy_consistency, 88);
    }

    #[test]
    fn test_triple_step_rounding() {
        let data = GameSpecificData::TripleStep {
            words_attempted: 6,
            successful_integrations: 5,
            average_time: 55.0,
            integrated_words: vec![],
        };
        let perf = compute(GameType::TripleStep, raw(6, 5), &data).unwrap();
        // 5/6 = 83.33 rounds to 83
        assert_eq!(perf.accuracy, 83);
        assert_eq!(perf.word_integration, 83);
        assert_eq!(perf.score, 83);
    }

    #[test]
    fn test_triple_step_zero_attempts() {
        let data = GameSpecificData::TripleStep {
            words_attempted: 0,
            successful_integrations: 0,
            average_time: 0.0,
            integrated_words: vec![],
        };
        let perf = compute(GameType::TripleStep, raw(0, 0), &data).unwrap();
        assert_eq!(perf.accuracy, 0);
        assert_eq!(perf.word_integration, 0);
    }

    #[test]
    fn test_mismatched_variant_rejected() {
        let data = GameSpecificData::Conductor {
            energy_consistency: 50.0,
            energy_peaks: 0,
            breathe_cues_hit: 0,
            breathe_cues_total: 0,
            energy_timeline: vec![],
        };
        let err = compute(GameType::RapidFire, raw(5, 5), &data).unwrap_err();
        assert!(matches!(err, CoreError::Validation { field, .. } if field == "gameSpecificData"));
    }

    #[test]
    fn test_scores_stay_in_bounds() {
        let data = GameSpecificData::RapidFire {
            total_prompts: 3,
            completed_responses: 9,
            response_time: 400.0,
            responses: vec![],
        };
        let perf = compute(GameType::RapidFire, raw(3, 3), &data).unwrap();
        assert!(perf.score <= 100);
        assert!(perf.accuracy <= 100);
        assert_eq!(perf.speed, 100);
    }
}
