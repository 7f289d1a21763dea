//! Three ordered decoders for provider text: structured JSON, heuristic
//! regex extraction, fixed default. The tiering is the resilience
//! mechanism; each tier is tested on its own.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

/// Metric and list fields a provider response may carry. Anything missing
/// is filled from the default analysis during merge.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PartialAnalysis {
    pub speech_clarity: Option<f64>,
    pub energy_level: Option<f64>,
    pub coherence: Option<f64>,
    pub confidence: Option<f64>,
    pub fluency: Option<f64>,
    pub overall_rating: Option<f64>,
    pub feedback: Vec<String>,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
}

impl PartialAnalysis {
    pub fn is_empty(&self) -> bool {
        self.speech_clarity.is_none()
            && self.energy_level.is_none()
            && self.coherence.is_none()
            && self.confidence.is_none()
            && self.fluency.is_none()
            && self.overall_rating.is_none()
            && self.feedback.is_empty()
            && self.strengths.is_empty()
            && self.areas_for_improvement.is_empty()
    }

    /// Overlay `other` on top of self: scalar fields from `other` win,
    /// list fields append.
    pub fn merge(mut self, other: PartialAnalysis) -> PartialAnalysis {
        self.speech_clarity = other.speech_clarity.or(self.speech_clarity);
        self.energy_level = other.energy_level.or(self.energy_level);
        self.coherence = other.coherence.or(self.coherence);
        self.confidence = other.confidence.or(self.confidence);
        self.fluency = other.fluency.or(self.fluency);
        self.overall_rating = other.overall_rating.or(self.overall_rating);
        self.feedback.extend(other.feedback);
        self.strengths.extend(other.strengths);
        self.areas_for_improvement.extend(other.areas_for_improvement);
        self
    }
}

/// Which decoder produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeTier {
    Structured,
    Heuristic,
    Default,
}

#[derive(Debug)]
pub struct Decoded {
    pub tier: DecodeTier,
    pub partial: PartialAnalysis,
}

/// Decode provider text through the ordered tiers. Never fails; the last
/// tier is an empty partial that merges into pure defaults.
pub fn decode(text: &str) -> Decoded {
    if let Some(partial) = decode_structured(text) {
        return Decoded {
            tier: DecodeTier::Structured,
            partial,
        };
    }
    if let Some(partial) = decode_heuristic(text) {
        return Decoded {
            tier: DecodeTier::Heuristic,
            partial,
        };
    }
    Decoded {
        tier: DecodeTier::Default,
        partial: PartialAnalysis::default(),
    }
}

/// Tier 1: parse the first balanced JSON object embedded in the text.
pub fn decode_structured(text: &str) -> Option<PartialAnalysis> {
    let json = extract_json_object(text)?;
    let partial: PartialAnalysis = serde_json::from_str(json).ok()?;
    if partial.is_empty() {
        return None;
    }
    Some(partial)
}

static METRIC_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    let metric = |name: &str| {
        // "speech clarity: 82" / "Clarity - 82/100" / "clarity score of 82"
        Regex::new(&format!(r"(?i)\b{name}\b[^0-9]{{0,24}}(\d{{1,3}})"))
            .expect("metric pattern compiles")
    };
    vec![
        ("speech_clarity", metric("(?:speech\\s+)?clarity")),
        ("energy_level", metric("energy(?:\\s+level)?")),
        ("coherence", metric("coherence")),
        ("confidence", metric("confidence")),
        ("fluency", metric("fluency")),
        ("overall_rating", metric("(?:overall|rating)")),
    ]
});

/// Tier 2: pull bare scalars out of prose. Fails when nothing matches.
pub fn decode_heuristic(text: &str) -> Option<PartialAnalysis> {
    let mut partial = PartialAnalysis::default();

    for (field, pattern) in METRIC_PATTERNS.iter() {
        let value = pattern
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .filter(|v| (0.0..=100.0).contains(v));

        if let Some(v) = value {
            match *field {
                "speech_clarity" => partial.speech_clarity = Some(v),
                "energy_level" => partial.energy_level = Some(v),
                "coherence" => partial.coherence = Some(v),
                "confidence" => partial.confidence = Some(v),
                "fluency" => partial.fluency = Some(v),
                "overall_rating" => partial.overall_rating = Some(v),
                _ => {}
            }
        }
    }

    if partial.is_empty() {
        return None;
    }
    Some(partial)
}

/// Bullet or numbered lines, for heuristic list extraction in insights.
pub fn extract_bullets(text: &str) -> Vec<String> {
    static BULLET: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?m)^\s*(?:[-*\u{2022}]|\d+[.)])\s+(.+)$").expect("bullet pattern compiles"));

    BULLET
        .captures_iter(text)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// First balanced `{...}` block, skipping braces inside string literals.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_tier_parses_embedded_json() {
        let text = r#"Here is the analysis you asked for:
            {"speechClarity": 82, "coherence": 74, "strengths": ["clear voice"]}
            Let me know if you need more detail."#;

        let decoded = decode(text);
        assert_eq!(decoded.tier, DecodeTier::Structured);
        assert_eq!(decoded.partial.speech_clarity, Some(82.0));
        assert_eq!(decoded.partial.coherence, Some(74.0));
        assert_eq!(decoded.partial.strengths, vec!["clear voice".to_string()]);
    }

    #[test]
    fn test_structured_tier_rejects_irrelevant_json() {
        // parses as JSON, carries none of our fields
        assert!(decode_structured(r#"{"weather": "sunny"}"#).is_none());
    }

    #[test]
    fn test_structured_tier_handles_braces_in_strings() {
        let text = r#"{"feedback": ["watch the {pause} markers"], "fluency": 61}"#;
        let partial = decode_structured(text).unwrap();
        assert_eq!(partial.fluency, Some(61.0));
    }

    #[test]
    fn test_heuristic_tier_extracts_scalars_from_prose() {
        let text = "Speech clarity was strong at 82/100. Energy level: 67. \
                    Overall I would rate this 75.";

        let decoded = decode(text);
        assert_eq!(decoded.tier, DecodeTier::Heuristic);
        assert_eq!(decoded.partial.speech_clarity, Some(82.0));
        assert_eq!(decoded.partial.energy_level, Some(67.0));
        assert_eq!(decoded.partial.overall_rating, Some(75.0));
        assert_eq!(decoded.partial.coherence, None);
    }

    #[test]
    fn test_heuristic_tier_ignores_out_of_range_values() {
        assert!(decode_heuristic("confidence was 940 out of 1000").is_none());
    }

    #[test]
    fn test_default_tier_on_garbage() {
        let decoded = decode("the quick brown fox");
        assert_eq!(decoded.tier, DecodeTier::Default);
        assert!(decoded.partial.is_empty());

        let decoded = decode("");
        assert_eq!(decoded.tier, DecodeTier::Default);
    }

    #[test]
    fn test_merge_prefers_later_scalars_and_appends_lists() {
        let a = PartialAnalysis {
            coherence: Some(50.0),
            fluency: Some(60.0),
            strengths: vec!["pacing".to_string()],
            ..PartialAnalysis::default()
        };
        let b = PartialAnalysis {
            coherence: Some(70.0),
            strengths: vec!["volume".to_string()],
            ..PartialAnalysis::default()
        };

        let merged = a.merge(b);
        assert_eq!(merged.coherence, Some(70.0));
        assert_eq!(merged.fluency, Some(60.0));
        assert_eq!(merged.strengths, vec!["pacing".to_string(), "volume".to_string()]);
    }

    #[test]
    fn test_extract_bullets() {
        let text = "Suggestions:\n- slow down\n* breathe at transitions\n3. vary your pitch\nnot a bullet";
        assert_eq!(
            extract_bullets(text),
            vec![
                "slow down".to_string(),
                "breathe at transitions".to_string(),
                "vary your pitch".to_string(),
            ]
        );
    }
}
