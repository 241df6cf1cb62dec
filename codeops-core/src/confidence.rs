//! Confidence score extraction from free-text model output
//!
//! This is a heuristic over unstructured text. The pattern order is fixed so
//! the same text always yields the same score:
//!
//! 1. a `confidence: 83` label
//! 2. a `score: 83` label
//! 3. a percentage (`77%`)
//! 4. a fraction of one hundred (`42/100`)
//! 5. a `rating: 83` label
//! 6. the first bare integer between 0 and 100
//! 7. [`DEFAULT_CONFIDENCE`]
//!
//! Each pattern is tried against the whole text before the next one, so a
//! later `Confidence: 85` beats an earlier `score 40`. Values matched by the
//! labeled, percent and fraction patterns are clamped to `0..=100`.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Score used when the text contains no usable number
pub const DEFAULT_CONFIDENCE: u8 = 70;

static CONFIDENCE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bconfidence\b[\s*:=\-]+(\d+)").unwrap());

static SCORE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bscore\b[\s*:=\-]+(\d+)").unwrap());

static RATING_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\brating\b[\s*:=\-]+(\d+)").unwrap());

static PERCENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*%").unwrap());

static FRACTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*/\s*100\b").unwrap());

static BARE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d+)\b").unwrap());

fn clamp(digits: &str) -> u8 {
    // Overlong digit runs saturate instead of failing
    digits.parse::<u64>().unwrap_or(u64::MAX).min(100) as u8
}

fn first_capture(re: &Regex, text: &str) -> Option<u8> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| clamp(m.as_str()))
}

/// Extract a confidence score in `0..=100` from critique or analysis text
pub fn extract(text: &str) -> u8 {
    let lower = text.to_lowercase();

    let explicit = [
        &*CONFIDENCE_LABEL,
        &*SCORE_LABEL,
        &*PERCENT,
        &*FRACTION,
        &*RATING_LABEL,
    ]
    .into_iter()
    .find_map(|re| first_capture(re, &lower));

    if let Some(score) = explicit {
        return score;
    }

    let bare = BARE
        .captures_iter(&lower)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse::<u64>().ok())
        .find(|n| *n <= 100);

    match bare {
        Some(score) => score as u8,
        None => {
            debug!("No confidence score found, using default");
            DEFAULT_CONFIDENCE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labeled_confidence() {
        assert_eq!(extract("confidence: 83"), 83);
        assert_eq!(extract("**Confidence**: 91 - solid plan"), 91);
    }

    #[test]
    fn test_labeled_score() {
        assert_eq!(extract("Confidence Assessment: Score 64, with caveats"), 64);
    }

    #[test]
    fn test_percent() {
        assert_eq!(extract("77%"), 77);
        assert_eq!(extract("I am roughly 55 % sure"), 55);
    }

    #[test]
    fn test_fraction() {
        assert_eq!(extract("42/100"), 42);
    }

    #[test]
    fn test_confidence_label_wins_over_earlier_score() {
        assert_eq!(extract("Risk score: 40 for rollback.\nConfidence: 85"), 85);
    }

    #[test]
    fn test_label_inside_word_is_ignored() {
        assert_eq!(extract("Migrating 2 services carries risk.\nConfidence: 85"), 85);
        assert_eq!(extract("Integrating 3 checks, 60% coverage"), 60);
    }

    #[test]
    fn test_rating_label_after_fraction() {
        assert_eq!(extract("Rating: 55"), 55);
        assert_eq!(extract("rating: 55, overall 30/100"), 30);
    }

    #[test]
    fn test_label_wins_over_percent() {
        assert_eq!(extract("Step 1 covers 30% of the risk. Confidence: 80"), 80);
    }

    #[test]
    fn test_percent_wins_over_fraction() {
        assert_eq!(extract("rated 40/100 overall, 65% likely to work"), 65);
    }

    #[test]
    fn test_bare_number() {
        assert_eq!(extract("The plan has 3 gaps"), 3);
    }

    #[test]
    fn test_bare_number_skips_out_of_range() {
        assert_eq!(extract("Found 2048 errors across 12 files"), 12);
    }

    #[test]
    fn test_default() {
        assert_eq!(extract("no numbers here at all"), DEFAULT_CONFIDENCE);
        assert_eq!(extract(""), 70);
    }

    #[test]
    fn test_clamps_explicit_values() {
        assert_eq!(extract("confidence: 150"), 100);
        assert_eq!(extract("250%"), 100);
        assert_eq!(extract("score: 99999999999999999999999"), 100);
    }

    #[test]
    fn test_always_in_range() {
        for text in ["-5%", "confidence: 0", "1000/100", "x 101 y", "42"] {
            assert!(extract(text) <= 100, "out of range for {text}");
        }
    }
}
