use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Prompt sentences the student reads aloud during the microphone self-test.
pub const CHECK_SENTENCES: &[&str] = &["this is to check."];

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.,!?]").unwrap());

#[derive(Serialize, Clone, Debug)]
pub struct MicCheckResult {
    pub accuracy: u32,
    pub passed: bool,
    pub transcript: String,
}

fn clean(text: &str) -> Vec<String> {
    PUNCTUATION
        .replace_all(&text.to_lowercase(), "")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Word-by-word accuracy of `spoken` against `prompt`, in percent.
///
/// A prompt word counts as matched when any spoken word contains it or is
/// contained by it. Deliberately loose on short words; this mirrors the
/// established self-test behavior and must not be tightened here.
pub fn score(prompt: &str, spoken: &str) -> u32 {
    let original = clean(prompt);
    let spoken = clean(spoken);

    if original.is_empty() {
        return 0;
    }

    let matched = original
        .iter()
        .filter(|word| {
            spoken
                .iter()
                .any(|w| w.contains(word.as_str()) || word.contains(w.as_str()))
        })
        .count();

    let score = ((matched as f64 / original.len() as f64) * 100.0).round() as u32;
    info!(
        "Mic check: matched {}/{} words, score {}",
        matched,
        original.len(),
        score
    );
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_reading_scores_full_marks() {
        assert_eq!(score("this is to check.", "this is to check"), 100);
    }

    #[test]
    fn partial_reading_credits_substring_hits() {
        // "this" and "check" match directly; "is" also matches because
        // "this" contains it, so 3/4 words count.
        assert_eq!(score("this is to check.", "this check"), 75);
    }

    #[test]
    fn single_word_reading_fails_the_threshold() {
        assert_eq!(score("this is to check.", "check"), 25);
    }

    #[test]
    fn case_and_punctuation_are_ignored() {
        assert_eq!(score("This is to CHECK.", "this, is! to? check"), 100);
    }

    #[test]
    fn empty_speech_scores_zero() {
        assert_eq!(score("this is to check.", ""), 0);
    }

    #[test]
    fn containment_matching_is_bidirectional() {
        // "checking" contains "check"; "is" is contained by "this". The
        // heuristic over-matches on short words by design.
        assert_eq!(score("check", "checking"), 100);
        assert_eq!(score("is", "this"), 100);
    }
}
