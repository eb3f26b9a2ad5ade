//! Scoring Engine
//!
//! Multi-factor accuracy scoring for a submitted phrase against the target
//! phrase of a turn:
//!   - word overlap (55%): fraction of target words present in the submission
//!   - character similarity (45%): 1 - normalised Levenshtein distance
//!
//! Both texts are normalised first (lowercased, punctuation stripped,
//! whitespace collapsed) so transliteration noise like stray commas or
//! capitalisation never costs points. The function is stateless and
//! deterministic, and it never fails: malformed or empty submissions simply
//! score low.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

const WORD_WEIGHT: f64 = 0.55;
const CHAR_WEIGHT: f64 = 0.45;

/// Qualitative band for a combined score, derived from the fixed range
/// table (100 Perfect, 90-99 Excellent, 75-89 Great, 55-74 Almost there,
/// 35-54 Partial match, 0-34 Keep practising).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreLabel {
    Perfect,
    Excellent,
    Great,
    #[serde(rename = "Almost there")]
    AlmostThere,
    #[serde(rename = "Partial match")]
    PartialMatch,
    #[serde(rename = "Keep practising")]
    KeepPractising,
}

impl ScoreLabel {
    /// Maps a combined score to its label band.
    pub fn for_score(score: u8) -> Self {
        match score {
            100 => ScoreLabel::Perfect,
            90..=99 => ScoreLabel::Excellent,
            75..=89 => ScoreLabel::Great,
            55..=74 => ScoreLabel::AlmostThere,
            35..=54 => ScoreLabel::PartialMatch,
            _ => ScoreLabel::KeepPractising,
        }
    }
}

impl fmt::Display for ScoreLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreLabel::Perfect => write!(f, "Perfect"),
            ScoreLabel::Excellent => write!(f, "Excellent"),
            ScoreLabel::Great => write!(f, "Great"),
            ScoreLabel::AlmostThere => write!(f, "Almost there"),
            ScoreLabel::PartialMatch => write!(f, "Partial match"),
            ScoreLabel::KeepPractising => write!(f, "Keep practising"),
        }
    }
}

/// Result of scoring one submission against one target phrase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Combined score, 0-100.
    pub score: u8,
    pub label: ScoreLabel,
    /// Human-readable component summary, e.g. "Word match 67% · Similarity 40%".
    pub breakdown: String,
}

/// Lowercases, strips everything that is neither alphanumeric nor
/// whitespace, and collapses runs of whitespace to single spaces.
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Standard single-character insert/delete/substitute edit distance,
/// computed over chars with a two-row table.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (curr[j] + 1).min(prev[j + 1] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Fraction of target word tokens found anywhere among the submission
/// tokens. Order-independent; each occurrence of a duplicated target word
/// counts. An empty target matches everything.
fn word_overlap(submission_words: &[&str], target_words: &[&str]) -> f64 {
    if target_words.is_empty() {
        return 1.0;
    }
    let submitted: HashSet<&str> = submission_words.iter().copied().collect();
    let matched = target_words
        .iter()
        .filter(|w| submitted.contains(**w))
        .count();
    matched as f64 / target_words.len() as f64
}

/// 1 - edit_distance / max(len), over the full normalised strings.
/// Two empty strings are identical by definition.
fn char_similarity(a: &[char], b: &[char]) -> f64 {
    let longer = a.len().max(b.len());
    if longer == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longer as f64
}

/// Scores a submitted phrase against the target phrase.
///
/// Identical inputs always yield the identical `(score, label, breakdown)`
/// triple; the component percentages in the breakdown are reproducible from
/// the same computation that produced the score.
pub fn score_submission(submission: &str, target: &str) -> ScoreResult {
    let submission = normalize(submission);
    let target = normalize(target);

    let submission_words: Vec<&str> = submission.split_whitespace().collect();
    let target_words: Vec<&str> = target.split_whitespace().collect();
    let submission_chars: Vec<char> = submission.chars().collect();
    let target_chars: Vec<char> = target.chars().collect();

    let word = word_overlap(&submission_words, &target_words);
    let chars = char_similarity(&target_chars, &submission_chars);

    let raw = WORD_WEIGHT * word + CHAR_WEIGHT * chars;
    let score = ((raw * 100.0).round() as i64).clamp(0, 100) as u8;

    ScoreResult {
        score,
        label: ScoreLabel::for_score(score),
        breakdown: format!(
            "Word match {}% · Similarity {}%",
            (word * 100.0).round() as i64,
            (chars * 100.0).round() as i64
        ),
    }
}
