//! Derived features computed from already-mapped document fields.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use tweet_indexer_shared::Document;

/// Field holding the raw text the features are computed from.
pub const TEXT_FIELD: &str = "text_s";
/// UTF-8 byte length of the text.
pub const BYTES_FIELD: &str = "bytes_i";
/// Lexical sentiment score of the text.
pub const SENTIMENT_FIELD: &str = "sentiment_score_i";

const DEFAULT_POSITIVE_WORDS: &[&str] = &[
    "amazing", "awesome", "beautiful", "best", "cool", "excellent", "fantastic", "fun", "glad",
    "good", "great", "happy", "like", "love", "nice", "thanks", "win", "wonderful",
];

const DEFAULT_NEGATIVE_WORDS: &[&str] = &[
    "angry", "annoying", "awful", "bad", "boring", "fail", "hate", "horrible", "poor", "sad",
    "sucks", "terrible", "ugly", "worst", "wrong",
];

fn token_boundary() -> &'static Regex {
    static TOKEN_BOUNDARY: OnceLock<Regex> = OnceLock::new();
    TOKEN_BOUNDARY.get_or_init(|| Regex::new(r"\W+").expect("token boundary pattern is valid"))
}

/// Split lower-cased text on runs of non-word characters.
pub fn tokenize(text: &str) -> Vec<String> {
    token_boundary()
        .split(&text.to_lowercase())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Positive and negative word sets used for sentiment scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexicon {
    positives: HashSet<String>,
    negatives: HashSet<String>,
}

impl Lexicon {
    /// Build a lexicon from explicit word sets. Words are lower-cased.
    pub fn new<P, N, S>(positives: P, negatives: N) -> Self
    where
        P: IntoIterator<Item = S>,
        N: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            positives: positives
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
            negatives: negatives
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Score tokens: positive matches minus negative matches.
    ///
    /// A word present in both sets counts once in each direction.
    pub fn score<T: AsRef<str>>(&self, tokens: &[T]) -> i64 {
        tokens.iter().fold(0i64, |score, token| {
            let token = token.as_ref();
            let mut score = score;
            if self.positives.contains(token) {
                score += 1;
            }
            if self.negatives.contains(token) {
                score -= 1;
            }
            score
        })
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new(
            DEFAULT_POSITIVE_WORDS.iter().copied(),
            DEFAULT_NEGATIVE_WORDS.iter().copied(),
        )
    }
}

/// Computes derived fields from a document's text.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    lexicon: Lexicon,
}

impl FeatureExtractor {
    pub fn new(lexicon: Lexicon) -> Self {
        Self { lexicon }
    }

    pub fn sentiment_score(&self, text: &str) -> i64 {
        self.lexicon.score(&tokenize(text))
    }

    /// Add `bytes_i` and `sentiment_score_i` computed from `text_s`.
    ///
    /// A document without text gets neither field.
    pub fn apply(&self, document: &mut Document) {
        let Some(text) = document.get_str(TEXT_FIELD) else {
            return;
        };
        let bytes = text.len() as i64;
        let score = self.sentiment_score(text);

        for (field, value) in [(BYTES_FIELD, bytes), (SENTIMENT_FIELD, score)] {
            if let Err(e) = document.insert(field, value) {
                debug!(error = %e, "Skipping feature field");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_splits_on_non_word_characters() {
        assert_eq!(
            tokenize("Good, BAD... good!!! @user #tag snake_case"),
            vec!["good", "bad", "good", "user", "tag", "snake_case"]
        );
        assert!(tokenize("  ...  ").is_empty());
    }

    #[test]
    fn test_score_good_bad_good() {
        let extractor = FeatureExtractor::new(Lexicon::new(["good"], ["bad"]));

        assert_eq!(extractor.sentiment_score("good bad good"), 1);
        assert_eq!(extractor.sentiment_score("good bad good"), 1);
    }

    #[test]
    fn test_score_is_exact_match_only() {
        let extractor = FeatureExtractor::new(Lexicon::new(["good"], ["bad"]));

        assert_eq!(extractor.sentiment_score("goodness badly"), 0);
        assert_eq!(extractor.sentiment_score("GOOD"), 1);
    }

    #[test]
    fn test_word_in_both_sets_cancels() {
        let extractor = FeatureExtractor::new(Lexicon::new(["sick", "good"], ["sick"]));

        assert_eq!(extractor.sentiment_score("sick"), 0);
        assert_eq!(extractor.sentiment_score("sick good"), 1);
    }

    #[test]
    fn test_default_lexicon() {
        let extractor = FeatureExtractor::default();

        assert!(extractor.sentiment_score("I love this, it is great") > 0);
        assert!(extractor.sentiment_score("terrible and awful") < 0);
    }

    #[test]
    fn test_apply_adds_fields() {
        let mut doc = Document::new("tweet-1");
        doc.insert(TEXT_FIELD, "héllo good").unwrap();

        FeatureExtractor::new(Lexicon::new(["good"], ["bad"])).apply(&mut doc);

        assert_eq!(doc.get_int(BYTES_FIELD), Some(11));
        assert_eq!(doc.get_int(SENTIMENT_FIELD), Some(1));
    }

    #[test]
    fn test_apply_without_text_is_noop() {
        let mut doc = Document::new("tweet-1");

        FeatureExtractor::default().apply(&mut doc);

        assert!(doc.is_empty());
    }
}
