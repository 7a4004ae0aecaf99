//! Visit enrichment
//!
//! Derives a ranked keyword list from a visit's free-text description
//! before the visit enters the join. The extraction algorithm itself
//! is a black box behind `KeywordExtractor`; the adapter here only
//! guarantees the contract the join relies on: pure, idempotent, and
//! never a reason to lose the event.

use std::collections::{HashMap, HashSet};

use petclinic_indexer_types::Visit;
use tracing::warn;

/// Keywords kept per visit, most relevant first.
pub const MAX_KEYWORDS: usize = 5;

/// Error from the keyword extraction service.
pub type ExtractError = Box<dyn std::error::Error + Send + Sync>;

/// Ranked keyword extraction from free text.
pub trait KeywordExtractor: Send + Sync {
    /// Keywords for `text`, best first. May return more than the
    /// caller wants; the adapter caps the list.
    fn keywords(&self, text: &str) -> Result<Vec<String>, ExtractError>;
}

/// Extractor that derives nothing. Used when enrichment is disabled
/// and in tests.
#[derive(Debug, Clone, Default)]
pub struct NoopExtractor;

impl KeywordExtractor for NoopExtractor {
    fn keywords(&self, _text: &str) -> Result<Vec<String>, ExtractError> {
        Ok(Vec::new())
    }
}

/// Stopwords that terminate a candidate phrase.
const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "an", "and", "any", "are", "as", "at", "be", "been", "before",
    "but", "by", "did", "do", "for", "from", "had", "has", "have", "he", "her", "his", "i", "in",
    "into", "is", "it", "its", "no", "not", "of", "on", "or", "she", "so", "that", "the", "their",
    "then", "there", "they", "this", "to", "was", "we", "were", "when", "which", "with", "would",
];

/// Rapid-automatic-keyword-extraction scorer (Rose et al.).
///
/// Candidate phrases are the runs of content words between stopwords
/// and punctuation; each phrase is scored by the summed
/// degree-to-frequency ratio of its words, so words that co-occur in
/// longer phrases outrank isolated ones. Deterministic and pure, which
/// keeps the enrichment step idempotent.
#[derive(Debug, Clone, Default)]
pub struct RakeExtractor;

impl RakeExtractor {
    pub fn new() -> Self {
        Self
    }

    fn is_stopword(word: &str) -> bool {
        STOPWORDS.binary_search(&word).is_ok()
    }

    /// Lowercased candidate phrases, split at stopwords and
    /// non-alphanumeric boundaries.
    fn phrases(text: &str) -> Vec<Vec<String>> {
        let mut phrases = Vec::new();
        let mut current: Vec<String> = Vec::new();
        for token in text.split(|c: char| !c.is_alphanumeric() && c != '\'') {
            let word = token.trim_matches('\'').to_lowercase();
            if word.is_empty() || Self::is_stopword(&word) {
                if !current.is_empty() {
                    phrases.push(std::mem::take(&mut current));
                }
            } else {
                current.push(word);
            }
        }
        if !current.is_empty() {
            phrases.push(current);
        }
        phrases
    }
}

impl KeywordExtractor for RakeExtractor {
    fn keywords(&self, text: &str) -> Result<Vec<String>, ExtractError> {
        let phrases = Self::phrases(text);

        let mut frequency: HashMap<&str, f64> = HashMap::new();
        let mut degree: HashMap<&str, f64> = HashMap::new();
        for phrase in &phrases {
            for word in phrase {
                *frequency.entry(word).or_default() += 1.0;
                *degree.entry(word).or_default() += (phrase.len() - 1) as f64;
            }
        }

        let mut scored: Vec<(f64, String)> = phrases
            .iter()
            .map(|phrase| {
                let score = phrase
                    .iter()
                    .map(|word| {
                        let freq = frequency[word.as_str()];
                        (degree[word.as_str()] + freq) / freq
                    })
                    .sum();
                (score, phrase.join(" "))
            })
            .collect();
        // Stable sort keeps first arrival ahead on equal scores
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut seen = HashSet::new();
        Ok(scored
            .into_iter()
            .filter(|(_, phrase)| seen.insert(phrase.clone()))
            .map(|(_, phrase)| phrase)
            .collect())
    }
}

/// Apply keyword enrichment to a visit.
///
/// Empty or absent description yields no keywords. A visit that
/// already carries keywords is returned unchanged, which makes the
/// step idempotent under redelivery. Extraction is best-effort: on
/// failure the visit proceeds unenriched rather than being held back.
pub fn enrich_visit(extractor: &dyn KeywordExtractor, mut visit: Visit) -> Visit {
    if !visit.keywords.is_empty() {
        return visit;
    }
    if let Some(text) = visit.description.as_deref() {
        if !text.trim().is_empty() {
            match extractor.keywords(text) {
                Ok(mut keywords) => {
                    keywords.truncate(MAX_KEYWORDS);
                    visit.keywords = keywords;
                }
                Err(err) => {
                    warn!(id = visit.id, %err, "keyword extraction failed, continuing unenriched");
                }
            }
        }
    }
    visit
}
