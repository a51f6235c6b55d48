//! Specialization classifier.
//!
//! Maps request content signals and hints to the configured capability tags,
//! producing a relevance score per tag in [0, 1]. The router folds the
//! top-ranked tags into selection weights as a specialization bonus; when no
//! tag clears the relevance threshold, all backends are treated as equally
//! generic so ambiguous classification never starves a backend.

use crate::config::ClassifierConfig;
use crate::routing::RoutingRequest;

/// Score assigned when the request's kind hint names a tag outright.
const KIND_HINT_SCORE: f64 = 0.9;

/// Keyword-signal classifier over the configured capability tags.
pub struct SpecializationClassifier {
    /// (tag, lowercased keywords), sorted by tag for deterministic ranking
    tags: Vec<(String, Vec<String>)>,
}

impl SpecializationClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        let mut tags: Vec<(String, Vec<String>)> = config
            .tags
            .iter()
            .map(|(tag, keywords)| {
                (
                    tag.clone(),
                    keywords.iter().map(|k| k.to_lowercase()).collect(),
                )
            })
            .collect();
        tags.sort_by(|a, b| a.0.cmp(&b.0));
        Self { tags }
    }

    /// Rank the configured tags against a request.
    ///
    /// Returns (tag, score) pairs with score > 0, ordered by descending
    /// score, ties broken by tag name for reproducibility.
    pub fn classify(&self, request: &RoutingRequest) -> Vec<(String, f64)> {
        let digest = request.content_digest.to_lowercase();
        let kind = request.kind_hint.as_deref().map(str::to_lowercase);

        let mut scores: Vec<(String, f64)> = self
            .tags
            .iter()
            .filter_map(|(tag, keywords)| {
                let mut score = keyword_score(&digest, keywords);
                if kind.as_deref() == Some(tag.as_str()) {
                    score = score.max(KIND_HINT_SCORE);
                }
                (score > 0.0).then(|| (tag.clone(), score.min(1.0)))
            })
            .collect();

        scores.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scores
    }
}

/// Fraction of a tag's keywords present in the digest.
fn keyword_score(digest: &str, keywords: &[String]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let matched = keywords.iter().filter(|k| digest.contains(k.as_str())).count();
    matched as f64 / keywords.len() as f64
}
