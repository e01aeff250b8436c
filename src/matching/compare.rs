use std::collections::HashSet;

use strsim::normalized_levenshtein;

use crate::config::MatchingConfig;
use crate::core::model::MatchType;
use crate::matching::normalize::{char_len, normalize_label, tokenize};
use crate::matching::synonyms::SynonymTable;

const SYNONYM_TOKEN_BONUS: f64 = 0.3;

/// Layered label comparison. Strategies run in precedence order and the
/// first one returning a score decides the match.
#[derive(Debug, Clone, Default)]
pub struct LabelComparer {
    config: MatchingConfig,
}

impl LabelComparer {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    pub fn compare(&self, recognized: &str, form_label: &str) -> Option<(MatchType, f64)> {
        let a = normalize_label(recognized);
        let b = normalize_label(form_label);
        if a.is_empty() || b.is_empty() {
            return None;
        }
        if a == b {
            return Some((MatchType::Exact, 1.0));
        }
        if let Some(score) = SynonymTable::global().score(&a, &b) {
            return Some((MatchType::Synonym, score));
        }
        if let Some(score) = contain_score(&a, &b) {
            return Some((MatchType::Contain, score));
        }
        if let Some(score) = self.fuzzy_score(&a, &b) {
            return Some((MatchType::Fuzzy, score));
        }
        self.semantic_score(recognized, form_label)
            .map(|score| (MatchType::Semantic, score))
    }

    /// Edit similarity with a boost for short labels, accepted above
    /// `fuzzy_threshold`.
    pub fn fuzzy_score(&self, a: &str, b: &str) -> Option<f64> {
        let mut score = normalized_levenshtein(a, b);
        if char_len(a).min(char_len(b)) <= self.config.short_label_max_chars {
            score *= self.config.short_label_boost;
        }
        let score = score.min(1.0).min(self.config.fuzzy_ceiling);
        (score > self.config.fuzzy_threshold).then_some(score)
    }

    /// Token Jaccard plus a bonus per synonym token pair, accepted above
    /// `semantic_threshold`.
    pub fn semantic_score(&self, a: &str, b: &str) -> Option<f64> {
        let a_tokens: HashSet<String> = tokenize(a).into_iter().collect();
        let b_tokens: HashSet<String> = tokenize(b).into_iter().collect();
        if a_tokens.is_empty() || b_tokens.is_empty() {
            return None;
        }
        let intersection = a_tokens.intersection(&b_tokens).count() as f64;
        let union = a_tokens.union(&b_tokens).count() as f64;
        let jaccard = intersection / union;

        let table = SynonymTable::global();
        let pairs = a_tokens
            .iter()
            .flat_map(|x| b_tokens.iter().map(move |y| (x, y)))
            .filter(|(x, y)| x != y && table.share_group(x, y))
            .count();
        let score = (jaccard + SYNONYM_TOKEN_BONUS * pairs as f64)
            .min(1.0)
            .min(self.config.semantic_ceiling);
        (score > self.config.semantic_threshold).then_some(score)
    }
}

/// Shorter label (at least two characters) contained in the longer one:
/// `0.8 + 0.1 * length ratio`.
fn contain_score(a: &str, b: &str) -> Option<f64> {
    let (shorter, longer) = if char_len(a) < char_len(b) { (a, b) } else { (b, a) };
    let short_len = char_len(shorter);
    if short_len >= 2 && longer.contains(shorter) {
        Some(0.8 + 0.1 * short_len as f64 / char_len(longer) as f64)
    } else {
        None
    }
}
