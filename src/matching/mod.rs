pub mod compare;
pub mod normalize;
pub mod synonyms;

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MatchingConfig;
use crate::core::model::{FieldElement, FieldMatchResult, MatchCandidate, MatchType};

use self::compare::LabelComparer;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnmatchedLabel {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnmatchedField {
    pub selector: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MatchStatistics {
    pub total_labels: usize,
    pub total_fields: usize,
    pub matched_count: usize,
    pub match_rate: f64,
    pub average_confidence: f64,
    pub by_type: BTreeMap<MatchType, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MatchOutcome {
    pub results: Vec<FieldMatchResult>,
    pub unmatched_labels: Vec<UnmatchedLabel>,
    pub unmatched_fields: Vec<UnmatchedField>,
    pub statistics: MatchStatistics,
}

/// Scored pairing of one recognised label with one form field.
#[derive(Debug, Clone)]
struct Scored {
    label: usize,
    field: usize,
    candidate: MatchCandidate,
}

/// Maps recognised labels onto form fields; each label and each field is
/// used at most once.
#[derive(Debug, Clone, Default)]
pub struct FuzzyFieldMatcher {
    config: MatchingConfig,
    comparer: LabelComparer,
}

impl FuzzyFieldMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self {
            comparer: LabelComparer::new(config.clone()),
            config,
        }
    }

    /// Every form field the label matches under some strategy, best first.
    pub fn candidates_for(&self, label: &str, fields: &[FieldElement]) -> Vec<(usize, MatchCandidate)> {
        let mut found: Vec<(usize, MatchCandidate)> = fields
            .iter()
            .enumerate()
            .filter_map(|(idx, field)| {
                let form_label = field.display_label();
                self.comparer
                    .compare(label, form_label)
                    .map(|(match_type, confidence)| {
                        (
                            idx,
                            MatchCandidate {
                                label_from_model: label.to_string(),
                                form_field_label: form_label.to_string(),
                                match_type,
                                confidence,
                            },
                        )
                    })
            })
            .collect();
        found.sort_by(|(ia, a), (ib, b)| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.match_type.precedence().cmp(&b.match_type.precedence()))
                .then_with(|| ia.cmp(ib))
        });
        found
    }

    pub fn match_fields(
        &self,
        recognized: &IndexMap<String, String>,
        fields: &[FieldElement],
    ) -> MatchOutcome {
        let labels: Vec<(&String, &String)> = recognized.iter().collect();

        let mut scored: Vec<Scored> = labels
            .par_iter()
            .enumerate()
            .flat_map_iter(|(label_idx, (label, _))| {
                self.candidates_for(label, fields)
                    .into_iter()
                    .map(move |(field, candidate)| Scored {
                        label: label_idx,
                        field,
                        candidate,
                    })
            })
            .filter(|s| s.candidate.confidence >= self.config.acceptance_threshold)
            .collect();

        scored.sort_by(|a, b| {
            b.candidate
                .confidence
                .total_cmp(&a.candidate.confidence)
                .then_with(|| {
                    a.candidate
                        .match_type
                        .precedence()
                        .cmp(&b.candidate.match_type.precedence())
                })
                .then_with(|| a.label.cmp(&b.label))
                .then_with(|| a.field.cmp(&b.field))
        });

        let mut label_used = vec![false; labels.len()];
        let mut field_used: HashSet<usize> = HashSet::new();
        let mut chosen: Vec<Scored> = Vec::new();
        for entry in scored {
            if label_used[entry.label] || field_used.contains(&entry.field) {
                continue;
            }
            label_used[entry.label] = true;
            field_used.insert(entry.field);
            chosen.push(entry);
        }
        chosen.sort_by_key(|s| s.label);

        let results: Vec<FieldMatchResult> = chosen
            .into_iter()
            .map(|s| {
                let field = &fields[s.field];
                FieldMatchResult {
                    selector: field.selector.clone(),
                    kind: field.kind,
                    value: labels[s.label].1.clone(),
                    match_type: s.candidate.match_type,
                    confidence: s.candidate.confidence,
                    required: field.required,
                    recognized_label: s.candidate.label_from_model,
                    form_label: s.candidate.form_field_label,
                }
            })
            .collect();

        let unmatched_labels: Vec<UnmatchedLabel> = labels
            .iter()
            .zip(&label_used)
            .filter(|(_, used)| !**used)
            .map(|((label, value), _)| UnmatchedLabel {
                label: (*label).clone(),
                value: (*value).clone(),
            })
            .collect();
        let unmatched_fields: Vec<UnmatchedField> = fields
            .iter()
            .enumerate()
            .filter(|(idx, _)| !field_used.contains(idx))
            .map(|(_, field)| UnmatchedField {
                selector: field.selector.clone(),
                label: field.display_label().to_string(),
            })
            .collect();

        let statistics = statistics(labels.len(), fields.len(), &results);
        debug!(
            labels = statistics.total_labels,
            matched = statistics.matched_count,
            rate = statistics.match_rate,
            "field matching finished"
        );
        MatchOutcome {
            results,
            unmatched_labels,
            unmatched_fields,
            statistics,
        }
    }
}

fn statistics(total_labels: usize, total_fields: usize, results: &[FieldMatchResult]) -> MatchStatistics {
    let mut by_type = BTreeMap::new();
    for result in results {
        *by_type.entry(result.match_type).or_insert(0) += 1;
    }
    let matched_count = results.len();
    MatchStatistics {
        total_labels,
        total_fields,
        matched_count,
        match_rate: ratio(matched_count, total_labels),
        average_confidence: if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.confidence).sum::<f64>() / matched_count as f64
        },
        by_type,
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
