use crate::core::model::{QualityAssessment, QualityLevel, StructureTemplate};

const COVERAGE_WEIGHT: f64 = 0.4;
const BALANCE_WEIGHT: f64 = 0.3;
const COMPLEXITY_WEIGHT: f64 = 0.3;

/// Weighted quality score of one analysis run.
pub fn assess_quality(template: &StructureTemplate, matched_fields: usize, total_fields: usize) -> QualityAssessment {
    let sizes: Vec<usize> = template.groups.iter().map(|g| g.field_count()).collect();
    let semantic_coverage = if total_fields == 0 {
        0.0
    } else {
        (matched_fields as f64 / total_fields as f64).clamp(0.0, 1.0)
    };
    let group_balance = group_balance(&sizes);
    let structure_complexity = complexity_fit(sizes.len());

    let overall_score = (COVERAGE_WEIGHT * semantic_coverage
        + BALANCE_WEIGHT * group_balance
        + COMPLEXITY_WEIGHT * structure_complexity)
        .clamp(0.0, 1.0);

    QualityAssessment {
        overall_score,
        level: level_for(overall_score),
        semantic_coverage,
        group_balance,
        structure_complexity,
    }
}

/// `1 - min(stdev / mean, 1)` over group sizes.
pub fn group_balance(sizes: &[usize]) -> f64 {
    if sizes.is_empty() {
        return 0.0;
    }
    let n = sizes.len() as f64;
    let mean = sizes.iter().sum::<usize>() as f64 / n;
    if mean == 0.0 {
        return 1.0;
    }
    let variance = sizes.iter().map(|&s| (s as f64 - mean).powi(2)).sum::<f64>() / n;
    1.0 - (variance.sqrt() / mean).min(1.0)
}

/// Peaks for three to six groups.
pub fn complexity_fit(group_count: usize) -> f64 {
    match group_count {
        3..=6 => 1.0,
        2..=8 => 0.8,
        1..=10 => 0.6,
        _ => 0.3,
    }
}

pub fn level_for(score: f64) -> QualityLevel {
    if score >= 0.85 {
        QualityLevel::Excellent
    } else if score >= 0.70 {
        QualityLevel::Good
    } else if score >= 0.55 {
        QualityLevel::Fair
    } else {
        QualityLevel::Poor
    }
}
