pub mod quality;

use std::collections::{BTreeMap, HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ValidationConfig;
use crate::core::model::{
    FieldElement, FieldKind, FieldMatchResult, IssueKind, Severity, StructureTemplate,
    ValidationIssue,
};
use crate::matching::normalize::tokenize;

const VALID_SCORE: f64 = 1.0;
const WARNING_SCORE: f64 = 0.6;
const ERROR_SCORE: f64 = 0.0;
const MAX_FIELD_SUGGESTIONS: usize = 3;

static FORMAT_PATTERNS: Lazy<Vec<(ExpectedFormat, Regex)>> = Lazy::new(|| {
    [
        (ExpectedFormat::Phone, r"^1[3-9]\d{9}$"),
        (ExpectedFormat::Email, r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$"),
        (ExpectedFormat::IdCard, r"^\d{17}[\dxX]$"),
        (ExpectedFormat::Date, r"^\d{4}[-/]\d{1,2}[-/]\d{1,2}$"),
        (ExpectedFormat::Number, r"^\d+(\.\d+)?$"),
    ]
    .into_iter()
    .filter_map(|(format, pattern)| Regex::new(pattern).ok().map(|re| (format, re)))
    .collect()
});

/// Value formats that can be inferred from a field's label or input type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedFormat {
    Phone,
    Email,
    IdCard,
    Date,
    Number,
}

impl ExpectedFormat {
    fn hint(&self) -> &'static str {
        match self {
            ExpectedFormat::Phone => "check the phone number format (11 digits)",
            ExpectedFormat::Email => "check the email address format",
            ExpectedFormat::IdCard => "check the ID number format (18 characters)",
            ExpectedFormat::Date => "use a YYYY-MM-DD or YYYY/MM/DD date",
            ExpectedFormat::Number => "enter a plain number",
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        FORMAT_PATTERNS
            .iter()
            .find(|(format, _)| format == self)
            .map_or(true, |(_, re)| re.is_match(value))
    }
}

/// Label keywords checked in order; the first hit decides the format.
const FORMAT_KEYWORDS: &[(ExpectedFormat, &[&str])] = &[
    (ExpectedFormat::Phone, &["手机", "电话", "phone", "mobile"]),
    (ExpectedFormat::Email, &["邮箱", "邮件", "email"]),
    (ExpectedFormat::IdCard, &["身份证"]),
    (ExpectedFormat::Date, &["日期", "时间", "date", "年月"]),
    (ExpectedFormat::Number, &["年龄", "薪资", "工资", "分数", "数量"]),
];

/// Expected value format for a field, from its label first and its input
/// type second.
pub fn infer_format(label: &str, kind: FieldKind) -> Option<ExpectedFormat> {
    let lowered = label.to_lowercase();
    for (format, keywords) in FORMAT_KEYWORDS {
        if keywords.iter().any(|k| lowered.contains(k)) {
            return Some(*format);
        }
        // "id" only counts as a whole token, "width" is not an ID number.
        if *format == ExpectedFormat::IdCard && tokenize(&lowered).iter().any(|t| t == "id") {
            return Some(*format);
        }
    }
    match kind {
        FieldKind::Tel => Some(ExpectedFormat::Phone),
        FieldKind::Email => Some(ExpectedFormat::Email),
        FieldKind::Date => Some(ExpectedFormat::Date),
        FieldKind::Number => Some(ExpectedFormat::Number),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldStatus {
    Valid,
    Warning,
    Error,
}

impl FieldStatus {
    fn score(&self) -> f64 {
        match self {
            FieldStatus::Valid => VALID_SCORE,
            FieldStatus::Warning => WARNING_SCORE,
            FieldStatus::Error => ERROR_SCORE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValidation {
    pub selector: String,
    pub status: FieldStatus,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub issue: String,
    pub correction: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationStatistics {
    pub total_fields: usize,
    pub valid_fields: usize,
    pub warning_fields: usize,
    pub error_fields: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub overall_score: f64,
    pub field_validations: Vec<FieldValidation>,
    pub issues: Vec<ValidationIssue>,
    pub suggestions: Vec<String>,
    pub corrections: Vec<Correction>,
    pub statistics: ValidationStatistics,
}

impl ValidationReport {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }
}

/// Checks matched results against the form and its structure template.
#[derive(Debug, Clone, Default)]
pub struct ResultValidator {
    config: ValidationConfig,
}

impl ResultValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn validate(
        &self,
        results: &[FieldMatchResult],
        template: &StructureTemplate,
        elements: &[FieldElement],
    ) -> ValidationReport {
        let by_selector: HashMap<&str, &FieldElement> =
            elements.iter().map(|e| (e.selector.as_str(), e)).collect();

        let mut issues = Vec::new();
        let duplicates = duplicate_selectors(results);
        for selector in &duplicates {
            issues.push(
                ValidationIssue::new(
                    Severity::Error,
                    IssueKind::DuplicateSelector,
                    format!("selector {selector} is matched more than once"),
                )
                .for_selector(selector.as_str()),
            );
        }

        let mut field_validations = Vec::with_capacity(results.len());
        for result in results {
            let validation = if duplicates.contains(&result.selector) {
                FieldValidation {
                    selector: result.selector.clone(),
                    status: FieldStatus::Error,
                    score: ERROR_SCORE,
                    message: Some("duplicate selector".to_string()),
                    suggestions: Vec::new(),
                }
            } else {
                self.validate_field(result, by_selector.get(result.selector.as_str()).copied(), &mut issues)
            };
            field_validations.push(validation);
        }

        issues.extend(array_completeness(results, template));

        let statistics = ValidationStatistics {
            total_fields: field_validations.len(),
            valid_fields: count_status(&field_validations, FieldStatus::Valid),
            warning_fields: count_status(&field_validations, FieldStatus::Warning),
            error_fields: count_status(&field_validations, FieldStatus::Error),
        };
        let overall_score = if field_validations.is_empty() {
            0.0
        } else {
            field_validations.iter().map(|v| v.score).sum::<f64>() / field_validations.len() as f64
        };
        let is_valid = !issues.iter().any(|i| i.kind == IssueKind::DuplicateSelector);
        let suggestions = suggestions(&statistics, overall_score, &field_validations);
        let corrections = corrections(&issues);

        debug!(
            fields = statistics.total_fields,
            warnings = statistics.warning_fields,
            errors = statistics.error_fields,
            score = overall_score,
            is_valid,
            "validation finished"
        );
        ValidationReport {
            is_valid,
            overall_score,
            field_validations,
            issues,
            suggestions,
            corrections,
            statistics,
        }
    }

    fn validate_field(
        &self,
        result: &FieldMatchResult,
        element: Option<&FieldElement>,
        issues: &mut Vec<ValidationIssue>,
    ) -> FieldValidation {
        let mut validation = FieldValidation {
            selector: result.selector.clone(),
            status: FieldStatus::Valid,
            score: VALID_SCORE,
            message: None,
            suggestions: Vec::new(),
        };

        let Some(element) = element else {
            issues.push(
                ValidationIssue::new(
                    Severity::Warning,
                    IssueKind::UnknownSelector,
                    format!("selector {} is not present on the page", result.selector),
                )
                .for_selector(result.selector.as_str()),
            );
            validation.status = FieldStatus::Error;
            validation.score = ERROR_SCORE;
            validation.message = Some("field not found in form".to_string());
            return validation;
        };

        let value = result.value.trim();
        if value.is_empty() {
            issues.push(
                ValidationIssue::new(
                    Severity::Warning,
                    IssueKind::EmptyValue,
                    format!("field {} received an empty value", result.selector),
                )
                .for_selector(result.selector.as_str()),
            );
            validation.status = FieldStatus::Warning;
            validation.message = Some("empty value".to_string());
        } else if let Some(format) = infer_format(element.display_label(), element.kind) {
            if !format.matches(value) {
                issues.push(
                    ValidationIssue::new(
                        Severity::Warning,
                        IssueKind::FormatMismatch,
                        format!(
                            "value of {} does not look like a {:?} value",
                            result.selector, format
                        ),
                    )
                    .for_selector(result.selector.as_str()),
                );
                validation.status = FieldStatus::Warning;
                validation.message = Some("value format mismatch".to_string());
                validation.suggestions.push(format.hint().to_string());
            }
        }

        if result.confidence < self.config.low_confidence_threshold {
            validation
                .suggestions
                .push(format!("low match confidence ({:.2})", result.confidence));
        }
        validation.score = validation.status.score();
        validation
    }
}

/// Selectors used by more than one result, in first-seen order.
fn duplicate_selectors(results: &[FieldMatchResult]) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for result in results {
        *counts.entry(result.selector.as_str()).or_default() += 1;
    }
    let mut seen = HashSet::new();
    results
        .iter()
        .map(|r| r.selector.as_str())
        .filter(|s| counts.get(s).copied().unwrap_or(0) > 1 && seen.insert(*s))
        .map(str::to_string)
        .collect()
}

/// One warning per repeatable-group instance whose fields are not all
/// matched.
fn array_completeness(results: &[FieldMatchResult], template: &StructureTemplate) -> Vec<ValidationIssue> {
    let matched: HashSet<&str> = results.iter().map(|r| r.selector.as_str()).collect();
    let mut issues = Vec::new();
    for group in template.groups.iter().filter(|g| g.is_repeatable) {
        for (index, selectors) in group.array_instances() {
            let found = selectors.iter().filter(|s| matched.contains(*s)).count();
            if found < selectors.len() {
                issues.push(
                    ValidationIssue::new(
                        Severity::Warning,
                        IssueKind::IncompleteGroup,
                        format!(
                            "{} instance {} is incomplete: matched {}/{} fields",
                            group.title,
                            index,
                            found,
                            selectors.len()
                        ),
                    )
                    .for_group(group.id.as_str(), Some(index)),
                );
            }
        }
    }
    issues
}

fn count_status(validations: &[FieldValidation], status: FieldStatus) -> usize {
    validations.iter().filter(|v| v.status == status).count()
}

fn suggestions(stats: &ValidationStatistics, overall_score: f64, validations: &[FieldValidation]) -> Vec<String> {
    let mut out = Vec::new();
    if stats.total_fields == 0 {
        out.push("no fields were matched, check the recognised labels".to_string());
        return out;
    }
    let total = stats.total_fields as f64;
    if stats.error_fields as f64 / total > 0.2 {
        out.push("many fields failed validation, review the recognition output".to_string());
    }
    if stats.warning_fields as f64 / total > 0.3 {
        out.push("many fields carry warnings, check value formats".to_string());
    }
    if overall_score < 0.7 {
        out.push("overall quality is low, re-run structure analysis".to_string());
    } else if overall_score < 0.85 {
        out.push("some fields need improvement".to_string());
    }

    let mut field_level: Vec<&str> = Vec::new();
    for suggestion in validations.iter().flat_map(|v| v.suggestions.iter()) {
        if field_level.len() == MAX_FIELD_SUGGESTIONS {
            break;
        }
        if !field_level.contains(&suggestion.as_str()) {
            field_level.push(suggestion);
        }
    }
    out.extend(field_level.into_iter().map(str::to_string));
    out
}

fn corrections(issues: &[ValidationIssue]) -> Vec<Correction> {
    issues
        .iter()
        .filter_map(|issue| match issue.kind {
            IssueKind::DuplicateSelector => Some(Correction {
                issue: issue.message.clone(),
                correction: "remove the duplicate and keep the highest-confidence match".to_string(),
                priority: Priority::High,
            }),
            IssueKind::IncompleteGroup => Some(Correction {
                issue: issue.message.clone(),
                correction: "fill the missing fields of this instance or remove it".to_string(),
                priority: Priority::Medium,
            }),
            _ => None,
        })
        .collect()
}
