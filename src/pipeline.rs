use std::collections::{BTreeMap, HashSet};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn, Span};

use crate::config::AnalysisConfig;
use crate::core::model::{
    FieldMatchResult, LogicalGroup, MatchType, PageSnapshot, QualityAssessment, StructureTemplate,
    TemplateMetadata, ValidationIssue, Viewport, VisualRegion,
};
use crate::error::{AnalysisError, Result};
use crate::fusion::{FusionEngine, FusionStats, GreedyFusionEngine};
use crate::matching::{FuzzyFieldMatcher, UnmatchedField, UnmatchedLabel};
use crate::recognition::{RecognitionRequest, SemanticRecognizer};
use crate::segmentation::segment_page;
use crate::structure::StructureGrouper;
use crate::validation::quality::assess_quality;
use crate::validation::{ResultValidator, ValidationReport};

/// Largest canvas the rasteriser accepts, in pixels. Morphology keeps
/// several copies of the mask alive at once.
pub const MAX_PAGE_PIXELS: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Segmenting,
    Fusing,
    Grouping,
    AwaitingExternalRecognition,
    Matching,
    Validating,
    Done,
    Failed,
}

impl PipelinePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelinePhase::Segmenting => "segmenting",
            PipelinePhase::Fusing => "fusing",
            PipelinePhase::Grouping => "grouping",
            PipelinePhase::AwaitingExternalRecognition => "awaiting_external_recognition",
            PipelinePhase::Matching => "matching",
            PipelinePhase::Validating => "validating",
            PipelinePhase::Done => "done",
            PipelinePhase::Failed => "failed",
        }
    }

    fn span(&self) -> Span {
        match self {
            PipelinePhase::Segmenting => info_span!("segmenting"),
            PipelinePhase::Fusing => info_span!("fusing"),
            PipelinePhase::Grouping => info_span!("grouping"),
            PipelinePhase::AwaitingExternalRecognition => info_span!("awaiting_external_recognition"),
            PipelinePhase::Matching => info_span!("matching"),
            PipelinePhase::Validating => info_span!("validating"),
            PipelinePhase::Done => info_span!("done"),
            PipelinePhase::Failed => info_span!("failed"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisStatistics {
    pub total_elements: usize,
    pub total_regions: usize,
    pub total_groups: usize,
    pub repeatable_groups: usize,
    pub total_labels: usize,
    pub matched_fields: usize,
    pub unmatched_fields: usize,
    pub unmatched_labels: usize,
    pub match_rate: f64,
    pub field_coverage: f64,
    pub average_confidence: f64,
    pub recognition_confidence: f64,
    pub by_match_type: BTreeMap<MatchType, usize>,
}

/// Everything one analysis produced. Failed runs keep the outputs of the
/// phases that completed and carry `failed_phase` plus `error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_phase: Option<PipelinePhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub completed_phases: Vec<PipelinePhase>,
    pub page: Viewport,
    pub visual_regions: Vec<VisualRegion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fusion: Option<FusionStats>,
    pub logical_groups: Vec<LogicalGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateMetadata>,
    pub matching_results: Vec<FieldMatchResult>,
    pub unmatched_labels: Vec<UnmatchedLabel>,
    pub unmatched_fields: Vec<UnmatchedField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<AnalysisStatistics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_assessment: Option<QualityAssessment>,
    pub issues: Vec<ValidationIssue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
}

/// Current phase plus the transition log.
struct PhaseTracker {
    current: PipelinePhase,
    completed: Vec<PipelinePhase>,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            current: PipelinePhase::Segmenting,
            completed: Vec::new(),
        }
    }

    fn advance(&mut self, next: PipelinePhase) {
        info!(from = self.current.as_str(), to = next.as_str(), "pipeline transition");
        self.completed.push(self.current);
        self.current = next;
    }
}

/// Sequences segmentation, fusion, grouping, recognition, matching and
/// validation for one page snapshot.
pub struct PipelineOrchestrator {
    config: AnalysisConfig,
    recognizer: Box<dyn SemanticRecognizer>,
}

impl PipelineOrchestrator {
    pub fn new(config: AnalysisConfig, recognizer: Box<dyn SemanticRecognizer>) -> Self {
        Self { config, recognizer }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Full analysis. Never fails: aborts are reported inside the result.
    pub fn analyze(&self, snapshot: &PageSnapshot, profile: Option<serde_json::Value>) -> AnalysisResult {
        let mut out = AnalysisResult::default();
        let mut tracker = PhaseTracker::new();
        let outcome = match self.layout(snapshot, &mut out, &mut tracker) {
            Ok(template) => self.recognize_and_match(snapshot, profile, &template, &mut out, &mut tracker),
            Err(err) => Err(err),
        };
        finish(out, tracker, outcome)
    }

    /// Segmentation, fusion and grouping only.
    pub fn segment(&self, snapshot: &PageSnapshot) -> AnalysisResult {
        let mut out = AnalysisResult::default();
        let mut tracker = PhaseTracker::new();
        let outcome = self.layout(snapshot, &mut out, &mut tracker).map(|_| ());
        finish(out, tracker, outcome)
    }

    fn layout(
        &self,
        snapshot: &PageSnapshot,
        out: &mut AnalysisResult,
        tracker: &mut PhaseTracker,
    ) -> Result<StructureTemplate> {
        let elements = &snapshot.elements;

        let segmentation = {
            let _span = PipelinePhase::Segmenting.span().entered();
            self.config.validate()?;
            let (width, height) = check_snapshot(snapshot)?;
            out.page = Viewport { width, height };
            segment_page(elements, width, height, &self.config)
        };
        info!(
            xy_cut = segmentation.xy_cut.len(),
            morphology = segmentation.morphology.len(),
            occupied_pixels = segmentation.occupied_pixels,
            "segmentation finished"
        );
        tracker.advance(PipelinePhase::Fusing);

        let fused = {
            let _span = PipelinePhase::Fusing.span().entered();
            GreedyFusionEngine::new(self.config.fusion.clone())
                .fuse(&segmentation.xy_cut, &segmentation.morphology)
        };
        if fused.regions.is_empty() {
            warn!("no visual regions survived fusion, grouping falls back to container titles");
        }
        out.visual_regions = fused.regions;
        out.fusion = Some(fused.stats);
        tracker.advance(PipelinePhase::Grouping);

        let template = {
            let _span = PipelinePhase::Grouping.span().entered();
            StructureGrouper::new(self.config.structure.clone()).group(&out.visual_regions, elements)
        };
        out.logical_groups = template.groups.clone();
        out.template = Some(template.metadata.clone());
        Ok(template)
    }

    fn recognize_and_match(
        &self,
        snapshot: &PageSnapshot,
        profile: Option<serde_json::Value>,
        template: &StructureTemplate,
        out: &mut AnalysisResult,
        tracker: &mut PhaseTracker,
    ) -> Result<()> {
        let elements = &snapshot.elements;
        tracker.advance(PipelinePhase::AwaitingExternalRecognition);

        let recognition = {
            let _span = PipelinePhase::AwaitingExternalRecognition.span().entered();
            let request = RecognitionRequest::from_template(template, elements, profile);
            let timeout = Duration::from_millis(self.config.recognition_timeout_ms);
            let started = Instant::now();
            let recognition = self.recognizer.recognize(&request, timeout)?;
            if started.elapsed() > timeout {
                return Err(AnalysisError::RecognitionTimeout(timeout));
            }
            recognition
        };
        info!(
            labels = recognition.labels.len(),
            confidence = recognition.confidence,
            "semantic recognition finished"
        );
        tracker.advance(PipelinePhase::Matching);

        let matched = {
            let _span = PipelinePhase::Matching.span().entered();
            FuzzyFieldMatcher::new(self.config.matching.clone()).match_fields(&recognition.labels, elements)
        };
        tracker.advance(PipelinePhase::Validating);

        let report = {
            let _span = PipelinePhase::Validating.span().entered();
            ResultValidator::new(self.config.validation.clone()).validate(&matched.results, template, elements)
        };
        let quality = assess_quality(template, matched.results.len(), elements.len());

        out.statistics = Some(AnalysisStatistics {
            total_elements: elements.len(),
            total_regions: out.visual_regions.len(),
            total_groups: template.metadata.total_groups,
            repeatable_groups: template.metadata.repeatable_groups,
            total_labels: matched.statistics.total_labels,
            matched_fields: matched.statistics.matched_count,
            unmatched_fields: matched.unmatched_fields.len(),
            unmatched_labels: matched.unmatched_labels.len(),
            match_rate: matched.statistics.match_rate,
            field_coverage: quality.semantic_coverage,
            average_confidence: matched.statistics.average_confidence,
            recognition_confidence: recognition.confidence,
            by_match_type: matched.statistics.by_type.clone(),
        });
        out.quality_assessment = Some(quality);
        out.matching_results = matched.results;
        out.unmatched_labels = matched.unmatched_labels;
        out.unmatched_fields = matched.unmatched_fields;
        out.issues = report.issues.clone();
        out.validation = Some(report);
        Ok(())
    }
}

fn finish(mut out: AnalysisResult, mut tracker: PhaseTracker, outcome: Result<()>) -> AnalysisResult {
    match outcome {
        Ok(()) => {
            tracker.advance(PipelinePhase::Done);
            out.success = true;
        }
        Err(err) => {
            warn!(phase = tracker.current.as_str(), error = %err, "analysis aborted");
            out.success = false;
            out.failed_phase = Some(tracker.current);
            out.error = Some(err.to_string());
            tracker.current = PipelinePhase::Failed;
        }
    }
    out.completed_phases = tracker.completed;
    out
}

/// Rejects payloads the segmenters cannot work with and returns the page
/// canvas size.
pub fn check_snapshot(snapshot: &PageSnapshot) -> Result<(u32, u32)> {
    if snapshot.elements.is_empty() {
        return Err(AnalysisError::FatalInput("snapshot contains no elements".to_string()));
    }
    let mut seen = HashSet::new();
    for element in &snapshot.elements {
        if element.selector.trim().is_empty() {
            return Err(AnalysisError::FatalInput("element without a selector".to_string()));
        }
        if element.bbox.width < 0 || element.bbox.height < 0 {
            return Err(AnalysisError::FatalInput(format!(
                "element {} has a negative size ({}x{})",
                element.selector, element.bbox.width, element.bbox.height
            )));
        }
        let bbox = element.bbox;
        if bbox.x.checked_add(bbox.width).is_none() || bbox.y.checked_add(bbox.height).is_none() {
            return Err(AnalysisError::FatalInput(format!(
                "element {} lies outside the addressable page ({}, {})",
                element.selector, bbox.x, bbox.y
            )));
        }
        if !seen.insert(element.selector.as_str()) {
            return Err(AnalysisError::FatalInput(format!(
                "selector {} appears more than once",
                element.selector
            )));
        }
    }
    let (width, height) = snapshot.page_size();
    if width == 0 || height == 0 {
        return Err(AnalysisError::FatalInput(format!("page has no area ({width}x{height})")));
    }
    let pixels = u64::from(width) * u64::from(height);
    if pixels > MAX_PAGE_PIXELS {
        return Err(AnalysisError::FatalInput(format!(
            "page {width}x{height} exceeds {MAX_PAGE_PIXELS} pixels"
        )));
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    use crate::core::geometry::BBox;
    use crate::core::model::FieldElement;
    use crate::recognition::{Recognition, StaticRecognizer};

    struct FailingRecognizer;

    impl SemanticRecognizer for FailingRecognizer {
        fn recognize(&self, _request: &RecognitionRequest, _timeout: Duration) -> Result<Recognition> {
            Err(AnalysisError::Recognition("service unavailable".to_string()))
        }
    }

    fn snapshot() -> PageSnapshot {
        PageSnapshot::new(
            vec![
                FieldElement::new("#name", "姓名", BBox::new(20, 20, 360, 25)),
                FieldElement::new("#email", "邮箱", BBox::new(20, 50, 360, 25)),
            ],
            400,
            250,
        )
    }

    fn orchestrator(labels: &[(&str, &str)]) -> PipelineOrchestrator {
        let labels: IndexMap<String, String> =
            labels.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        PipelineOrchestrator::new(AnalysisConfig::default(), Box::new(StaticRecognizer::new(labels)))
    }

    #[test]
    fn successful_run_walks_every_phase() {
        let result = orchestrator(&[("姓名", "张三")]).analyze(&snapshot(), None);
        assert!(result.success);
        assert_eq!(result.failed_phase, None);
        assert_eq!(
            result.completed_phases,
            vec![
                PipelinePhase::Segmenting,
                PipelinePhase::Fusing,
                PipelinePhase::Grouping,
                PipelinePhase::AwaitingExternalRecognition,
                PipelinePhase::Matching,
                PipelinePhase::Validating,
            ]
        );
        assert_eq!(result.matching_results.len(), 1);
        assert_eq!(result.unmatched_fields.len(), 1);
        let stats = result.statistics.expect("statistics");
        assert_eq!(stats.matched_fields, 1);
        assert_eq!(stats.field_coverage, 0.5);
        assert!(result.validation.expect("report").is_valid);
    }

    #[test]
    fn empty_snapshot_fails_while_segmenting() {
        let result = orchestrator(&[]).analyze(&PageSnapshot::default(), None);
        assert!(!result.success);
        assert_eq!(result.failed_phase, Some(PipelinePhase::Segmenting));
        assert!(result.error.as_deref().is_some_and(|e| e.contains("no elements")));
        assert!(result.visual_regions.is_empty());
        assert!(result.completed_phases.is_empty());
    }

    #[test]
    fn recognition_failure_is_reported_with_phase() {
        let orchestrator = PipelineOrchestrator::new(AnalysisConfig::default(), Box::new(FailingRecognizer));
        let result = orchestrator.analyze(&snapshot(), None);
        assert!(!result.success);
        assert_eq!(result.failed_phase, Some(PipelinePhase::AwaitingExternalRecognition));
        assert!(!result.logical_groups.is_empty());
        assert!(result.matching_results.is_empty());
        assert!(result.statistics.is_none());
    }

    #[test]
    fn segment_stops_after_grouping() {
        let result = orchestrator(&[]).segment(&snapshot());
        assert!(result.success);
        assert_eq!(result.completed_phases.last(), Some(&PipelinePhase::Grouping));
        assert_eq!(result.template.map(|t| t.total_fields), Some(2));
        assert!(result.validation.is_none());
    }

    #[test]
    fn rejects_malformed_snapshots() {
        let mut duplicate = snapshot();
        duplicate.elements[1].selector = "#name".to_string();
        assert!(matches!(check_snapshot(&duplicate), Err(AnalysisError::FatalInput(_))));

        let mut negative = snapshot();
        negative.elements[0].bbox.width = -5;
        assert!(matches!(check_snapshot(&negative), Err(AnalysisError::FatalInput(_))));

        let huge = PageSnapshot::new(snapshot().elements, 40_000, 2_000);
        assert!(matches!(check_snapshot(&huge), Err(AnalysisError::FatalInput(_))));

        let tall = PageSnapshot::new(snapshot().elements, 400, 60_000);
        assert!(check_snapshot(&tall).is_ok());

        let mut overflowing = snapshot();
        overflowing.elements[0].bbox = BBox::new(2_000_000_000, 0, 500_000_000, 10);
        assert!(matches!(check_snapshot(&overflowing), Err(AnalysisError::FatalInput(_))));

        let mut far = snapshot();
        far.elements[0].bbox = BBox::new(1_000_000_000, 0, 100, 10);
        assert!(matches!(check_snapshot(&far), Err(AnalysisError::FatalInput(_))));

        assert_eq!(check_snapshot(&snapshot()).ok(), Some((400, 250)));
    }
}
