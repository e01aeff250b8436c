use std::collections::HashSet;
use std::fs;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use indexmap::IndexMap;
use pretty_assertions::assert_eq;

use formgeom::config::{AnalysisConfig, FusionMode};
use formgeom::core::geometry::BBox;
use formgeom::core::model::{
    FieldElement, FieldKind, FieldMatchResult, IssueKind, MatchType, PageSnapshot, RegionOrigin,
    Severity, StructureTemplate,
};
use formgeom::error::AnalysisError;
use formgeom::export::{Exporter, HtmlDebugExporter, JsonExporter};
use formgeom::fusion::{FusionEngine, GreedyFusionEngine};
use formgeom::matching::FuzzyFieldMatcher;
use formgeom::pipeline::{AnalysisResult, PipelineOrchestrator, PipelinePhase};
use formgeom::recognition::{Recognition, RecognitionRequest, SemanticRecognizer, StaticRecognizer};
use formgeom::segmentation::segment_page;
use formgeom::structure::StructureGrouper;
use formgeom::validation::ResultValidator;

/// Two stacked inputs per section, sections 100px apart on a 400x250 page.
fn application_form() -> PageSnapshot {
    PageSnapshot::new(
        vec![
            FieldElement::new("#name", "姓名", BBox::new(20, 20, 360, 25)),
            FieldElement::new("#email", "邮箱", BBox::new(20, 50, 360, 25)).with_kind(FieldKind::Email),
            FieldElement::new("#school", "学校", BBox::new(20, 175, 360, 25)),
            FieldElement::new("#major", "专业", BBox::new(20, 205, 360, 25)),
        ],
        400,
        250,
    )
}

fn labels(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn static_pipeline(pairs: &[(&str, &str)]) -> PipelineOrchestrator {
    PipelineOrchestrator::new(
        AnalysisConfig::default(),
        Box::new(StaticRecognizer::new(labels(pairs))),
    )
}

fn matched(selector: &str, value: &str) -> FieldMatchResult {
    FieldMatchResult {
        selector: selector.to_string(),
        kind: FieldKind::Text,
        value: value.to_string(),
        match_type: MatchType::Exact,
        confidence: 1.0,
        required: false,
        recognized_label: String::new(),
        form_label: String::new(),
    }
}

struct SlowRecognizer(Duration);

impl SemanticRecognizer for SlowRecognizer {
    fn recognize(&self, _request: &RecognitionRequest, _timeout: Duration) -> formgeom::Result<Recognition> {
        thread::sleep(self.0);
        Ok(Recognition::default())
    }
}

#[test]
fn xy_cut_splits_separated_clusters_into_two_leaves() {
    let snapshot = application_form();
    let output = segment_page(&snapshot.elements, 400, 250, &AnalysisConfig::default());
    assert_eq!(output.xy_cut.len(), 2);
    assert!(output.xy_cut.iter().all(|r| r.origin == RegionOrigin::XyCut));
    assert_eq!(output.xy_cut[0].elements, vec![0, 1]);
    assert_eq!(output.xy_cut[1].elements, vec![2, 3]);
}

#[test]
fn end_to_end_analysis_matches_labels() -> Result<()> {
    let pipeline = static_pipeline(&[
        ("姓名", "张三"),
        ("电子邮件", "zhang.san@example.com"),
        ("毕业院校", "清华大学"),
        ("民族", "汉"),
    ]);
    let result = pipeline.analyze(&application_form(), None);

    assert!(result.success, "analysis failed: {:?}", result.error);
    assert_eq!(result.completed_phases.last(), Some(&PipelinePhase::Validating));

    let by_selector: Vec<(&str, MatchType)> = result
        .matching_results
        .iter()
        .map(|m| (m.selector.as_str(), m.match_type))
        .collect();
    assert_eq!(
        by_selector,
        vec![
            ("#name", MatchType::Exact),
            ("#email", MatchType::Synonym),
            ("#school", MatchType::Synonym),
        ]
    );
    assert_eq!(result.matching_results[0].confidence, 1.0);
    assert_eq!(result.unmatched_labels.len(), 1);
    assert_eq!(result.unmatched_labels[0].label, "民族");
    assert_eq!(result.unmatched_fields.len(), 1);
    assert_eq!(result.unmatched_fields[0].selector, "#major");

    let validation = result.validation.as_ref().expect("validation report");
    assert!(validation.is_valid);
    assert_eq!(validation.overall_score, 1.0);
    let quality = result.quality_assessment.as_ref().expect("quality");
    assert_eq!(quality.semantic_coverage, 0.75);
    Ok(())
}

#[test]
fn every_element_lands_in_exactly_one_group_and_region() {
    let result = static_pipeline(&[]).segment(&application_form());
    assert!(result.success);

    let mut in_groups = HashSet::new();
    for group in &result.logical_groups {
        for field in &group.fields {
            assert!(in_groups.insert(field.element), "element {} grouped twice", field.element);
        }
    }
    assert_eq!(in_groups.len(), 4);

    let mut in_regions = HashSet::new();
    for region in &result.visual_regions {
        for element in &region.elements {
            assert!(in_regions.insert(*element), "element {element} in two regions");
        }
    }
}

#[test]
fn fusion_of_fused_output_is_stable() {
    let snapshot = application_form();
    let config = AnalysisConfig::default();
    let output = segment_page(&snapshot.elements, 400, 250, &config);
    let engine = GreedyFusionEngine::new(config.fusion.clone());

    let first = engine.fuse(&output.xy_cut, &output.morphology);
    let second = engine.fuse(&first.regions, &[]);
    assert_eq!(first.regions, second.regions);
}

#[test]
fn density_clusters_fuse_with_xy_cut_regions() {
    // 4px rules vanish under erosion, so only the DBSCAN pass finds them.
    let elements = vec![
        FieldElement::new("#a1", "A1", BBox::new(20, 20, 300, 4)),
        FieldElement::new("#a2", "A2", BBox::new(20, 30, 300, 4)),
        FieldElement::new("#b1", "B1", BBox::new(20, 200, 300, 4)),
        FieldElement::new("#b2", "B2", BBox::new(20, 210, 300, 4)),
    ];
    let config = AnalysisConfig::default();
    assert_eq!(config.fusion.fusion_mode, FusionMode::Hybrid);
    let output = segment_page(&elements, 400, 250, &config);

    let density: Vec<(&str, &[usize])> = output
        .morphology
        .iter()
        .map(|r| (r.id.as_str(), r.elements.as_slice()))
        .collect();
    assert_eq!(density, vec![("dbscan_0", &[0, 1][..]), ("dbscan_1", &[2, 3][..])]);

    let outcome = GreedyFusionEngine::new(config.fusion.clone()).fuse(&output.xy_cut, &output.morphology);
    assert_eq!(outcome.stats.morphology_regions, 2);
    assert_eq!(outcome.stats.xy_cut_regions, output.xy_cut.len());

    let owner = |element: usize| {
        let owners: Vec<&str> = outcome
            .regions
            .iter()
            .filter(|r| r.elements.contains(&element))
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(owners.len(), 1, "element {element} owned by {owners:?}");
        owners[0]
    };
    assert_eq!(owner(0), owner(1));
    assert_eq!(owner(2), owner(3));
}

#[test]
fn out_of_range_geometry_fails_as_fatal_input() -> Result<()> {
    let mut snapshot = application_form();
    snapshot.elements[0].bbox = BBox::new(2_000_000_000, 0, 500_000_000, 10);
    let result = static_pipeline(&[("姓名", "张三")]).analyze(&snapshot, None);

    assert!(!result.success);
    assert_eq!(result.failed_phase, Some(PipelinePhase::Segmenting));
    assert!(result.error.as_deref().is_some_and(|e| e.starts_with("invalid input")));
    assert!(result.visual_regions.is_empty());

    let mut oversized = application_form();
    oversized.elements[3].bbox = BBox::new(20, 205, 360, 200_000);
    let oversized = static_pipeline(&[]).segment(&oversized);
    assert_eq!(oversized.failed_phase, Some(PipelinePhase::Segmenting));
    Ok(())
}

#[test]
fn label_without_overlap_has_no_match() {
    let snapshot = application_form();
    let matcher = FuzzyFieldMatcher::default();
    assert!(matcher.candidates_for("宠物品种", &snapshot.elements).is_empty());

    let outcome = matcher.match_fields(&labels(&[("宠物品种", "柯基")]), &snapshot.elements);
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.unmatched_fields.len(), 4);
}

#[test]
fn duplicate_selectors_yield_one_issue_each() {
    let snapshot = application_form();
    let results = vec![
        matched("#name", "张三"),
        matched("#name", "李四"),
        matched("#school", "清华大学"),
        matched("#school", "北京大学"),
        matched("#major", "计算机"),
    ];
    let report = ResultValidator::default().validate(&results, &StructureTemplate::default(), &snapshot.elements);

    assert!(!report.is_valid);
    let duplicates: Vec<&str> = report
        .issues
        .iter()
        .filter(|i| i.kind == IssueKind::DuplicateSelector)
        .filter_map(|i| i.selector.as_deref())
        .collect();
    assert_eq!(duplicates, vec!["#name", "#school"]);
    assert!(report.errors().all(|i| i.kind == IssueKind::DuplicateSelector));
}

#[test]
fn incomplete_array_instance_is_flagged() {
    let elements = vec![
        FieldElement::new("#school_1", "学校", BBox::new(20, 20, 300, 25)).with_name("school_1"),
        FieldElement::new("#major_1", "专业", BBox::new(20, 55, 300, 25)).with_name("major_1"),
        FieldElement::new("#school_2", "学校", BBox::new(20, 90, 300, 25)).with_name("school_2"),
    ];
    let template = StructureGrouper::new(AnalysisConfig::default().structure).group(&[], &elements);
    assert_eq!(template.groups.len(), 1);
    assert!(template.groups[0].is_repeatable);

    let results = vec![matched("#school_1", "清华大学"), matched("#major_1", "计算机")];
    let report = ResultValidator::default().validate(&results, &template, &elements);
    let incomplete: Vec<_> = report
        .issues
        .iter()
        .filter(|i| i.kind == IssueKind::IncompleteGroup)
        .collect();
    assert_eq!(incomplete.len(), 1);
    assert_eq!(incomplete[0].array_index, Some(2));
    assert_eq!(incomplete[0].severity, Severity::Warning);
    assert!(report.is_valid);
}

#[test]
fn slow_recognizer_fails_the_recognition_phase() {
    let config = AnalysisConfig {
        recognition_timeout_ms: 10,
        ..AnalysisConfig::default()
    };
    let pipeline = PipelineOrchestrator::new(config, Box::new(SlowRecognizer(Duration::from_millis(60))));
    let result = pipeline.analyze(&application_form(), None);

    assert!(!result.success);
    assert_eq!(result.failed_phase, Some(PipelinePhase::AwaitingExternalRecognition));
    assert!(result.error.as_deref().is_some_and(|e| e.contains("timed out")));
    assert!(result.matching_results.is_empty());
    assert!(result.quality_assessment.is_none());
}

#[test]
fn malformed_input_fails_before_segmentation_output() {
    let mut snapshot = application_form();
    snapshot.elements[2].bbox = BBox::new(20, 175, -10, 25);
    let result = static_pipeline(&[("姓名", "张三")]).analyze(&snapshot, None);

    assert!(!result.success);
    assert_eq!(result.failed_phase, Some(PipelinePhase::Segmenting));
    assert!(result.visual_regions.is_empty());
    assert!(result.logical_groups.is_empty());
}

#[test]
fn invalid_config_is_rejected() {
    let err = AnalysisConfig::from_json_str(r#"{"overlap_threshold": 1.5}"#).unwrap_err();
    assert!(matches!(err, AnalysisError::Config(_)));

    let config = AnalysisConfig::from_json_str(r#"{"gap_threshold": 15, "kernel_size": 9}"#).unwrap();
    assert_eq!(config.xy_cut.gap_threshold, 15);
    assert_eq!(config.morphology.kernel_size, 9);
}

#[test]
fn exporters_write_json_and_html() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let result = static_pipeline(&[("姓名", "张三")]).analyze(&application_form(), None);

    let json_path = JsonExporter::new(dir.path().to_path_buf()).export(&result)?;
    let html_path = HtmlDebugExporter::new(dir.path().to_path_buf()).export(&result)?;

    assert_eq!(json_path, dir.path().join("analysis.json"));
    assert_eq!(html_path, dir.path().join("layout.html"));
    let parsed: AnalysisResult = serde_json::from_str(&fs::read_to_string(&json_path)?)?;
    assert!(parsed.success);
    assert_eq!(parsed.matching_results.len(), 1);
    assert!(fs::read_to_string(&html_path)?.contains("data-selector='#name'"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn command_recognizer_feeds_the_pipeline() {
    use formgeom::recognition::bridge::CommandRecognizer;

    let recognizer = CommandRecognizer::new("sh".into()).with_args(vec![
        "-c".to_string(),
        r#"cat > /dev/null; printf '```json\n{"field_mappings": {"姓名": "张三"}, "confidence": 0.9}\n```'"#
            .to_string(),
    ]);
    let result = PipelineOrchestrator::new(AnalysisConfig::default(), Box::new(recognizer))
        .analyze(&application_form(), None);

    assert!(result.success, "analysis failed: {:?}", result.error);
    assert_eq!(result.matching_results.len(), 1);
    assert_eq!(result.matching_results[0].value, "张三");
    let stats = result.statistics.expect("statistics");
    assert_eq!(stats.recognition_confidence, 0.9);
}
