use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::geometry::BBox;

/// Generic label texts that carry no meaning; skipped when picking an
/// element's display label.
const PLACEHOLDER_LABELS: &[&str] = &["unknown", "input", "text"];

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Textarea,
    Select,
    Radio,
    Checkbox,
    Date,
    Email,
    Tel,
    Number,
    Password,
    File,
    Submit,
    #[serde(other)]
    Other,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Textarea => "textarea",
            FieldKind::Select => "select",
            FieldKind::Radio => "radio",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Date => "date",
            FieldKind::Email => "email",
            FieldKind::Tel => "tel",
            FieldKind::Number => "number",
            FieldKind::Password => "password",
            FieldKind::File => "file",
            FieldKind::Submit => "submit",
            FieldKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssociatedLabel {
    pub text: String,
}

/// One form control as reported by the DOM extraction collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldElement {
    pub selector: String,
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub bbox: BBox,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associated_labels: Vec<AssociatedLabel>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Heading text of the enclosing section/fieldset, when the extractor found one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_title: Option<String>,
}

impl FieldElement {
    pub fn new(selector: impl Into<String>, label: impl Into<String>, bbox: BBox) -> Self {
        Self {
            selector: selector.into(),
            kind: FieldKind::Text,
            label: label.into(),
            name: None,
            bbox,
            associated_labels: Vec::new(),
            required: false,
            options: None,
            placeholder: None,
            container_title: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_container(mut self, title: impl Into<String>) -> Self {
        self.container_title = Some(title.into());
        self
    }

    /// Best-effort human label: explicit label, then associated labels,
    /// placeholder, name and finally the selector.
    pub fn display_label(&self) -> &str {
        let label = self.label.trim();
        if !label.is_empty() {
            return label;
        }
        self.associated_labels
            .iter()
            .map(|l| l.text.trim())
            .find(|text| !text.is_empty() && !PLACEHOLDER_LABELS.contains(text))
            .or_else(|| non_empty(self.placeholder.as_deref()))
            .or_else(|| non_empty(self.name.as_deref()))
            .unwrap_or(self.selector.as_str())
    }

    /// Stable identifier used for array-suffix detection.
    pub fn identifier(&self) -> &str {
        non_empty(self.name.as_deref()).unwrap_or(self.selector.as_str())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Input payload: every form element of a rendered page plus the viewport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub elements: Vec<FieldElement>,
    #[serde(default)]
    pub viewport: Viewport,
}

impl PageSnapshot {
    pub fn new(elements: Vec<FieldElement>, width: u32, height: u32) -> Self {
        Self {
            elements,
            viewport: Viewport { width, height },
        }
    }

    /// Page canvas: the viewport grown to cover every element.
    pub fn page_size(&self) -> (u32, u32) {
        let (mut width, mut height) = (self.viewport.width, self.viewport.height);
        for element in &self.elements {
            width = width.max(element.bbox.right().max(0) as u32);
            height = height.max(element.bbox.bottom().max(0) as u32);
        }
        (width, height)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RegionOrigin {
    XyCut,
    Morphology,
    Fusion,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxDepth,
    MinSize,
    NoCuts,
    Empty,
}

/// Rectangle produced by segmentation or fusion. `elements` holds indices
/// into the snapshot's element list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisualRegion {
    pub id: String,
    pub bbox: BBox,
    pub area: i64,
    #[serde(rename = "algorithm_origin")]
    pub origin: RegionOrigin,
    pub confidence: f64,
    pub elements: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merged_from: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
}

impl VisualRegion {
    pub fn new(id: impl Into<String>, bbox: BBox, area: i64, origin: RegionOrigin, confidence: f64) -> Self {
        Self {
            id: id.into(),
            bbox,
            area,
            origin,
            confidence,
            elements: Vec::new(),
            depth: None,
            stop_reason: None,
            merged_from: Vec::new(),
            rank: None,
        }
    }

    pub fn with_elements(mut self, elements: Vec<usize>) -> Self {
        self.elements = elements;
        self
    }

    /// Evidence weight used to order regions before fusion.
    pub fn evidence(&self) -> f64 {
        self.confidence * self.area as f64
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupSource {
    VisualRegion,
    Container,
    Position,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupedField {
    pub element: usize,
    pub selector: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub required: bool,
    pub bbox: BBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_base: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_category: Option<String>,
}

impl GroupedField {
    pub fn from_element(index: usize, element: &FieldElement) -> Self {
        Self {
            element: index,
            selector: element.selector.clone(),
            label: element.display_label().to_string(),
            kind: element.kind,
            required: element.required,
            bbox: element.bbox,
            array_index: None,
            array_base: None,
            semantic_category: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogicalGroup {
    pub id: String,
    pub title: String,
    pub is_repeatable: bool,
    pub fields: Vec<GroupedField>,
    pub source: GroupSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
}

impl LogicalGroup {
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Selectors per array index, for fields that carry one.
    pub fn array_instances(&self) -> BTreeMap<u32, Vec<&str>> {
        let mut instances: BTreeMap<u32, Vec<&str>> = BTreeMap::new();
        for field in &self.fields {
            if let Some(index) = field.array_index {
                instances.entry(index).or_default().push(field.selector.as_str());
            }
        }
        instances
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMethod {
    VisualRegions,
    ContainerTitles,
    #[default]
    Positional,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TemplateMetadata {
    pub total_groups: usize,
    pub total_fields: usize,
    pub repeatable_groups: usize,
    pub single_groups: usize,
    pub generation_method: GroupingMethod,
}

/// Ordered logical groups plus summary counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StructureTemplate {
    pub groups: Vec<LogicalGroup>,
    pub metadata: TemplateMetadata,
}

impl StructureTemplate {
    pub fn new(groups: Vec<LogicalGroup>, generation_method: GroupingMethod) -> Self {
        let repeatable_groups = groups.iter().filter(|g| g.is_repeatable).count();
        let metadata = TemplateMetadata {
            total_groups: groups.len(),
            total_fields: groups.iter().map(LogicalGroup::field_count).sum(),
            repeatable_groups,
            single_groups: groups.len() - repeatable_groups,
            generation_method,
        };
        Self { groups, metadata }
    }

    pub fn group_titles(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.title.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Synonym,
    Contain,
    Fuzzy,
    Semantic,
}

impl MatchType {
    /// Position in the strategy precedence, 0 = strongest.
    pub fn precedence(&self) -> u8 {
        match self {
            MatchType::Exact => 0,
            MatchType::Synonym => 1,
            MatchType::Contain => 2,
            MatchType::Fuzzy => 3,
            MatchType::Semantic => 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchCandidate {
    pub label_from_model: String,
    pub form_field_label: String,
    pub match_type: MatchType,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldMatchResult {
    pub selector: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub value: String,
    pub match_type: MatchType,
    pub confidence: f64,
    pub required: bool,
    pub recognized_label: String,
    pub form_label: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    DuplicateSelector,
    UnknownSelector,
    IncompleteGroup,
    FormatMismatch,
    EmptyValue,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub kind: IssueKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_index: Option<u32>,
}

impl ValidationIssue {
    pub fn new(severity: Severity, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            group_id: None,
            selector: None,
            array_index: None,
        }
    }

    pub fn for_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn for_group(mut self, group_id: impl Into<String>, array_index: Option<u32>) -> Self {
        self.group_id = Some(group_id.into());
        self.array_index = array_index;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityAssessment {
    pub overall_score: f64,
    pub level: QualityLevel,
    pub semantic_coverage: f64,
    pub group_balance: f64,
    pub structure_complexity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_label_falls_back_through_hints() {
        let mut field = FieldElement::new("#school_1", "", BBox::new(0, 0, 10, 10));
        field.associated_labels = vec![
            AssociatedLabel {
                text: "input".to_string(),
            },
            AssociatedLabel {
                text: " 学校 ".to_string(),
            },
        ];
        assert_eq!(field.display_label(), "学校");

        field.associated_labels.clear();
        field.placeholder = Some("请输入学校".to_string());
        assert_eq!(field.display_label(), "请输入学校");

        field.placeholder = None;
        assert_eq!(field.display_label(), "#school_1");
    }

    #[test]
    fn identifier_prefers_name() {
        let field = FieldElement::new("#a", "A", BBox::default()).with_name("school_2");
        assert_eq!(field.identifier(), "school_2");
        let field = FieldElement::new("#a", "A", BBox::default()).with_name("  ");
        assert_eq!(field.identifier(), "#a");
    }

    #[test]
    fn unknown_field_kind_deserializes_as_other() {
        let field: FieldElement = serde_json::from_str(
            r##"{"selector":"#x","type":"color","bbox":{"x":0,"y":0,"width":1,"height":1}}"##,
        )
        .expect("valid element json");
        assert_eq!(field.kind, FieldKind::Other);
        assert!(!field.required);
    }

    #[test]
    fn page_size_grows_to_cover_elements() {
        let page = PageSnapshot::new(
            vec![FieldElement::new("#a", "A", BBox::new(100, 1500, 200, 40))],
            1200,
            1400,
        );
        assert_eq!(page.page_size(), (1200, 1540));
    }
}
