pub mod bridge;
pub mod response;

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::model::{FieldElement, StructureTemplate};
use crate::error::Result;

/// What the external recogniser is told about the form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RecognitionRequest {
    pub form_labels: Vec<String>,
    pub group_titles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<serde_json::Value>,
}

impl RecognitionRequest {
    pub fn from_template(
        template: &StructureTemplate,
        elements: &[FieldElement],
        profile: Option<serde_json::Value>,
    ) -> Self {
        let form_labels = template
            .groups
            .iter()
            .flat_map(|g| g.fields.iter().map(|f| elements[f.element].display_label().to_string()))
            .collect();
        Self {
            form_labels,
            group_titles: template.group_titles().into_iter().map(str::to_string).collect(),
            profile,
        }
    }
}

/// Recognised semantic label -> value pairs, in model order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Recognition {
    pub labels: IndexMap<String, String>,
    pub confidence: f64,
}

/// Boundary to the vision-language collaborator. Implementations block
/// until a result is available or `timeout` elapses.
pub trait SemanticRecognizer {
    fn recognize(&self, request: &RecognitionRequest, timeout: Duration) -> Result<Recognition>;
}

/// Returns a fixed label map; used when labels were recognised upstream.
#[derive(Debug, Clone, Default)]
pub struct StaticRecognizer {
    labels: IndexMap<String, String>,
}

impl StaticRecognizer {
    pub fn new(labels: IndexMap<String, String>) -> Self {
        Self { labels }
    }
}

impl SemanticRecognizer for StaticRecognizer {
    fn recognize(&self, _request: &RecognitionRequest, _timeout: Duration) -> Result<Recognition> {
        Ok(Recognition {
            labels: self.labels.clone(),
            confidence: 1.0,
        })
    }
}
