pub mod html_debug_export;
pub mod json_export;

use std::path::PathBuf;

use anyhow::Result;

use crate::pipeline::AnalysisResult;

pub use html_debug_export::HtmlDebugExporter;
pub use json_export::JsonExporter;

pub trait Exporter {
    /// Writes the result and returns the path of the file produced.
    fn export(&self, result: &AnalysisResult) -> Result<PathBuf>;
}
