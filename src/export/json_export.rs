use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::export::Exporter;
use crate::pipeline::AnalysisResult;

pub const JSON_FILE_NAME: &str = "analysis.json";

#[derive(Debug, Clone)]
pub struct JsonExporter {
    out_dir: PathBuf,
}

impl JsonExporter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }
}

impl Exporter for JsonExporter {
    fn export(&self, result: &AnalysisResult) -> Result<PathBuf> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("creating {}", self.out_dir.display()))?;
        let path = self.out_dir.join(JSON_FILE_NAME);
        let data = serde_json::to_string_pretty(result)?;
        fs::write(&path, data).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}
