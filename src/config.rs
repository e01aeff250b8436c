use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct XyCutConfig {
    pub gap_threshold: u32,
    pub min_region_width: u32,
    pub min_region_height: u32,
    pub max_depth: usize,
    pub cut_merge_threshold: u32,
    pub merge_close_cuts: bool,
}

impl Default for XyCutConfig {
    fn default() -> Self {
        Self {
            gap_threshold: 10,
            min_region_width: 50,
            min_region_height: 30,
            max_depth: 5,
            cut_merge_threshold: 20,
            merge_close_cuts: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MorphologyConfig {
    pub kernel_size: u32,
    pub erosion_iterations: u32,
    pub dilation_iterations: u32,
    pub min_component_area: u64,
    pub filter_small_components: bool,
    pub use_dbscan: bool,
    pub dbscan_eps: f64,
    pub dbscan_min_samples: usize,
    pub min_cluster_size: usize,
}

impl Default for MorphologyConfig {
    fn default() -> Self {
        Self {
            kernel_size: 20,
            erosion_iterations: 1,
            dilation_iterations: 2,
            min_component_area: 500,
            filter_small_components: true,
            use_dbscan: true,
            dbscan_eps: 80.0,
            dbscan_min_samples: 2,
            min_cluster_size: 2,
        }
    }
}

/// Which segmentation hypotheses feed the fused region set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FusionMode {
    XyCut,
    Morphology,
    #[default]
    Hybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FusionConfig {
    pub overlap_threshold: f64,
    pub min_final_region_area: i64,
    pub fusion_mode: FusionMode,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: 0.3,
            min_final_region_area: 1000,
            fusion_mode: FusionMode::Hybrid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StructureConfig {
    pub position_gap_threshold: i32,
    pub array_ratio_threshold: f64,
    pub demote_inconsistent_arrays: bool,
    pub group_title_prefix: String,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            position_gap_threshold: 100,
            array_ratio_threshold: 0.5,
            demote_inconsistent_arrays: true,
            group_title_prefix: "Group".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchingConfig {
    pub acceptance_threshold: f64,
    pub fuzzy_threshold: f64,
    pub semantic_threshold: f64,
    pub short_label_max_chars: usize,
    pub short_label_boost: f64,
    /// Upper bounds that keep each strategy below the ones preceding it.
    pub fuzzy_ceiling: f64,
    pub semantic_ceiling: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: 0.6,
            fuzzy_threshold: 0.6,
            semantic_threshold: 0.7,
            short_label_max_chars: 4,
            short_label_boost: 1.1,
            fuzzy_ceiling: 0.89,
            semantic_ceiling: 0.88,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ValidationConfig {
    pub low_confidence_threshold: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: 0.7,
        }
    }
}

/// Per-request analysis settings. Sections are flattened so a config file
/// uses the flat keys (`gap_threshold`, `kernel_size`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    #[serde(flatten)]
    pub xy_cut: XyCutConfig,
    #[serde(flatten)]
    pub morphology: MorphologyConfig,
    #[serde(flatten)]
    pub fusion: FusionConfig,
    #[serde(flatten)]
    pub structure: StructureConfig,
    #[serde(flatten)]
    pub matching: MatchingConfig,
    #[serde(flatten)]
    pub validation: ValidationConfig,
    pub recognition_timeout_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            xy_cut: XyCutConfig::default(),
            morphology: MorphologyConfig::default(),
            fusion: FusionConfig::default(),
            structure: StructureConfig::default(),
            matching: MatchingConfig::default(),
            validation: ValidationConfig::default(),
            recognition_timeout_ms: 60_000,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.xy_cut.max_depth == 0 {
            return Err(AnalysisError::Config("max_depth must be at least 1".into()));
        }
        if self.morphology.kernel_size == 0 {
            return Err(AnalysisError::Config("kernel_size must be positive".into()));
        }
        if !(self.morphology.dbscan_eps > 0.0) {
            return Err(AnalysisError::Config("dbscan_eps must be positive".into()));
        }
        if self.morphology.dbscan_min_samples == 0 {
            return Err(AnalysisError::Config(
                "dbscan_min_samples must be at least 1".into(),
            ));
        }
        let unit = [
            ("overlap_threshold", self.fusion.overlap_threshold),
            ("array_ratio_threshold", self.structure.array_ratio_threshold),
            ("acceptance_threshold", self.matching.acceptance_threshold),
            ("fuzzy_threshold", self.matching.fuzzy_threshold),
            ("semantic_threshold", self.matching.semantic_threshold),
            ("fuzzy_ceiling", self.matching.fuzzy_ceiling),
            ("semantic_ceiling", self.matching.semantic_ceiling),
            ("low_confidence_threshold", self.validation.low_confidence_threshold),
        ];
        for (key, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(AnalysisError::Config(format!(
                    "{key} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.matching.short_label_boost < 1.0 {
            return Err(AnalysisError::Config(
                "short_label_boost must not shrink scores".into(),
            ));
        }
        if self.recognition_timeout_ms == 0 {
            return Err(AnalysisError::Config(
                "recognition_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}
