pub mod align;
pub mod finalize;
pub mod resolve;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{FusionConfig, FusionMode};
use crate::core::model::VisualRegion;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FusionStats {
    pub xy_cut_regions: usize,
    pub morphology_regions: usize,
    pub input_regions: usize,
    pub merge_rounds: usize,
    pub merged_regions: usize,
    pub filtered_small: usize,
    pub output_regions: usize,
    pub compression_ratio: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FusionOutcome {
    pub regions: Vec<VisualRegion>,
    pub stats: FusionStats,
}

pub trait FusionEngine {
    fn fuse(&self, xy_cut: &[VisualRegion], morphology: &[VisualRegion]) -> FusionOutcome;
}

/// Largest-evidence-first IoU merging, repeated until no two regions
/// overlap beyond the threshold.
#[derive(Debug, Clone, Default)]
pub struct GreedyFusionEngine {
    config: FusionConfig,
}

impl GreedyFusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    fn merge_until_stable(&self, mut regions: Vec<VisualRegion>) -> (Vec<VisualRegion>, usize) {
        let mut rounds = 0;
        loop {
            regions.sort_by(align::evidence_order);
            let clusters = align::cluster_overlaps(&regions, self.config.overlap_threshold);
            rounds += 1;
            if clusters.len() == regions.len() {
                return (regions, rounds);
            }
            debug!(
                round = rounds,
                before = regions.len(),
                after = clusters.len(),
                "merged overlapping regions"
            );
            regions = clusters
                .iter()
                .map(|members| resolve::merge_cluster(&regions, members))
                .collect();
        }
    }
}

impl FusionEngine for GreedyFusionEngine {
    fn fuse(&self, xy_cut: &[VisualRegion], morphology: &[VisualRegion]) -> FusionOutcome {
        let inputs: Vec<VisualRegion> = match self.config.fusion_mode {
            FusionMode::XyCut => xy_cut.to_vec(),
            FusionMode::Morphology => morphology.to_vec(),
            FusionMode::Hybrid => xy_cut.iter().chain(morphology).cloned().collect(),
        };
        let input_regions = inputs.len();

        let (merged, merge_rounds) = match self.config.fusion_mode {
            FusionMode::Hybrid => self.merge_until_stable(inputs),
            _ => (inputs, 0),
        };
        let merged_regions = merged.iter().filter(|r| !r.merged_from.is_empty()).count();
        let (regions, filtered_small) =
            finalize::finalize_regions(merged, self.config.min_final_region_area);

        let stats = FusionStats {
            xy_cut_regions: xy_cut.len(),
            morphology_regions: morphology.len(),
            input_regions,
            merge_rounds,
            merged_regions,
            filtered_small,
            output_regions: regions.len(),
            compression_ratio: if input_regions == 0 {
                0.0
            } else {
                regions.len() as f64 / input_regions as f64
            },
        };
        debug!(
            input = input_regions,
            output = stats.output_regions,
            merged = merged_regions,
            "fusion finished"
        );
        FusionOutcome { regions, stats }
    }
}
