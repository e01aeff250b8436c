pub mod density;
pub mod mask;
pub mod morphology;
pub mod xy_cut;

use tracing::{debug, info_span};

use crate::config::AnalysisConfig;
use crate::core::geometry::BBox;
use crate::core::model::{FieldElement, VisualRegion};

use self::mask::OccupancyMask;
use self::morphology::MorphologicalClusterer;
use self::xy_cut::XyCutSegmenter;

pub trait Segmenter {
    fn name(&self) -> &'static str;
    fn segment(&self, mask: &OccupancyMask, elements: &[FieldElement]) -> Vec<VisualRegion>;
}

/// Raw hypotheses from both segmentation families, before fusion.
#[derive(Debug, Clone, Default)]
pub struct SegmentationOutput {
    pub xy_cut: Vec<VisualRegion>,
    pub morphology: Vec<VisualRegion>,
    pub occupied_pixels: u64,
}

impl SegmentationOutput {
    pub fn total_regions(&self) -> usize {
        self.xy_cut.len() + self.morphology.len()
    }
}

pub fn segment_page(
    elements: &[FieldElement],
    width: u32,
    height: u32,
    config: &AnalysisConfig,
) -> SegmentationOutput {
    let mask = OccupancyMask::rasterize(elements, width, height);
    let xy_cut = run_segmenter(&XyCutSegmenter::new(config.xy_cut.clone()), &mask, elements);
    let morphology = run_segmenter(
        &MorphologicalClusterer::new(config.morphology.clone()),
        &mask,
        elements,
    );
    SegmentationOutput {
        xy_cut,
        morphology,
        occupied_pixels: mask.occupied_pixels(),
    }
}

fn run_segmenter(
    segmenter: &dyn Segmenter,
    mask: &OccupancyMask,
    elements: &[FieldElement],
) -> Vec<VisualRegion> {
    let _span = info_span!("segmenter", name = segmenter.name()).entered();
    let regions = segmenter.segment(mask, elements);
    debug!(regions = regions.len(), "segmenter finished");
    regions
}

/// Indices of elements whose integer centre lies inside `bbox`, edges included.
pub fn elements_centered_in(bbox: &BBox, elements: &[FieldElement]) -> Vec<usize> {
    elements
        .iter()
        .enumerate()
        .filter(|(_, element)| bbox.contains_point(element.bbox.center()))
        .map(|(i, _)| i)
        .collect()
}
