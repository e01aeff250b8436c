use std::collections::{BTreeMap, HashSet};

use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::morphology::{dilate, erode};
use imageproc::region_labelling::{connected_components, Connectivity};
use tracing::debug;

use crate::config::MorphologyConfig;
use crate::core::geometry::BBox;
use crate::core::model::{FieldElement, RegionOrigin, VisualRegion};
use crate::segmentation::density::dbscan;
use crate::segmentation::mask::{OccupancyMask, EMPTY};
use crate::segmentation::{elements_centered_in, Segmenter};

pub const MORPHOLOGY_CONFIDENCE: f64 = 0.7;

/// Clusters overlapping at or above this share of elements are redundant.
const CLUSTER_OVERLAP_LIMIT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    pub label: u32,
    pub bbox: BBox,
    pub area: i64,
}

#[derive(Debug, Clone, Copy)]
struct Extent {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    pixels: i64,
}

/// Dilation/erosion clustering plus DBSCAN over element centres.
#[derive(Debug, Clone, Default)]
pub struct MorphologicalClusterer {
    config: MorphologyConfig,
}

impl MorphologicalClusterer {
    pub fn new(config: MorphologyConfig) -> Self {
        Self { config }
    }

    fn radius(&self) -> u8 {
        (self.config.kernel_size / 2).clamp(1, u32::from(u8::MAX)) as u8
    }

    /// Erosion then dilation with a disc of diameter `kernel_size`.
    pub fn process(&self, mask: &GrayImage) -> GrayImage {
        let radius = self.radius();
        let mut processed = mask.clone();
        for _ in 0..self.config.erosion_iterations {
            processed = erode(&processed, Norm::L2, radius);
        }
        for _ in 0..self.config.dilation_iterations {
            processed = dilate(&processed, Norm::L2, radius);
        }
        processed
    }

    /// 8-connected components of a processed mask, ordered by label.
    pub fn components(&self, processed: &GrayImage) -> Vec<Component> {
        let labels = connected_components(processed, Connectivity::Eight, EMPTY);
        let mut extents: BTreeMap<u32, Extent> = BTreeMap::new();
        for (x, y, pixel) in labels.enumerate_pixels() {
            let label = pixel[0];
            if label == 0 {
                continue;
            }
            extents
                .entry(label)
                .and_modify(|e| {
                    e.min_x = e.min_x.min(x);
                    e.min_y = e.min_y.min(y);
                    e.max_x = e.max_x.max(x);
                    e.max_y = e.max_y.max(y);
                    e.pixels += 1;
                })
                .or_insert(Extent {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                    pixels: 1,
                });
        }

        extents
            .into_iter()
            .map(|(label, e)| Component {
                label,
                bbox: BBox::new(
                    e.min_x as i32,
                    e.min_y as i32,
                    (e.max_x - e.min_x + 1) as i32,
                    (e.max_y - e.min_y + 1) as i32,
                ),
                area: e.pixels,
            })
            .filter(|c| {
                !self.config.filter_small_components
                    || c.area >= self.config.min_component_area as i64
            })
            .collect()
    }

    fn morphology_regions(&self, mask: &OccupancyMask, elements: &[FieldElement]) -> Vec<VisualRegion> {
        let processed = self.process(mask.image());
        self.components(&processed)
            .into_iter()
            .filter_map(|component| {
                let members = elements_centered_in(&component.bbox, elements);
                (!members.is_empty()).then(|| {
                    VisualRegion::new(
                        format!("morph_{}", component.label),
                        component.bbox,
                        component.area,
                        RegionOrigin::Morphology,
                        MORPHOLOGY_CONFIDENCE,
                    )
                    .with_elements(members)
                })
            })
            .collect()
    }

    fn density_regions(&self, elements: &[FieldElement]) -> Vec<VisualRegion> {
        let centers: Vec<[f64; 2]> = elements
            .iter()
            .map(|e| {
                let (x, y) = e.bbox.center();
                [f64::from(x), f64::from(y)]
            })
            .collect();
        dbscan(&centers, self.config.dbscan_eps, self.config.dbscan_min_samples)
            .into_iter()
            .filter(|cluster| cluster.len() >= self.config.min_cluster_size)
            .enumerate()
            .filter_map(|(i, cluster)| {
                let bbox = BBox::enclosing(cluster.iter().map(|&idx| &elements[idx].bbox))?;
                Some(
                    VisualRegion::new(
                        format!("dbscan_{i}"),
                        bbox,
                        bbox.area(),
                        RegionOrigin::Morphology,
                        MORPHOLOGY_CONFIDENCE,
                    )
                    .with_elements(cluster),
                )
            })
            .collect()
    }
}

/// Drops clusters whose elements are mostly claimed by a larger cluster.
fn remove_redundant_clusters(mut clusters: Vec<VisualRegion>) -> Vec<VisualRegion> {
    clusters.sort_by(|a, b| b.elements.len().cmp(&a.elements.len()));
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut kept = Vec::with_capacity(clusters.len());
    for cluster in clusters {
        if cluster.elements.is_empty() {
            continue;
        }
        let overlap = cluster.elements.iter().filter(|i| claimed.contains(i)).count();
        if (overlap as f64) / (cluster.elements.len() as f64) < CLUSTER_OVERLAP_LIMIT {
            claimed.extend(cluster.elements.iter().copied());
            kept.push(cluster);
        }
    }
    kept
}

impl Segmenter for MorphologicalClusterer {
    fn name(&self) -> &'static str {
        "morphology"
    }

    fn segment(&self, mask: &OccupancyMask, elements: &[FieldElement]) -> Vec<VisualRegion> {
        if mask.is_blank() {
            debug!("blank occupancy mask, no clusters");
            return Vec::new();
        }
        let mut clusters = self.morphology_regions(mask, elements);
        let morphology_count = clusters.len();
        if self.config.use_dbscan {
            clusters.extend(self.density_regions(elements));
        }
        debug!(
            morphology = morphology_count,
            dbscan = clusters.len() - morphology_count,
            "clusters before redundancy filter"
        );
        remove_redundant_clusters(clusters)
    }
}
