use tracing::debug;

use crate::config::XyCutConfig;
use crate::core::geometry::BBox;
use crate::core::model::{FieldElement, RegionOrigin, StopReason, VisualRegion};
use crate::segmentation::mask::OccupancyMask;
use crate::segmentation::{elements_centered_in, Segmenter};

pub const XY_CUT_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    /// Cuts along rows, stacking sub-rectangles vertically.
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy)]
struct Leaf {
    bbox: BBox,
    depth: usize,
    stop_reason: StopReason,
}

/// Recursive projection segmenter.
#[derive(Debug, Clone, Default)]
pub struct XyCutSegmenter {
    config: XyCutConfig,
}

impl XyCutSegmenter {
    pub fn new(config: XyCutConfig) -> Self {
        Self { config }
    }

    /// Cut positions (offsets into `profile`) at the midpoints of blank runs.
    pub fn find_cut_lines(&self, profile: &[u32]) -> Vec<u32> {
        let threshold = self.config.gap_threshold;
        let mut cuts = Vec::new();
        let mut run_start: Option<usize> = None;

        for (i, &count) in profile.iter().enumerate() {
            if count <= threshold {
                run_start.get_or_insert(i);
            } else if let Some(start) = run_start.take() {
                push_cut(&mut cuts, start, i, threshold);
            }
        }
        if let Some(start) = run_start {
            push_cut(&mut cuts, start, profile.len(), threshold);
        }

        if self.config.merge_close_cuts {
            merge_close_cuts(cuts, self.config.cut_merge_threshold)
        } else {
            cuts
        }
    }

    fn cut(&self, mask: &OccupancyMask, rect: BBox, depth: usize, leaves: &mut Vec<Leaf>) {
        if depth >= self.config.max_depth {
            leaves.push(Leaf {
                bbox: rect,
                depth,
                stop_reason: StopReason::MaxDepth,
            });
            return;
        }
        if rect.width < self.config.min_region_width as i32
            || rect.height < self.config.min_region_height as i32
        {
            leaves.push(Leaf {
                bbox: rect,
                depth,
                stop_reason: StopReason::MinSize,
            });
            return;
        }

        let row_cuts = self.find_cut_lines(&mask.row_profile(&rect));
        let column_cuts = self.find_cut_lines(&mask.column_profile(&rect));
        if row_cuts.is_empty() && column_cuts.is_empty() {
            leaves.push(Leaf {
                bbox: rect,
                depth,
                stop_reason: StopReason::NoCuts,
            });
            return;
        }

        let (axis, cuts) = if row_cuts.len() >= column_cuts.len() {
            (Axis::Horizontal, row_cuts)
        } else {
            (Axis::Vertical, column_cuts)
        };
        for sub in self.split(rect, axis, &cuts) {
            self.cut(mask, sub, depth + 1, leaves);
        }
    }

    /// Pieces between consecutive cuts; slivers under the minimum size along
    /// the cut axis are dropped.
    fn split(&self, rect: BBox, axis: Axis, cuts: &[u32]) -> Vec<BBox> {
        let (extent, min_piece) = match axis {
            Axis::Horizontal => (rect.height, self.config.min_region_height as i32),
            Axis::Vertical => (rect.width, self.config.min_region_width as i32),
        };
        let mut pieces = Vec::new();
        let mut prev = 0i32;
        for pos in cuts.iter().map(|&c| c as i32).chain(std::iter::once(extent)) {
            if pos > prev {
                let size = pos - prev;
                if size >= min_piece {
                    pieces.push(match axis {
                        Axis::Horizontal => BBox::new(rect.x, rect.y + prev, rect.width, size),
                        Axis::Vertical => BBox::new(rect.x + prev, rect.y, size, rect.height),
                    });
                }
            }
            prev = pos;
        }
        pieces
    }
}

fn push_cut(cuts: &mut Vec<u32>, start: usize, end: usize, threshold: u32) {
    let width = end - start;
    if width >= threshold as usize {
        cuts.push((start + width / 2) as u32);
    }
}

/// Keeps a cut only when it lies more than `threshold` past the last kept one.
fn merge_close_cuts(cuts: Vec<u32>, threshold: u32) -> Vec<u32> {
    let mut merged: Vec<u32> = Vec::with_capacity(cuts.len());
    for cut in cuts {
        match merged.last() {
            Some(&last) if cut - last <= threshold => {}
            _ => merged.push(cut),
        }
    }
    merged
}

impl Segmenter for XyCutSegmenter {
    fn name(&self) -> &'static str {
        "xy_cut"
    }

    fn segment(&self, mask: &OccupancyMask, elements: &[FieldElement]) -> Vec<VisualRegion> {
        let page = mask.bounds();
        if mask.is_blank() {
            debug!("blank occupancy mask, emitting a single empty region");
            let mut region = VisualRegion::new(
                "xy_cut_0",
                page,
                page.area(),
                RegionOrigin::XyCut,
                XY_CUT_CONFIDENCE,
            );
            region.depth = Some(0);
            region.stop_reason = Some(StopReason::Empty);
            return vec![region];
        }

        let mut leaves = Vec::new();
        self.cut(mask, page, 0, &mut leaves);
        debug!(leaves = leaves.len(), "xy-cut recursion finished");

        leaves
            .into_iter()
            .enumerate()
            .map(|(i, leaf)| {
                let mut region = VisualRegion::new(
                    format!("xy_cut_{i}"),
                    leaf.bbox,
                    leaf.bbox.area(),
                    RegionOrigin::XyCut,
                    XY_CUT_CONFIDENCE,
                )
                .with_elements(elements_centered_in(&leaf.bbox, elements));
                region.depth = Some(leaf.depth);
                region.stop_reason = Some(leaf.stop_reason);
                region
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Two full-width clusters of two stacked inputs each, 100px apart.
    pub(crate) fn two_cluster_page() -> Vec<FieldElement> {
        vec![
            FieldElement::new("#a1", "A1", BBox::new(20, 20, 360, 25)),
            FieldElement::new("#a2", "A2", BBox::new(20, 50, 360, 25)),
            FieldElement::new("#b1", "B1", BBox::new(20, 175, 360, 25)),
            FieldElement::new("#b2", "B2", BBox::new(20, 205, 360, 25)),
        ]
    }

    #[test]
    fn cut_lines_sit_at_run_midpoints() {
        let segmenter = XyCutSegmenter::default();
        let mut profile = vec![0u32; 20];
        profile.extend(vec![50; 30]);
        profile.extend(vec![3; 40]);
        profile.extend(vec![50; 10]);
        profile.extend(vec![0; 5]);
        // blank runs: [0,20) -> 10, [50,90) -> 70, trailing [100,105) too short
        assert_eq!(segmenter.find_cut_lines(&profile), vec![10, 70]);
    }

    #[test]
    fn close_cuts_are_merged() {
        assert_eq!(merge_close_cuts(vec![10, 25, 31, 60], 20), vec![10, 31, 60]);
        let segmenter = XyCutSegmenter::new(XyCutConfig {
            merge_close_cuts: false,
            ..XyCutConfig::default()
        });
        let mut profile = vec![0u32; 10];
        profile.extend(vec![9; 1]);
        profile.extend(vec![50; 2]);
        profile.extend(vec![0; 10]);
        assert_eq!(segmenter.find_cut_lines(&profile), vec![5, 18]);
    }

    #[test]
    fn separated_clusters_yield_two_leaves() {
        let elements = two_cluster_page();
        let mask = OccupancyMask::rasterize(&elements, 400, 250);
        let regions = XyCutSegmenter::default().segment(&mask, &elements);

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].elements, vec![0, 1]);
        assert_eq!(regions[1].elements, vec![2, 3]);
        assert!(regions.iter().all(|r| r.origin == RegionOrigin::XyCut));
        assert!(regions.iter().all(|r| r.confidence == XY_CUT_CONFIDENCE));
        assert_eq!(regions[0].bbox, BBox::new(15, 15, 370, 72));
        assert_eq!(regions[1].bbox, BBox::new(15, 162, 370, 73));
        assert_eq!(regions[0].stop_reason, Some(StopReason::MaxDepth));
    }

    #[test]
    fn blank_mask_gives_single_empty_region() {
        let mask = OccupancyMask::rasterize(&[], 300, 200);
        let regions = XyCutSegmenter::default().segment(&mask, &[]);
        assert_eq!(regions.len(), 1);
        assert!(regions[0].elements.is_empty());
        assert_eq!(regions[0].stop_reason, Some(StopReason::Empty));
    }

    #[test]
    fn small_page_stops_on_min_size() {
        let elements = vec![FieldElement::new("#a", "A", BBox::new(5, 5, 20, 10))];
        let mask = OccupancyMask::rasterize(&elements, 40, 20);
        let regions = XyCutSegmenter::default().segment(&mask, &elements);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].stop_reason, Some(StopReason::MinSize));
        assert_eq!(regions[0].elements, vec![0]);
    }
}
