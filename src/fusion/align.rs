use std::cmp::Ordering;

use crate::core::model::VisualRegion;

/// Evidence order: `confidence * area` descending, then larger area, then
/// top-left position and size so equal-evidence regions still sort stably.
pub fn evidence_order(a: &VisualRegion, b: &VisualRegion) -> Ordering {
    b.evidence()
        .total_cmp(&a.evidence())
        .then_with(|| b.area.cmp(&a.area))
        .then_with(|| geometric_order(a, b))
}

pub fn geometric_order(a: &VisualRegion, b: &VisualRegion) -> Ordering {
    (a.bbox.y, a.bbox.x, a.bbox.width, a.bbox.height).cmp(&(
        b.bbox.y,
        b.bbox.x,
        b.bbox.width,
        b.bbox.height,
    ))
}

/// Greedy overlap clustering over regions already in evidence order. Each
/// unconsumed region seeds a cluster and absorbs every later unconsumed
/// region whose IoU with the seed exceeds `threshold`.
pub fn cluster_overlaps(regions: &[VisualRegion], threshold: f64) -> Vec<Vec<usize>> {
    let mut consumed = vec![false; regions.len()];
    let mut clusters = Vec::new();

    for (seed_idx, seed) in regions.iter().enumerate() {
        if consumed[seed_idx] {
            continue;
        }
        consumed[seed_idx] = true;
        let mut cluster = vec![seed_idx];
        for (idx, other) in regions.iter().enumerate().skip(seed_idx + 1) {
            if consumed[idx] {
                continue;
            }
            if seed.bbox.iou(&other.bbox) > threshold {
                consumed[idx] = true;
                cluster.push(idx);
            }
        }
        clusters.push(cluster);
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::BBox;
    use crate::core::model::RegionOrigin;

    fn region(id: &str, bbox: BBox, confidence: f64) -> VisualRegion {
        VisualRegion::new(id, bbox, bbox.area(), RegionOrigin::XyCut, confidence)
    }

    #[test]
    fn clusters_overlapping_regions_around_seed() {
        let mut regions = vec![
            region("small", BBox::new(300, 300, 20, 20), 0.8),
            region("big", BBox::new(0, 0, 100, 100), 0.8),
            region("overlap", BBox::new(10, 10, 90, 90), 0.7),
        ];
        regions.sort_by(evidence_order);
        let ids: Vec<&str> = regions.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["big", "overlap", "small"]);

        let clusters = cluster_overlaps(&regions, 0.3);
        assert_eq!(clusters, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn equal_evidence_sorts_by_position() {
        let mut regions = vec![
            region("lower", BBox::new(0, 200, 50, 50), 0.7),
            region("upper", BBox::new(0, 0, 50, 50), 0.7),
        ];
        regions.sort_by(evidence_order);
        assert_eq!(regions[0].id, "upper");
    }
}
