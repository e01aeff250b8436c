use crate::core::model::VisualRegion;
use crate::fusion::align::geometric_order;
use crate::fusion::resolve::claim_elements;

/// Drops undersized regions, ranks by `(confidence, area)` descending,
/// assigns element ownership in rank order and renames regions.
/// Returns the final regions and how many were filtered out.
pub fn finalize_regions(
    regions: Vec<VisualRegion>,
    min_final_region_area: i64,
) -> (Vec<VisualRegion>, usize) {
    let before = regions.len();
    let mut kept: Vec<VisualRegion> = regions
        .into_iter()
        .filter(|r| r.area >= min_final_region_area)
        .collect();
    let filtered = before - kept.len();

    kept.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b.area.cmp(&a.area))
            .then_with(|| geometric_order(a, b))
    });
    claim_elements(&mut kept);

    for (i, region) in kept.iter_mut().enumerate() {
        region.id = format!("visual_region_{i}");
        region.rank = Some(i + 1);
    }
    (kept, filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::BBox;
    use crate::core::model::RegionOrigin;

    #[test]
    fn filters_and_ranks() {
        let regions = vec![
            VisualRegion::new("m", BBox::new(0, 0, 50, 50), 2_500, RegionOrigin::Morphology, 0.7),
            VisualRegion::new("tiny", BBox::new(0, 0, 10, 10), 100, RegionOrigin::XyCut, 0.8),
            VisualRegion::new("x", BBox::new(0, 60, 40, 40), 1_600, RegionOrigin::XyCut, 0.8),
        ];
        let (ranked, filtered) = finalize_regions(regions, 1000);
        assert_eq!(filtered, 1);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].bbox, BBox::new(0, 60, 40, 40));
        assert_eq!(ranked[0].id, "visual_region_0");
        assert_eq!(ranked[0].rank, Some(1));
        assert_eq!(ranked[1].id, "visual_region_1");
    }
}
