use std::collections::HashSet;

use crate::core::geometry::BBox;
use crate::core::model::{RegionOrigin, VisualRegion};

/// Collapses one overlap cluster into a single region. Singletons pass
/// through untouched.
pub fn merge_cluster(regions: &[VisualRegion], members: &[usize]) -> VisualRegion {
    if let [only] = members {
        return regions[*only].clone();
    }

    let parts: Vec<&VisualRegion> = members.iter().map(|&i| &regions[i]).collect();
    let bbox = BBox::enclosing(parts.iter().map(|r| &r.bbox)).unwrap_or_default();
    let confidence = parts.iter().map(|r| r.confidence).sum::<f64>() / parts.len() as f64;

    let mut seen = HashSet::new();
    let mut elements = Vec::new();
    let mut merged_from = Vec::new();
    for part in &parts {
        elements.extend(part.elements.iter().copied().filter(|e| seen.insert(*e)));
        if part.merged_from.is_empty() {
            merged_from.push(part.id.clone());
        } else {
            merged_from.extend(part.merged_from.iter().cloned());
        }
    }
    elements.sort_unstable();

    let mut merged = VisualRegion::new(
        parts[0].id.clone(),
        bbox,
        bbox.area(),
        RegionOrigin::Fusion,
        confidence,
    )
    .with_elements(elements);
    merged.merged_from = merged_from;
    merged
}

/// Lets each element stay only in the first region (in `ranked` order) that
/// lists it.
pub fn claim_elements(ranked: &mut [VisualRegion]) {
    let mut claimed = HashSet::new();
    for region in ranked.iter_mut() {
        region.elements.retain(|e| claimed.insert(*e));
    }
}
