pub mod array;
pub mod semantic;
pub mod titles;

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use crate::config::StructureConfig;
use crate::core::model::{
    FieldElement, GroupSource, GroupedField, GroupingMethod, LogicalGroup, StructureTemplate,
    VisualRegion,
};

use self::array::{detect_group, ArrayPatternDetector, SuffixPatternDetector};

/// Element indices collected for one group before annotation.
#[derive(Debug, Clone)]
struct RawGroup {
    members: Vec<usize>,
    source: GroupSource,
    region_id: Option<String>,
    title: Option<String>,
}

/// Turns fused regions (or container/position hints) into logical groups.
pub struct StructureGrouper {
    config: StructureConfig,
    detector: Box<dyn ArrayPatternDetector>,
}

impl StructureGrouper {
    pub fn new(config: StructureConfig) -> Self {
        Self::with_detector(config, Box::new(SuffixPatternDetector))
    }

    pub fn with_detector(config: StructureConfig, detector: Box<dyn ArrayPatternDetector>) -> Self {
        Self { config, detector }
    }

    pub fn group(&self, regions: &[VisualRegion], elements: &[FieldElement]) -> StructureTemplate {
        let populated: Vec<&VisualRegion> = regions
            .iter()
            .filter(|r| r.elements.iter().any(|&e| e < elements.len()))
            .collect();

        let (mut raw, method) = if populated.is_empty() {
            debug!("no populated visual regions, falling back to container titles");
            self.fallback_groups(elements)
        } else {
            (self.region_groups(&populated, elements), GroupingMethod::VisualRegions)
        };

        for group in &mut raw {
            group.members.sort_by_key(|&i| reading_key(&elements[i]));
        }
        raw.sort_by_key(|g| g.members.first().map(|&i| reading_key(&elements[i])));

        let groups: Vec<LogicalGroup> = raw
            .into_iter()
            .enumerate()
            .map(|(ordinal, group)| self.annotate(ordinal, group, elements))
            .collect();
        let template = StructureTemplate::new(groups, method);
        debug!(
            groups = template.metadata.total_groups,
            repeatable = template.metadata.repeatable_groups,
            method = ?template.metadata.generation_method,
            "structure template built"
        );
        template
    }

    fn region_groups(&self, regions: &[&VisualRegion], elements: &[FieldElement]) -> Vec<RawGroup> {
        let mut assigned = HashSet::new();
        let mut groups = Vec::new();
        for region in regions {
            let members: Vec<usize> = region
                .elements
                .iter()
                .copied()
                .filter(|&e| e < elements.len() && assigned.insert(e))
                .collect();
            if members.is_empty() {
                continue;
            }
            groups.push(RawGroup {
                members,
                source: GroupSource::VisualRegion,
                region_id: Some(region.id.clone()),
                title: None,
            });
        }

        let leftovers: Vec<usize> = (0..elements.len()).filter(|i| !assigned.contains(i)).collect();
        if !leftovers.is_empty() {
            debug!(count = leftovers.len(), "grouping fields outside every region by position");
            groups.extend(self.positional_groups(&leftovers, elements));
        }
        groups
    }

    fn fallback_groups(&self, elements: &[FieldElement]) -> (Vec<RawGroup>, GroupingMethod) {
        let mut by_title: IndexMap<String, Vec<usize>> = IndexMap::new();
        let mut untitled = Vec::new();
        for (i, element) in elements.iter().enumerate() {
            match element.container_title.as_deref().and_then(titles::normalize_title) {
                Some(title) => by_title.entry(title).or_default().push(i),
                None => untitled.push(i),
            }
        }

        let method = if by_title.is_empty() {
            GroupingMethod::Positional
        } else {
            GroupingMethod::ContainerTitles
        };
        let mut groups: Vec<RawGroup> = by_title
            .into_iter()
            .map(|(title, members)| RawGroup {
                members,
                source: GroupSource::Container,
                region_id: None,
                title: Some(title),
            })
            .collect();
        groups.extend(self.positional_groups(&untitled, elements));
        (groups, method)
    }

    /// Sorts by top edge and starts a new group whenever the vertical gap to
    /// the previous field exceeds `position_gap_threshold`.
    fn positional_groups(&self, indices: &[usize], elements: &[FieldElement]) -> Vec<RawGroup> {
        let mut sorted = indices.to_vec();
        sorted.sort_by_key(|&i| reading_key(&elements[i]));

        let mut groups: Vec<RawGroup> = Vec::new();
        let mut last_y: Option<i32> = None;
        for i in sorted {
            let y = elements[i].bbox.y;
            let starts_new = match last_y {
                None => true,
                Some(prev) => (y - prev).abs() > self.config.position_gap_threshold,
            };
            if starts_new {
                groups.push(RawGroup {
                    members: Vec::new(),
                    source: GroupSource::Position,
                    region_id: None,
                    title: None,
                });
            }
            if let Some(group) = groups.last_mut() {
                group.members.push(i);
            }
            last_y = Some(y);
        }
        groups
    }

    fn annotate(&self, ordinal: usize, raw: RawGroup, elements: &[FieldElement]) -> LogicalGroup {
        let mut fields: Vec<GroupedField> = raw
            .members
            .iter()
            .map(|&i| {
                let mut field = GroupedField::from_element(i, &elements[i]);
                field.semantic_category = semantic::classify_label(&field.label).map(str::to_string);
                field
            })
            .collect();

        let identifiers: Vec<&str> = raw.members.iter().map(|&i| elements[i].identifier()).collect();
        let detection = detect_group(
            self.detector.as_ref(),
            &identifiers,
            self.config.array_ratio_threshold,
        );
        let mut is_repeatable = detection.is_repeatable;
        if is_repeatable {
            for (field, found) in fields.iter_mut().zip(detection.matches) {
                if let Some(found) = found {
                    field.array_index = Some(found.index);
                    field.array_base = Some(found.base);
                }
            }
            if self.config.demote_inconsistent_arrays && semantically_mixed(&fields) {
                debug!(ordinal, "demoting repeatable group with mixed semantic categories");
                is_repeatable = false;
                for field in &mut fields {
                    field.array_index = None;
                    field.array_base = None;
                }
            }
        }

        let title = raw
            .title
            .or_else(|| majority_container_title(&raw.members, elements))
            .unwrap_or_else(|| format!("{} {}", self.config.group_title_prefix, ordinal + 1));
        let id = if is_repeatable {
            format!("array_{}", ordinal + 1)
        } else {
            format!("single_{}", ordinal + 1)
        };

        LogicalGroup {
            id,
            title,
            is_repeatable,
            fields,
            source: raw.source,
            region_id: raw.region_id,
        }
    }
}

fn reading_key(element: &FieldElement) -> (i32, i32) {
    (element.bbox.y, element.bbox.x)
}

fn semantically_mixed(fields: &[GroupedField]) -> bool {
    let categories: BTreeSet<&str> = fields
        .iter()
        .filter_map(|f| f.semantic_category.as_deref())
        .collect();
    categories.len() > 1
}

/// Most frequent normalised container title among the members, earliest
/// first on ties.
fn majority_container_title(members: &[usize], elements: &[FieldElement]) -> Option<String> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for &i in members {
        if let Some(title) = elements[i]
            .container_title
            .as_deref()
            .and_then(titles::normalize_title)
        {
            *counts.entry(title).or_default() += 1;
        }
    }
    let mut best: Option<(String, usize)> = None;
    for (title, count) in counts {
        if best.as_ref().map_or(true, |(_, c)| count > *c) {
            best = Some((title, count));
        }
    }
    best.map(|(title, _)| title)
}
