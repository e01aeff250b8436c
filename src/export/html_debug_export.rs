use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::core::model::{FieldMatchResult, GroupedField, LogicalGroup, VisualRegion};
use crate::export::Exporter;
use crate::pipeline::AnalysisResult;

pub const HTML_FILE_NAME: &str = "layout.html";

#[derive(Debug, Clone)]
pub struct HtmlDebugExporter {
    out_dir: PathBuf,
}

impl HtmlDebugExporter {
    pub fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }

    fn region_to_div(region: &VisualRegion) -> String {
        let bbox = region.bbox;
        format!(
            r#"<div class='bbox region' style='left:{x}px; top:{y}px; width:{w}px; height:{h}px;' data-kind='region' data-id='{id}' data-origin='{origin}' data-confidence='{conf:.3}' data-rank='{rank}' data-elements='{elements}' data-merged='{merged}'></div>"#,
            x = bbox.x,
            y = bbox.y,
            w = bbox.width,
            h = bbox.height,
            id = html_escape::encode_single_quoted_attribute(&region.id),
            origin = origin_label(region),
            conf = region.confidence,
            rank = region.rank.map(|r| r.to_string()).unwrap_or_default(),
            elements = region.elements.len(),
            merged = html_escape::encode_single_quoted_attribute(&region.merged_from.join(", ")),
        )
    }

    fn field_to_div(group: &LogicalGroup, field: &GroupedField, matched: Option<&FieldMatchResult>) -> String {
        let bbox = field.bbox;
        let status = if matched.is_some() { "matched" } else { "unmatched" };
        format!(
            r#"<div class='bbox field {status}' style='left:{x}px; top:{y}px; width:{w}px; height:{h}px;' data-kind='field' data-selector='{selector}' data-label='{label}' data-group='{group}' data-array-index='{index}' data-value='{value}' data-match-type='{match_type}' data-confidence='{conf}'></div>"#,
            x = bbox.x,
            y = bbox.y,
            w = bbox.width,
            h = bbox.height,
            selector = html_escape::encode_single_quoted_attribute(&field.selector),
            label = html_escape::encode_single_quoted_attribute(&field.label),
            group = html_escape::encode_single_quoted_attribute(&group.title),
            index = field.array_index.map(|i| i.to_string()).unwrap_or_default(),
            value = html_escape::encode_single_quoted_attribute(matched.map_or("", |m| m.value.as_str())),
            match_type = matched
                .and_then(|m| serde_json::to_value(m.match_type).ok())
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            conf = matched.map(|m| format!("{:.3}", m.confidence)).unwrap_or_default(),
        )
    }
}

fn origin_label(region: &VisualRegion) -> String {
    serde_json::to_value(region.origin)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

impl Exporter for HtmlDebugExporter {
    fn export(&self, result: &AnalysisResult) -> Result<PathBuf> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("creating {}", self.out_dir.display()))?;

        let matches: HashMap<&str, &FieldMatchResult> = result
            .matching_results
            .iter()
            .map(|m| (m.selector.as_str(), m))
            .collect();

        let mut boxes_html = String::new();
        for region in &result.visual_regions {
            boxes_html.push_str(&HtmlDebugExporter::region_to_div(region));
        }
        for group in &result.logical_groups {
            for field in &group.fields {
                let matched = matches.get(field.selector.as_str()).copied();
                boxes_html.push_str(&HtmlDebugExporter::field_to_div(group, field, matched));
            }
        }

        let summary = match (&result.failed_phase, &result.quality_assessment) {
            (Some(phase), _) => format!(
                "failed during {}: {}",
                phase.as_str(),
                html_escape::encode_text(result.error.as_deref().unwrap_or(""))
            ),
            (None, Some(quality)) => format!(
                "{} groups, {} matched fields, quality {:.2}",
                result.logical_groups.len(),
                result.matching_results.len(),
                quality.overall_score
            ),
            (None, None) => format!(
                "{} regions, {} groups",
                result.visual_regions.len(),
                result.logical_groups.len()
            ),
        };

        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset='utf-8'>
<title>Form layout</title>
<style>
body {{ margin: 0; font-family: Arial, sans-serif; }}
#canvas {{ position: relative; width: {width}px; height: {height}px; background: #fafafa; }}
.bbox {{ position: absolute; box-sizing: border-box; }}
.bbox.region {{ border: 2px dashed rgba(0,0,255,0.5); background: rgba(100,100,255,0.05); }}
.bbox.field {{ border: 2px solid; }}
.bbox.field.matched {{ border-color: rgba(0,128,0,0.7); background: rgba(0,200,0,0.12); }}
.bbox.field.unmatched {{ border-color: rgba(255,0,0,0.6); background: rgba(255,0,0,0.08); }}
#info {{ position: fixed; right: 10px; top: 10px; background: #fff; padding: 10px; border: 1px solid #ddd; max-width: 300px; white-space: pre-line; }}
#legend {{ position: fixed; right: 10px; bottom: 10px; background: #fff; padding: 10px; border: 1px solid #ddd; font-size: 12px; }}
.legend-item {{ margin: 5px 0; }}
.legend-box {{ display: inline-block; width: 20px; height: 15px; border: 2px solid; vertical-align: middle; margin-right: 5px; }}
</style>
</head>
<body>
<div id='info'>{summary}
Click a box to inspect.</div>
<div id='legend'>
<div class='legend-item'><span class='legend-box' style='border: 2px dashed rgba(0,0,255,0.5);'></span>Visual region</div>
<div class='legend-item'><span class='legend-box' style='background: rgba(0,200,0,0.12); border-color: rgba(0,128,0,0.7);'></span>Matched field</div>
<div class='legend-item'><span class='legend-box' style='background: rgba(255,0,0,0.08); border-color: rgba(255,0,0,0.6);'></span>Unmatched field</div>
</div>
<div id='canvas'>
{boxes}
</div>
<script>
const info = document.getElementById('info');
for (const el of document.querySelectorAll('.bbox')) {{
  el.addEventListener('click', (event) => {{
    event.stopPropagation();
    const d = el.dataset;
    info.textContent = d.kind === 'region'
      ? `region: ${{d.id}}\norigin: ${{d.origin}}\nrank: ${{d.rank}}\nconfidence: ${{d.confidence}}\nelements: ${{d.elements}}\nmerged: ${{d.merged}}`
      : `selector: ${{d.selector}}\nlabel: ${{d.label}}\ngroup: ${{d.group}}\narray index: ${{d.arrayIndex}}\nvalue: ${{d.value}}\nmatch: ${{d.matchType}} ${{d.confidence}}`;
  }});
}}
</script>
</body>
</html>"#,
            width = result.page.width,
            height = result.page.height,
            summary = summary,
            boxes = boxes_html
        );
        let path = self.out_dir.join(HTML_FILE_NAME);
        fs::write(&path, html).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::BBox;
    use crate::core::model::{FieldElement, FieldKind, GroupSource, MatchType, RegionOrigin, Viewport};

    #[test]
    fn renders_regions_and_match_status() -> Result<()> {
        let name = FieldElement::new("#name", "姓名 <b>", BBox::new(10, 10, 100, 20));
        let email = FieldElement::new("#email", "邮箱", BBox::new(10, 40, 100, 20));
        let result = AnalysisResult {
            success: true,
            page: Viewport { width: 300, height: 200 },
            visual_regions: vec![VisualRegion::new(
                "visual_region_0",
                BBox::new(5, 5, 110, 60),
                6600,
                RegionOrigin::Fusion,
                0.75,
            )],
            logical_groups: vec![LogicalGroup {
                id: "single_1".to_string(),
                title: "基本信息".to_string(),
                is_repeatable: false,
                fields: vec![GroupedField::from_element(0, &name), GroupedField::from_element(1, &email)],
                source: GroupSource::VisualRegion,
                region_id: Some("visual_region_0".to_string()),
            }],
            matching_results: vec![FieldMatchResult {
                selector: "#name".to_string(),
                kind: FieldKind::Text,
                value: "张三".to_string(),
                match_type: MatchType::Exact,
                confidence: 1.0,
                required: false,
                recognized_label: "姓名".to_string(),
                form_label: "姓名".to_string(),
            }],
            ..AnalysisResult::default()
        };

        let dir = tempfile::tempdir()?;
        let path = HtmlDebugExporter::new(dir.path().to_path_buf()).export(&result)?;
        let html = fs::read_to_string(path)?;
        assert!(html.contains("width: 300px; height: 200px;"));
        assert!(html.contains("data-id='visual_region_0'"));
        assert!(html.contains("data-origin='fusion'"));
        assert!(html.contains("class='bbox field matched'"));
        assert!(html.contains("class='bbox field unmatched'"));
        assert!(html.contains("data-match-type='exact'"));
        assert!(!html.contains("<b>"));
        assert!(html.contains("info.textContent"));
        assert!(!html.contains("innerHTML"));
        Ok(())
    }
}
