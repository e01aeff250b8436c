use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{AnalysisError, Result};
use crate::recognition::Recognition;

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";
const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Extracts label/value pairs from free-form model output: a fenced
/// ```json block when present, otherwise the outermost `{...}`.
pub fn parse_model_response(text: &str) -> Result<Recognition> {
    let payload = extract_json(text)
        .ok_or_else(|| AnalysisError::Recognition("no JSON object in model response".into()))?;
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| AnalysisError::Recognition(format!("malformed JSON in model response: {e}")))?;
    let Value::Object(root) = value else {
        return Err(AnalysisError::Recognition(
            "model response is not a JSON object".into(),
        ));
    };

    let confidence = root
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_CONFIDENCE);
    let (mappings, top_level) = match root.get("field_mappings").cloned() {
        Some(Value::Object(map)) => (map, false),
        Some(_) => {
            return Err(AnalysisError::Recognition(
                "field_mappings must be an object".into(),
            ))
        }
        None => (root, true),
    };

    let labels: IndexMap<String, String> = mappings
        .into_iter()
        .filter(|(label, _)| !(top_level && label == "confidence"))
        .filter_map(|(label, value)| {
            let label = label.trim().to_string();
            let value = stringify(value)?;
            (!label.is_empty()).then_some((label, value))
        })
        .collect();
    Ok(Recognition { labels, confidence })
}

fn extract_json(text: &str) -> Option<&str> {
    if let Some(open) = text.find(FENCE_OPEN) {
        let body = &text[open + FENCE_OPEN.len()..];
        let end = body.find(FENCE_CLOSE).unwrap_or(body.len());
        let fenced = body[..end].trim();
        if !fenced.is_empty() {
            return Some(fenced);
        }
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Scalars become their display text; blanks and nulls are dropped.
fn stringify(value: Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_fenced_block_with_field_mappings() {
        let text = "分析如下：\n```json\n{\"field_mappings\": {\"姓名\": \"张三\", \"年龄\": 25, \"备注\": \"  \"}, \"confidence\": 0.9}\n```\n完毕";
        let recognition = parse_model_response(text).expect("fenced json");
        assert_eq!(recognition.confidence, 0.9);
        let pairs: Vec<(&str, &str)> = recognition
            .labels
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(pairs, vec![("姓名", "张三"), ("年龄", "25")]);
    }

    #[test]
    fn falls_back_to_outer_braces_and_top_level_object() {
        let recognition =
            parse_model_response("result: {\"邮箱\": \"a@b.cn\", \"电话\": null} thanks").expect("braces");
        assert_eq!(recognition.confidence, 0.8);
        assert_eq!(recognition.labels.len(), 1);
        assert_eq!(recognition.labels["邮箱"], "a@b.cn");
    }

    #[test]
    fn rejects_text_without_json() {
        let err = parse_model_response("I could not read the form.").expect_err("no json");
        assert!(matches!(err, AnalysisError::Recognition(_)));
    }
}
