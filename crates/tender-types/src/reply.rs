//! Recovering a JSON object from free-form language model output

use serde_json::Value;

/// Remove markdown code fences (```json ... ```) around a reply
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").or_else(|| rest.strip_prefix("JSON")).unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse the reply as JSON, falling back to the span between the first `{`
/// and the last `}` when the model wrapped the object in prose.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let cleaned = strip_code_fences(text);
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(cleaned) {
        return Some(value);
    }
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&cleaned[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}
