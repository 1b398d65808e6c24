//! Lenient JSON handling for model output

use serde_json::Value;

/// Parse a tool-call arguments field.
///
/// Providers deliver arguments either as a JSON string or already
/// structured. An unparseable string becomes `Value::Null` rather than an
/// error so a malformed call surfaces as a tool failure the model can
/// observe, not a crash.
pub fn parse_arguments(raw: &Value) -> Value {
    match raw {
        Value::String(text) => {
            if text.trim().is_empty() {
                return Value::Null;
            }
            serde_json::from_str(text).unwrap_or(Value::Null)
        }
        other => other.clone(),
    }
}

/// Extract a JSON value from model text that may wrap it in markdown
/// fences or surrounding prose.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    // Strip ```json ... ``` / ``` ... ``` fences.
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        let inner = rest.rsplit_once("```").map(|(body, _)| body).unwrap_or(rest);
        if let Ok(value) = serde_json::from_str(inner.trim()) {
            return Some(value);
        }
    }

    // Last resort: widest brace-delimited span.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arguments_passed_structured() {
        let raw = json!({"path": "/x"});
        assert_eq!(parse_arguments(&raw), raw);
    }

    #[test]
    fn arguments_passed_as_string() {
        let raw = json!(r#"{"path": "/x"}"#);
        assert_eq!(parse_arguments(&raw), json!({"path": "/x"}));
    }

    #[test]
    fn malformed_argument_string_becomes_null() {
        assert_eq!(parse_arguments(&json!("{not json")), Value::Null);
        assert_eq!(parse_arguments(&json!("")), Value::Null);
    }

    #[test]
    fn extract_plain_json() {
        let value = extract_json(r#"{"goal": "g", "steps": []}"#).unwrap();
        assert_eq!(value["goal"], "g");
    }

    #[test]
    fn extract_fenced_json() {
        let text = "```json\n{\"goal\": \"g\"}\n```";
        assert_eq!(extract_json(text).unwrap()["goal"], "g");
    }

    #[test]
    fn extract_json_with_prose() {
        let text = "好的，计划如下：\n{\"goal\": \"整理\", \"steps\": []}\n以上。";
        assert_eq!(extract_json(text).unwrap()["goal"], "整理");
    }

    #[test]
    fn extract_rejects_non_json() {
        assert!(extract_json("no braces here").is_none());
    }
}
