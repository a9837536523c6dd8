//! Tolerant JSON extraction from model output.
//!
//! Models wrap JSON in markdown fences, prepend chatter, or trail off with
//! commentary. [`extract_json`] tries the whole text, then fenced blocks, then
//! balanced spans in the surrounding prose. Objects are preferred over arrays
//! there, so a bracketed citation such as `[1]` never wins over the reply.

use serde_json::{Map, Value};
use thiserror::Error;

/// Why a piece of model output could not be read as JSON.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("model output was empty")]
    Empty,

    #[error("no JSON value found in model output")]
    NoJson,

    #[error("JSON did not match the expected shape: {0}")]
    Shape(String),
}

/// Extract the first JSON object or array embedded in `text`.
pub fn extract_json(text: &str) -> Result<Value, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    if let Some(value) = parse_structured(trimmed) {
        return Ok(value);
    }

    for block in fenced_blocks(trimmed) {
        if let Some(value) = parse_structured(block.trim()) {
            return Ok(value);
        }
    }

    embedded_span(trimmed, '{')
        .or_else(|| embedded_span(trimmed, '['))
        .ok_or(ParseError::NoJson)
}

/// Extract a JSON object from `text`.
///
/// A reply that only contains an array is a [`ParseError::Shape`] error.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, ParseError> {
    match extract_json(text)? {
        Value::Object(map) => Ok(map),
        other => Err(ParseError::Shape(format!(
            "expected a JSON object, found {}",
            kind(&other)
        ))),
    }
}

/// First balanced span opened by `open` that parses.
fn embedded_span(text: &str, open: char) -> Option<Value> {
    text.char_indices()
        .filter(|&(_, ch)| ch == open)
        .find_map(|(start, _)| {
            let end = balanced_end(text, start)?;
            parse_structured(&text[start..end])
        })
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
        _ => "a scalar",
    }
}

/// Parse only objects and arrays; bare scalars are not useful to callers.
fn parse_structured(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

/// Contents of each ``` fenced block, language tag removed.
fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("```") {
        let after_open = &rest[open + 3..];
        // Skip the info string ("json", "JSON", ...) up to the end of line
        let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_open[body_start..];
        match body.find("```") {
            Some(close) => {
                blocks.push(&body[..close]);
                rest = &body[close + 3..];
            }
            None => {
                blocks.push(body);
                break;
            }
        }
    }

    blocks
}

/// Byte index one past the bracket closing the one at `start`.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(ch) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(start + offset + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_object() {
        let value = extract_json(r#"{"decision": "approve"}"#).unwrap();
        assert_eq!(value, json!({"decision": "approve"}));
    }

    #[test]
    fn test_markdown_fence() {
        let text = "Here is the ranking:\n```json\n{\"ranked_indices\": [2, 0, 1]}\n```\nLet me know!";
        let value = extract_json(text).unwrap();
        assert_eq!(value["ranked_indices"], json!([2, 0, 1]));
    }

    #[test]
    fn test_unterminated_fence() {
        let text = "```\n[\"a\", \"b\"]";
        assert_eq!(extract_json(text).unwrap(), json!(["a", "b"]));
    }

    #[test]
    fn test_embedded_in_prose_with_braces_in_strings() {
        let text = r#"Sure. {"reason": "uses {braces} and \"quotes\"", "ok": true} hope that helps"#;
        let value = extract_json(text).unwrap();
        assert_eq!(value["ok"], json!(true));
        assert_eq!(value["reason"], json!("uses {braces} and \"quotes\""));
    }

    #[test]
    fn test_skips_invalid_span_and_finds_next() {
        let text = "[see note] then {\"sub_queries\": [\"x\"]}";
        let value = extract_json(text).unwrap();
        assert_eq!(value["sub_queries"], json!(["x"]));
    }

    #[test]
    fn test_errors() {
        assert_eq!(extract_json("   "), Err(ParseError::Empty));
        assert_eq!(extract_json("no json here"), Err(ParseError::NoJson));
        assert_eq!(extract_json("42"), Err(ParseError::NoJson));
        assert_eq!(extract_json("{\"open\": "), Err(ParseError::NoJson));
    }

    #[test]
    fn test_citation_before_object_is_skipped() {
        let text = "Source [1] does not mention Company C.\n{\"decision\": \"reject\", \"hallucination_score\": 0.95}";
        let value = extract_json(text).unwrap();
        assert_eq!(value["decision"], json!("reject"));

        let text = "Snippet [2] is the most relevant.\n{\"ranked_indices\": [2, 1, 0]}";
        let value = extract_json(text).unwrap();
        assert_eq!(value["ranked_indices"], json!([2, 1, 0]));
    }

    #[test]
    fn test_array_in_prose_when_no_object() {
        let text = "The sub-queries are [\"Apple revenue\", \"Apple risks\"] as requested.";
        assert_eq!(
            extract_json(text).unwrap(),
            json!(["Apple revenue", "Apple risks"])
        );
    }

    #[test]
    fn test_extract_object() {
        let map = extract_json_object("Verdict [3]: {\"decision\": \"approve\"}").unwrap();
        assert_eq!(map["decision"], json!("approve"));

        let err = extract_json_object("[1, 2]").unwrap_err();
        assert!(matches!(err, ParseError::Shape(_)));
        assert_eq!(extract_json_object("nothing"), Err(ParseError::NoJson));
    }
}
