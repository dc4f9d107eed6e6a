//! Extraction of JSON payloads from free-form model output.

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Extract the JSON payload from a response that may wrap it in markdown
/// or surrounding prose.
pub(crate) fn extract_json(response: &str) -> &str {
    if let Some(start) = response.find("```json") {
        let content_start = start + 7;
        if let Some(end) = response[content_start..].find("```") {
            return response[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = response.find("```") {
        let content_start = start + 3;
        // Skip language identifier if present
        let content_start = response[content_start..]
            .find('\n')
            .map(|i| content_start + i + 1)
            .unwrap_or(content_start);
        if let Some(end) = response[content_start..].find("```") {
            return response[content_start..content_start + end].trim();
        }
    }

    // Raw array or object, whichever opens first
    let open = response.find(|c: char| c == '[' || c == '{');
    if let Some(start) = open {
        let close = if response[start..].starts_with('[') { ']' } else { '}' };
        if let Some(end) = response.rfind(close) {
            if end > start {
                return &response[start..=end];
            }
        }
    }

    response.trim()
}

/// Parse structured model output for a named pipeline stage.
pub(crate) fn parse_model_json<T: DeserializeOwned>(stage: &str, response: &str) -> Result<T> {
    serde_json::from_str(extract_json(response)).map_err(|e| {
        Error::malformed(
            stage,
            format!("{} (response: {})", e, truncate(response, 200)),
        )
    })
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_and_fenced() {
        assert_eq!(extract_json(r#"["a/b"]"#), r#"["a/b"]"#);
        assert_eq!(extract_json("```json\n[\"a\"]\n```"), "[\"a\"]");
        assert_eq!(extract_json("```\n{\"x\": 1}\n```"), "{\"x\": 1}");
        assert_eq!(
            extract_json("Here you go: [\"x\", \"y\"] hope that helps"),
            "[\"x\", \"y\"]"
        );
        assert_eq!(
            extract_json(r#"Answer: {"sources": ["a"]}"#),
            r#"{"sources": ["a"]}"#
        );
    }

    #[test]
    fn test_parse_failure_is_malformed() {
        let err = parse_model_json::<Vec<String>>("hierarchy", "no json here").unwrap_err();
        match err {
            Error::MalformedOutput { stage, .. } => assert_eq!(stage, "hierarchy"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_typed() {
        let parsed: Vec<String> = parse_model_json("patterns", "```json\n[\"p1\",\"p2\"]\n```").unwrap();
        assert_eq!(parsed, vec!["p1", "p2"]);
    }
}
