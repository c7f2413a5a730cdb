//! JSON parsing utilities for LLM responses.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::{NoesisError, NoesisResult};

use super::links::InferredLink;

static CODE_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").unwrap());
static FENCED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[a-zA-Z0-9]*\n?([\s\S]*?)\n?```$").unwrap());
static THINK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

/// Extract JSON from potentially wrapped response (code blocks, prose).
pub fn extract_json(text: &str) -> NoesisResult<String> {
    let text = text.trim();

    if let Some(content) = CODE_BLOCK_RE.captures(text).and_then(|c| c.get(1)) {
        return Ok(content.as_str().trim().to_string());
    }

    // Fall back to the outermost array or object embedded in prose.
    let start = text.find(['[', '{']);
    let end = text.rfind([']', '}']);
    match (start, end) {
        (Some(start), Some(end)) if end > start => Ok(text[start..=end].to_string()),
        _ => Ok(text.to_string()),
    }
}

/// Remove a wrapping code fence and thinking tags from a response.
pub fn remove_code_blocks(content: &str) -> String {
    let content = content.trim();

    let content = FENCED_RE
        .captures(content)
        .and_then(|c| c.get(1).map(|m| m.as_str().trim()))
        .unwrap_or(content);

    THINK_RE.replace_all(content, "").trim().to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LinksPayload {
    List(Vec<InferredLink>),
    Wrapped { links: Vec<InferredLink> },
}

/// Parse inferred links from an LLM response.
///
/// Accepts a bare array or an object with a `links` array.
pub fn parse_links(response: &str) -> NoesisResult<Vec<InferredLink>> {
    let cleaned = remove_code_blocks(response);
    if cleaned.is_empty() {
        return Ok(vec![]);
    }

    let json_str = extract_json(&cleaned)?;
    if json_str.is_empty() {
        return Ok(vec![]);
    }

    let parsed: LinksPayload = serde_json::from_str(&json_str)
        .map_err(|e| NoesisError::parse(format!("Failed to parse links JSON: {}", e)))?;

    Ok(match parsed {
        LinksPayload::List(links) | LinksPayload::Wrapped { links } => links,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_code_block() {
        let input = "```json\n[{\"targetId\": \"b\", \"confidence\": 0.9}]\n```";
        let result = extract_json(input).unwrap();
        assert!(result.starts_with('['));
        assert!(result.contains("targetId"));
    }

    #[test]
    fn test_extract_json_from_prose() {
        let input = "Here are the links: [{\"targetId\": \"b\", \"confidence\": 0.7}] Hope it helps.";
        assert_eq!(
            extract_json(input).unwrap(),
            "[{\"targetId\": \"b\", \"confidence\": 0.7}]"
        );
    }

    #[test]
    fn test_remove_code_blocks_and_thinking() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(remove_code_blocks(input), r#"{"key": "value"}"#);
        assert_eq!(remove_code_blocks("<think>hmm</think>[]"), "[]");
    }

    #[test]
    fn test_parse_links_both_shapes() {
        let bare = r#"[{"targetId": "b", "relation": "extends", "confidence": 0.8}]"#;
        let wrapped = r#"{"links": [{"targetId": "b", "relation": "extends", "confidence": 0.8}]}"#;
        assert_eq!(parse_links(bare).unwrap(), parse_links(wrapped).unwrap());

        let links = parse_links(bare).unwrap();
        assert_eq!(links[0].target_id, "b");
        assert_eq!(links[0].relation, "extends");
    }

    #[test]
    fn test_parse_links_empty_and_invalid() {
        assert!(parse_links("").unwrap().is_empty());
        assert!(parse_links("[]").unwrap().is_empty());
        assert!(parse_links("no json here").is_err());
    }
}
