//! Decoding JSON objects out of free-form model responses.
//!
//! Models wrap JSON in prose, code fences or both. Decoding runs an ordered
//! list of independent decoders and keeps the first object that parses.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Errors from response decoding.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("no JSON object found in response")]
    NoJson,

    #[error("JSON object has an unexpected shape: {0}")]
    Shape(#[from] serde_json::Error),
}

type JsonObject = Map<String, Value>;

/// A single decoding strategy.
pub type Decoder = fn(&str) -> Option<JsonObject>;

/// Decoders in the order they are tried.
pub const DECODERS: &[(&str, Decoder)] = &[
    ("whole_text", decode_whole_text),
    ("fenced_block", decode_fenced_block),
    ("balanced_braces", decode_balanced_braces),
];

static LINE_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""line"\s*:\s*(\d+)\s*-\s*(\d+)"#).expect("valid regex")
});
static TRAILING_COMMA_OBJ_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*\}").expect("valid regex"));
static TRAILING_COMMA_ARR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*\]").expect("valid regex"));
static JSON_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("valid regex"));
static BARE_FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```\s*(\{.*?\})\s*```").expect("valid regex"));

/// Repair common model mistakes: unquoted line ranges and trailing commas.
pub fn fix_json_issues(text: &str) -> String {
    let text = LINE_RANGE_RE.replace_all(text, r#""line": "$1-$2""#);
    let text = TRAILING_COMMA_OBJ_RE.replace_all(&text, "}");
    TRAILING_COMMA_ARR_RE.replace_all(&text, "]").into_owned()
}

fn parse_object(candidate: &str) -> Option<JsonObject> {
    match serde_json::from_str(&fix_json_issues(candidate)).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// The whole response is the object.
pub fn decode_whole_text(text: &str) -> Option<JsonObject> {
    parse_object(text.trim())
}

/// The first fenced code block holding an object.
pub fn decode_fenced_block(text: &str) -> Option<JsonObject> {
    JSON_FENCE_RE
        .captures_iter(text)
        .chain(BARE_FENCE_RE.captures_iter(text))
        .find_map(|c| parse_object(c.get(1)?.as_str()))
}

/// The first brace-balanced substring that parses. Braces inside string
/// literals do not count.
pub fn decode_balanced_braces(text: &str) -> Option<JsonObject> {
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(offset) = text[start..].find('{') {
        let open = start + offset;
        if let Some(close) = matching_brace(bytes, open) {
            if let Some(obj) = parse_object(&text[open..=close]) {
                return Some(obj);
            }
        }
        start = open + 1;
    }
    None
}

fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Run the decoder chain and return the first JSON object found.
pub fn decode_object(text: &str) -> Result<JsonObject, DecodeError> {
    DECODERS
        .iter()
        .find_map(|(name, decoder)| {
            let obj = decoder(text)?;
            debug!(decoder = name, "decoded JSON from model response");
            Some(obj)
        })
        .ok_or(DecodeError::NoJson)
}

/// Decode a response into `T`.
pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T, DecodeError> {
    let obj = decode_object(text)?;
    Ok(serde_json::from_value(Value::Object(obj))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_text() {
        let obj = decode_whole_text("  {\"a\": 1}\n").unwrap();
        assert_eq!(obj["a"], 1);
        assert!(decode_whole_text("[1, 2]").is_none());
        assert!(decode_whole_text("Here you go: {\"a\": 1}").is_none());
    }

    #[test]
    fn fenced_json_block() {
        let text = "Sure.\n```json\n{\"summary\": \"ok\"}\n```\nDone.";
        assert_eq!(decode_fenced_block(text).unwrap()["summary"], "ok");
    }

    #[test]
    fn bare_fence_block() {
        let text = "Result:\n```\n{\"score\": 8}\n```";
        assert_eq!(decode_fenced_block(text).unwrap()["score"], 8);
    }

    #[test]
    fn fenced_skips_unparseable_blocks() {
        let text = "```json\nnot json\n```\nand\n```json\n{\"x\": true}\n```";
        assert_eq!(decode_fenced_block(text).unwrap()["x"], true);
    }

    #[test]
    fn balanced_braces_in_prose() {
        let text = "The analysis is {\"purpose\": \"adds {braces} in strings\", \"n\": {\"k\": 1}} as requested.";
        let obj = decode_balanced_braces(text).unwrap();
        assert_eq!(obj["purpose"], "adds {braces} in strings");
        assert_eq!(obj["n"]["k"], 1);
    }

    #[test]
    fn balanced_braces_skips_invalid_candidates() {
        let text = "{not json} then {\"ok\": 1}";
        assert_eq!(decode_balanced_braces(text).unwrap()["ok"], 1);
    }

    #[test]
    fn fixes_line_ranges_and_trailing_commas() {
        let fixed = fix_json_issues(r#"{"line": 145-162, "tags": ["a", "b",], }"#);
        let value: Value = serde_json::from_str(&fixed).unwrap();
        assert_eq!(value["line"], "145-162");
        assert_eq!(value["tags"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn chain_falls_through_in_order() {
        assert!(decode_object("{\"a\": 1}").is_ok());
        assert!(decode_object("```json\n{\"a\": 1,}\n```").is_ok());
        assert!(decode_object("prefix {\"a\": 1} suffix").is_ok());
    }

    #[test]
    fn prose_without_json_fails() {
        let err = decode_object("The change looks fine to me. No issues.").unwrap_err();
        assert!(matches!(err, DecodeError::NoJson));
    }

    #[test]
    fn typed_decode_reports_shape_errors() {
        #[derive(serde::Deserialize, Debug)]
        struct Strict {
            #[allow(dead_code)]
            count: u32,
        }
        let err = decode::<Strict>("{\"count\": \"many\"}").unwrap_err();
        assert!(matches!(err, DecodeError::Shape(_)));
    }
}
