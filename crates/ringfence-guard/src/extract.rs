//! Argument extraction
//!
//! Agent frameworks put the target path under different keys, wrap arguments
//! in envelopes, or hand them over as a JSON string. Extraction runs a
//! prioritised list of lookup strategies; finding nothing is an ordinary
//! outcome (`None`), never an error.

use serde_json::{Map, Value};
use std::borrow::Cow;

/// Keys that may hold the target path, highest priority first
pub const PATH_KEYS: &[&str] = &[
    "path",
    "file_path",
    "filepath",
    "file",
    "filename",
    "target",
    "target_path",
    "dir",
    "directory",
    "dir_path",
    "notebook_path",
];

/// Keys that may wrap the real arguments
pub const ENVELOPE_KEYS: &[&str] = &["args", "arguments", "input", "params"];

/// Keys that may hold the content a mutating tool writes
pub const PAYLOAD_KEYS: &[&str] = &[
    "content",
    "new_string",
    "new_str",
    "text",
    "payload",
    "patch",
];

type Strategy = fn(&Map<String, Value>) -> Option<String>;

const PATH_STRATEGIES: &[Strategy] = &[top_level_path, enveloped_path, first_of_paths];

/// Extract the target path from tool arguments
#[must_use]
pub fn extract_path(arguments: &Value) -> Option<String> {
    let decoded = decode(arguments);
    let map = decoded.as_object()?;
    PATH_STRATEGIES.iter().find_map(|strategy| strategy(map))
}

/// Extract the content a mutating tool intends to write
#[must_use]
pub fn extract_payload(arguments: &Value) -> Option<String> {
    let decoded = decode(arguments);
    let map = decoded.as_object()?;
    PAYLOAD_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .find_map(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            ENVELOPE_KEYS
                .iter()
                .filter_map(|key| map.get(*key))
                .find_map(extract_payload)
        })
}

/// Extract an arbitrary string argument, looking through envelopes
#[must_use]
pub fn extract_string(arguments: &Value, keys: &[&str]) -> Option<String> {
    let decoded = decode(arguments);
    let map = decoded.as_object()?;
    string_under(map, keys).or_else(|| {
        ENVELOPE_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|inner| extract_string(inner, keys))
    })
}

fn decode(arguments: &Value) -> Cow<'_, Value> {
    match arguments {
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(parsed @ Value::Object(_)) => Cow::Owned(parsed),
            _ => Cow::Borrowed(arguments),
        },
        _ => Cow::Borrowed(arguments),
    }
}

fn string_under(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| map.get(*key))
        .filter_map(Value::as_str)
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn top_level_path(map: &Map<String, Value>) -> Option<String> {
    string_under(map, PATH_KEYS)
}

fn enveloped_path(map: &Map<String, Value>) -> Option<String> {
    ENVELOPE_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .find_map(|inner| {
            let decoded = decode(inner);
            decoded.as_object().and_then(top_level_path)
        })
}

fn first_of_paths(map: &Map<String, Value>) -> Option<String> {
    map.get("paths")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .find(|s| !s.trim().is_empty())
        .map(str::to_string)
}
