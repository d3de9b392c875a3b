//! Builders for test inputs.

#![allow(dead_code)]

use serde_json::{json, Value};

/// A prompt block with `count` lines: `prompt 1`, `prompt 2`, ...
pub fn prompt_block(count: usize) -> String {
    (1..=count)
        .map(|i| format!("prompt {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn pending_operation(name: &str) -> Value {
    json!({ "name": name, "done": false })
}

pub fn completed_operation(name: &str, uri: &str) -> Value {
    json!({
        "name": name,
        "done": true,
        "response": {
            "generatedVideos": [{ "video": { "uri": uri } }]
        }
    })
}

pub fn operation_without_uri(name: &str) -> Value {
    json!({ "name": name, "done": true, "response": { "generatedVideos": [] } })
}

pub fn operation_with_error(name: &str, message: &str) -> Value {
    json!({ "name": name, "done": true, "error": { "code": 3, "message": message } })
}

/// The URI the fake client reports for a completed prompt.
///
/// Points at a closed local port so download attempts fail fast.
pub fn video_uri_for(prompt: &str) -> String {
    format!(
        "http://127.0.0.1:1/videos/{}.mp4?alt=media",
        prompt.replace(' ', "-")
    )
}
