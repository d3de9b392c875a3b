use std::path::Path;

use crate::broadcast::LogSink;
use crate::error::SuperveoError;

/// Splits a prompt block into one prompt per non-blank line, trimmed.
pub fn parse_prompts(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads a prompt block from a text file.
pub fn load_prompt_file(path: &Path, logs: &LogSink) -> Result<String, SuperveoError> {
    let content = std::fs::read_to_string(path).map_err(|e| SuperveoError::PromptFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>");
    logs.success(&format!("Loaded prompts from {}", name));

    Ok(content)
}
