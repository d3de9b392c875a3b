//! Helpers for keeping credentials out of logs and building safe file names.

use std::sync::LazyLock;

use regex::Regex;

static KEY_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([?&]key=)[^&#]*").expect("valid key regex"));

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]").expect("valid slug regex"));

/// Maximum prompt characters kept in a download file name.
const SLUG_PROMPT_CHARS: usize = 30;

/// Shows only the first four characters of a secret.
///
/// - `AIzaSyABCDEF` → `AIza****`
/// - `abc` → `****`
pub fn mask_secret(secret: &str) -> String {
    if secret.chars().count() <= 8 {
        return "****".to_string();
    }
    let prefix: String = secret.chars().take(4).collect();
    format!("{}****", prefix)
}

/// Replaces the value of any `key=` query parameter.
///
/// - `https://host/v1/op?key=AIza123` → `https://host/v1/op?key=****`
pub fn redact_api_key(url: &str) -> String {
    KEY_PARAM.replace_all(url, "${1}****").into_owned()
}

/// Builds a file-name-safe slug from the start of a prompt.
///
/// Keeps the first 30 characters, replaces anything outside `[A-Za-z0-9]`
/// with `_`, and lowercases the result.
pub fn prompt_slug(prompt: &str) -> String {
    let head: String = prompt.chars().take(SLUG_PROMPT_CHARS).collect();
    NON_ALPHANUMERIC.replace_all(&head, "_").to_lowercase()
}
