//! Secret resolution from multiple sources.
//!
//! The host-provided API key can come from, in priority order:
//!
//! 1. **Direct value** - e.g. injected by the embedding application
//! 2. **File reference** - Docker secrets pattern (`/run/secrets/veo_key`)
//! 3. **Env var reference** - e.g. `API_KEY`

use secrecy::SecretString;
use std::fs;

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },

    #[error("Secret from {source_name} is empty")]
    Empty { source_name: String },
}

/// Result type for secret resolution.
pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from the first configured source.
///
/// Values are trimmed; a source that resolves to an empty string is an error
/// rather than a silent fallthrough.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.map(str::trim).filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        let content = fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
            path: expanded.clone(),
            source: e,
        })?;
        return non_empty(content.trim(), &expanded);
    }

    if let Some(var_name) = env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(var_name) {
            Ok(value) => non_empty(value.trim(), var_name),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: var_name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: var_name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

fn non_empty(value: &str, source_name: &str) -> Result<SecretString> {
    if value.is_empty() {
        Err(SecretError::Empty {
            source_name: source_name.to_string(),
        })
    } else {
        Ok(SecretString::from(value.to_string()))
    }
}

/// Resolves a secret, returning None when the source is absent or empty.
///
/// Unreadable files are still an error.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided)
        | Err(SecretError::EnvVarNotSet { .. })
        | Err(SecretError::Empty { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Expands `~` to the user's home directory.
///
/// `~user/path` is not supported.
pub fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            if path == "~" {
                return home.into_owned();
            }
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
