use serde::{Deserialize, Serialize};

/// Advisory result of the last credential check. Nothing branches on it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyStatus {
    Valid,
    Invalid,
    #[default]
    Unchecked,
}

/// User-editable settings, persisted under the `veo-settings` key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_true")]
    pub auto_download: bool,
    #[serde(default = "default_file_name_prefix")]
    pub file_name_prefix: String,
    #[serde(default)]
    pub gemini_api_key_status: ApiKeyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_api_key: Option<String>,
    /// Keys or tokens tried after the manual key, first non-blank wins.
    #[serde(default)]
    pub api_tokens: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_file_name_prefix() -> String {
    "video".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_download: true,
            file_name_prefix: default_file_name_prefix(),
            gemini_api_key_status: ApiKeyStatus::Unchecked,
            manual_api_key: None,
            api_tokens: Vec::new(),
        }
    }
}

impl Settings {
    /// The file name prefix, falling back to `video` when blank.
    pub fn file_prefix(&self) -> &str {
        let prefix = self.file_name_prefix.trim();
        if prefix.is_empty() {
            "video"
        } else {
            prefix
        }
    }
}
