use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::secrets::expand_home;

/// Runtime configuration for a host embedding the batch runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub version: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_initial_progress")]
    pub initial_progress: u8,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_data_directory")]
    pub data_directory: String,
    #[serde(default = "default_download_directory")]
    pub download_directory: String,
    /// Environment variable holding the host-provided API key.
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: String,
    /// File holding the host-provided API key; wins over the env var.
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_model")]
    pub default_model: String,
}

fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_initial_progress() -> u8 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_data_directory() -> String {
    "~/.superveo/data".to_string()
}

fn default_download_directory() -> String {
    "~/Downloads/superveo".to_string()
}

fn default_api_key_env_var() -> String {
    "API_KEY".to_string()
}

fn default_model() -> String {
    "veo-3.1-generate-preview".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            api_base_url: default_api_base_url(),
            poll_interval_secs: default_poll_interval_secs(),
            initial_progress: default_initial_progress(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            data_directory: default_data_directory(),
            download_directory: default_download_directory(),
            api_key_env_var: default_api_key_env_var(),
            api_key_file: None,
            default_model: default_model(),
        }
    }
}

impl AppConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Data directory with `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(expand_home(&self.data_directory))
    }

    /// Download directory with `~` expanded.
    pub fn download_dir(&self) -> PathBuf {
        PathBuf::from(expand_home(&self.download_directory))
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir().join("superveo.db")
    }
}
