pub mod broadcast;
pub mod client;
pub mod config;
pub mod credentials;
pub mod db;
pub mod download;
pub mod error;
pub mod job;
pub mod logging;
pub mod pipeline;
pub mod sanitize;
pub mod secrets;
pub mod state;

pub use broadcast::{JobEventBroadcaster, JobStore, LogEntry, LogSink, LogType};
pub use client::{AspectRatio, GenerationRequest, Operation, OperationClient, OperationState, VeoClient};
pub use config::{load_config, AppConfig, ApiKeyStatus, Settings};
pub use credentials::{Credential, CredentialResolver, EnvKeyProvider, SessionKeyProvider};
pub use db::{Database, MemorySnapshotStore, SnapshotStore};
pub use download::VideoDownloader;
pub use error::{
    BatchError, ConfigError, DownloadError, GenerationError, Result, SuperveoError,
};
pub use job::{JobPatch, JobStatus, VideoJob};
pub use pipeline::{BatchOrchestrator, BatchOutcome, BatchSummary, GenerationParams, OrchestratorConfig};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use state::AppState;
