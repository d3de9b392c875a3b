use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SuperveoError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Logging error: {0}")]
    Logging(#[from] crate::logging::LoggingError),

    #[error("Failed to read prompt file '{path}': {source}")]
    PromptFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Classified failure of one generation request.
///
/// The variant decides the batch policy: `Auth` and `Configuration` abort the
/// remaining queue, everything else only fails the job it happened in.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// No credential available.
    #[error("{0}")]
    Configuration(String),

    /// Credential rejected or expired.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// No response was received.
    #[error("Network error: {0}")]
    Network(String),

    /// The remote call answered but signaled failure.
    #[error("{0}")]
    Api(String),

    /// The batch was stopped while this job was in flight.
    #[error("Stopped by user before the video finished")]
    Cancelled,

    #[error("An unexpected error occurred: {0}")]
    Application(String),
}

impl GenerationError {
    /// Returns true if every later job in the batch would fail the same way.
    pub fn aborts_batch(&self) -> bool {
        matches!(
            self,
            GenerationError::Auth(_) | GenerationError::Configuration(_) | GenerationError::Cancelled
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("A batch is already running")]
    AlreadyRunning,

    #[error("Please enter at least one prompt.")]
    NoPrompts,

    #[error("API key or token not found. Please add a key or token in the settings.")]
    MissingCredential,

    #[error("There are no failed jobs to retry.")]
    NothingToRetry,
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Job '{0}' has no video to download")]
    NoVideo(String),

    #[error("Download request failed: {0}")]
    Request(String),

    #[error("Download rejected ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("Failed to write '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SuperveoError>;
