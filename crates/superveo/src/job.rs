//! Job records tracked by the store and driven by the batch orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a job: `pending → in-progress → {completed | failed}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and failed jobs never change status again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "Pending"),
            JobStatus::InProgress => write!(f, "In progress"),
            JobStatus::Completed => write!(f, "Completed"),
            JobStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// One submitted generation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoJob {
    pub id: String,
    /// The exact prompt text submitted.
    pub prompt: String,
    pub status: JobStatus,
    /// Coarse percentage, informational only.
    #[serde(default)]
    pub progress: u8,
    /// Last raw operation snapshot returned by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<serde_json::Value>,
    /// Set iff the job completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// Set iff the job failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

impl VideoJob {
    /// Creates a pending job for `prompt`.
    pub fn new(prompt: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: new_job_id(timestamp),
            prompt: prompt.into(),
            status: JobStatus::Pending,
            progress: 0,
            operation: None,
            video_url: None,
            error: None,
            timestamp,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Merges `patch` into this job. Returns true if anything changed.
    ///
    /// Terminal jobs only accept patches that leave the status untouched,
    /// progress never regresses while in progress, and the
    /// `videoUrl`/`error` fields always agree with the status.
    pub fn apply(&mut self, patch: &JobPatch) -> bool {
        if self.status.is_terminal() && patch.status.is_some_and(|s| s != self.status) {
            log::debug!(
                "Ignoring status change {:?} for finished job {}",
                patch.status,
                self.id
            );
            return false;
        }

        let before = self.clone();

        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(operation) = &patch.operation {
            self.operation = Some(operation.clone());
        }

        match self.status {
            JobStatus::Completed => {
                if let Some(url) = &patch.video_url {
                    self.video_url = Some(url.clone());
                }
                self.error = None;
                self.progress = 100;
            }
            JobStatus::Failed => {
                if let Some(error) = &patch.error {
                    self.error = Some(error.clone());
                }
                self.video_url = None;
                self.progress = 0;
            }
            JobStatus::InProgress => {
                if let Some(progress) = patch.progress {
                    self.progress = self.progress.max(progress.min(100));
                }
            }
            JobStatus::Pending => {
                if let Some(progress) = patch.progress {
                    self.progress = progress.min(100);
                }
            }
        }

        *self != before
    }
}

/// Partial update merged into a job by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub operation: Option<serde_json::Value>,
    pub video_url: Option<String>,
    pub error: Option<String>,
}

impl JobPatch {
    pub fn in_progress() -> Self {
        Self {
            status: Some(JobStatus::InProgress),
            ..Default::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    pub fn operation(operation: serde_json::Value) -> Self {
        Self {
            operation: Some(operation),
            ..Default::default()
        }
    }

    pub fn completed(video_url: impl Into<String>, operation: serde_json::Value) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            operation: Some(operation),
            video_url: Some(video_url.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            progress: Some(0),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Builds a session-unique job id from the creation time plus a random part.
pub fn new_job_id(timestamp: DateTime<Utc>) -> String {
    format!(
        "{}-{}",
        timestamp.timestamp_millis(),
        uuid::Uuid::new_v4().simple()
    )
}
