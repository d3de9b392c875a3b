use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::client::{Operation, OperationClient, OperationState};
use crate::credentials::Credential;
use crate::download::VideoDownloader;
use crate::error::{BatchError, GenerationError};
use crate::job::{JobPatch, VideoJob};
use crate::state::AppState;

use super::config::{GenerationParams, OrchestratorConfig};
use super::progress::ProgressTracker;
use super::prompts::parse_prompts;
use super::stop::StopSignal;

pub const AUTH_ABORT_MESSAGE: &str = "Batch aborted: the API key or token was rejected.";
pub const NO_CREDENTIAL_MESSAGE: &str = "No API key or token available; job was not started.";
pub const STOPPED_MESSAGE: &str = "Batch stopped before this job started.";

/// How a batch run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every job was attempted.
    Finished,
    /// A rejected credential stopped the queue.
    AuthAborted,
    /// The credential disappeared mid-batch.
    CredentialMissing,
    /// [`BatchOrchestrator::stop`] was called.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Job ids in prompt order.
    pub job_ids: Vec<String>,
    pub completed: usize,
    pub failed: usize,
    /// Jobs failed in bulk without being started.
    pub skipped: usize,
    pub outcome: BatchOutcome,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.job_ids.len()
    }
}

/// Clears the running flag when the batch ends, however it ends.
struct RunningGuard {
    flag: Arc<AtomicBool>,
}

impl RunningGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, BatchError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| BatchError::AlreadyRunning)?;
        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drives prompt batches through the generation API one job at a time.
///
/// Holds no persistent state of its own; every change goes through the
/// job store and log sink on [`AppState`].
pub struct BatchOrchestrator {
    state: Arc<AppState>,
    client: Arc<dyn OperationClient>,
    downloader: Option<Arc<VideoDownloader>>,
    config: OrchestratorConfig,
    running: Arc<AtomicBool>,
    stop: StopSignal,
}

impl BatchOrchestrator {
    pub fn new(
        state: Arc<AppState>,
        client: Arc<dyn OperationClient>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            state,
            client,
            downloader: None,
            config,
            running: Arc::new(AtomicBool::new(false)),
            stop: StopSignal::new(),
        }
    }

    /// Enables auto-download of completed videos when the setting is on.
    pub fn with_downloader(mut self, downloader: Arc<VideoDownloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Requests the running batch to stop. No-op when idle.
    pub fn stop(&self) {
        if self.is_running() {
            info!("Stop requested");
            self.stop.stop();
        }
    }

    /// Creates one job per non-blank line of `input` and processes them.
    pub async fn run_batch(
        &self,
        input: &str,
        params: &GenerationParams,
    ) -> Result<BatchSummary, BatchError> {
        let _guard = self.begin()?;

        let prompts = parse_prompts(input);
        if prompts.is_empty() {
            self.state.logs().warning(&BatchError::NoPrompts.to_string());
            return Err(BatchError::NoPrompts);
        }

        self.start(prompts, params).await
    }

    /// Removes every failed job and resubmits its prompt as a new batch.
    pub async fn retry_failed(
        &self,
        params: &GenerationParams,
    ) -> Result<BatchSummary, BatchError> {
        let _guard = self.begin()?;

        if self.state.jobs().counts().failed == 0 {
            return Err(BatchError::NothingToRetry);
        }
        if self.state.resolve_credential().is_none() {
            self.state
                .logs()
                .error(&BatchError::MissingCredential.to_string());
            return Err(BatchError::MissingCredential);
        }

        let prompts = resubmission_order(
            self.state
                .jobs()
                .remove_by_status(crate::job::JobStatus::Failed),
        );
        self.state
            .logs()
            .info(&format!("Retrying {} failed videos.", prompts.len()));

        self.start(prompts, params).await
    }

    /// Claims the running flag and clears any stop left from an earlier run.
    fn begin(&self) -> Result<RunningGuard, BatchError> {
        let guard = RunningGuard::acquire(&self.running)?;
        self.stop.reset();
        Ok(guard)
    }

    async fn start(
        &self,
        prompts: Vec<String>,
        params: &GenerationParams,
    ) -> Result<BatchSummary, BatchError> {
        if self.state.resolve_credential().is_none() {
            self.state
                .logs()
                .error(&BatchError::MissingCredential.to_string());
            return Err(BatchError::MissingCredential);
        }

        self.state.logs().info(&format!(
            "Starting batch generation for {} videos...",
            prompts.len()
        ));

        let submitted_at = Utc::now();
        let jobs: Vec<VideoJob> = prompts
            .into_iter()
            .map(|prompt| VideoJob::new(prompt, submitted_at))
            .collect();
        self.state.jobs().insert_batch(jobs.clone());

        let span = info_span!("batch", jobs = jobs.len(), model = %params.model);
        let summary = self.process_batch(&jobs, params).instrument(span).await;

        self.state.logs().success(&format!(
            "Resilient batch result: {}/{} videos successful",
            summary.completed,
            summary.total()
        ));
        Ok(summary)
    }

    async fn process_batch(&self, jobs: &[VideoJob], params: &GenerationParams) -> BatchSummary {
        let mut summary = BatchSummary {
            job_ids: jobs.iter().map(|j| j.id.clone()).collect(),
            completed: 0,
            failed: 0,
            skipped: 0,
            outcome: BatchOutcome::Finished,
        };

        for (position, job) in jobs.iter().enumerate() {
            let number = position + 1;

            if self.stop.is_stopped() {
                summary.skipped += self.fail_remaining(&jobs[position..], STOPPED_MESSAGE);
                self.state.logs().warning("Batch stopped by user.");
                summary.outcome = BatchOutcome::Stopped;
                break;
            }

            if self.state.jobs().get(&job.id).is_none() {
                debug!(job_id = %job.id, "job removed before start, skipping");
                continue;
            }

            let Some(credential) = self.state.resolve_credential() else {
                summary.skipped += self.fail_remaining(&jobs[position..], NO_CREDENTIAL_MESSAGE);
                self.state
                    .logs()
                    .error(&BatchError::MissingCredential.to_string());
                summary.outcome = BatchOutcome::CredentialMissing;
                break;
            };

            let span = info_span!("job", number, job_id = %job.id);
            let result = self
                .process_job(job, number, params, &credential)
                .instrument(span)
                .await;

            match result {
                Ok(Some(video_url)) => {
                    summary.completed += 1;
                    self.auto_download(&job.id, &video_url, &credential).await;
                }
                Ok(None) => {
                    debug!(job_id = %job.id, "job removed while in flight, not counted");
                }
                Err(error) => {
                    let failed = self
                        .state
                        .jobs()
                        .update_by_id(&job.id, &JobPatch::failed(error.to_string()));
                    if failed.is_some() {
                        summary.failed += 1;
                        self.state
                            .logs()
                            .error(&format!("Video #{} -> FAILED: {}", number, error));
                    }

                    if !error.aborts_batch() {
                        continue;
                    }

                    let (message, outcome) = match error {
                        GenerationError::Auth(_) => {
                            self.state.invalidate_credential();
                            self.state
                                .logs()
                                .error("API key error detected. Please re-select your API key.");
                            (AUTH_ABORT_MESSAGE, BatchOutcome::AuthAborted)
                        }
                        GenerationError::Cancelled => {
                            self.state.logs().warning("Batch stopped by user.");
                            (STOPPED_MESSAGE, BatchOutcome::Stopped)
                        }
                        _ => (NO_CREDENTIAL_MESSAGE, BatchOutcome::CredentialMissing),
                    };
                    summary.skipped += self.fail_remaining(&jobs[position + 1..], message);
                    summary.outcome = outcome;
                    break;
                }
            }
        }

        summary
    }

    /// Fails every still-pending job in `rest` in one bulk update.
    fn fail_remaining(&self, rest: &[VideoJob], message: &str) -> usize {
        if rest.is_empty() {
            return 0;
        }
        let ids: Vec<String> = rest.iter().map(|j| j.id.clone()).collect();
        let count = self
            .state
            .jobs()
            .update_many(&ids, &JobPatch::failed(message));
        if count > 0 {
            warn!(count, "remaining jobs failed without starting: {}", message);
        }
        count
    }

    /// Drives one job to completion. Returns the video URL, or `None` when
    /// the job was deleted before it finished.
    async fn process_job(
        &self,
        job: &VideoJob,
        number: usize,
        params: &GenerationParams,
        credential: &Credential,
    ) -> Result<Option<String>, GenerationError> {
        let jobs = self.state.jobs();
        jobs.update_by_id(&job.id, &JobPatch::in_progress());
        self.state.logs().info(&format!(
            "Video #{} -> IN_PROGRESS, starting process",
            number
        ));

        let mut progress = ProgressTracker::with_step(
            self.config.initial_progress,
            self.config.progress_step,
            self.config.progress_cap,
        );

        let request = params.request_for(&job.prompt);
        let mut operation = tokio::select! {
            result = self.client.start_generation(&request, credential) => result?,
            _ = self.stop.stopped() => return Err(GenerationError::Cancelled),
        };
        debug!(operation = ?operation.name, "generation started");

        jobs.update_by_id(&job.id, &JobPatch::progress(progress.start()));
        jobs.update_by_id(&job.id, &JobPatch::operation(operation.raw.clone()));

        while !operation.is_done() {
            if self.stop.sleep(self.config.poll_interval).await {
                return Err(GenerationError::Cancelled);
            }

            operation = tokio::select! {
                result = self.client.poll_operation(&operation, credential) => result?,
                _ = self.stop.stopped() => return Err(GenerationError::Cancelled),
            };

            if !operation.is_done() {
                let mut patch = JobPatch::progress(progress.advance());
                patch.operation = Some(operation.raw.clone());
                jobs.update_by_id(&job.id, &patch);
            }
        }

        self.finish(job, number, operation)
    }

    fn finish(
        &self,
        job: &VideoJob,
        number: usize,
        operation: Operation,
    ) -> Result<Option<String>, GenerationError> {
        match operation.state {
            OperationState::Completed { video_uri } => {
                let updated = self.state.jobs().update_by_id(
                    &job.id,
                    &JobPatch::completed(video_uri.clone(), operation.raw),
                );
                if updated.is_none() {
                    return Ok(None);
                }
                self.state
                    .logs()
                    .success(&format!("Video #{} -> COMPLETED successfully.", number));
                Ok(Some(video_uri))
            }
            OperationState::Failed { message } => {
                self.state
                    .jobs()
                    .update_by_id(&job.id, &JobPatch::operation(operation.raw));
                Err(GenerationError::Api(message))
            }
            OperationState::Pending => Err(GenerationError::Application(
                "operation finished without a result".to_string(),
            )),
        }
    }

    async fn auto_download(&self, job_id: &str, video_url: &str, credential: &Credential) {
        let Some(downloader) = &self.downloader else {
            return;
        };
        let settings = self.state.settings();
        if !settings.auto_download {
            return;
        }

        let jobs = self.state.jobs().get_all();
        let Some(position) = jobs.iter().position(|j| j.id == job_id) else {
            return;
        };
        debug!(job_id, video_url = %crate::sanitize::redact_api_key(video_url), "auto-downloading");

        match downloader
            .download(&jobs[position], position + 1, settings.file_prefix(), credential)
            .await
        {
            Ok(path) => self
                .state
                .logs()
                .info(&format!("Downloaded {}", path.display())),
            Err(e) => self
                .state
                .logs()
                .warning(&format!("Auto-download failed: {}", e)),
        }
    }
}

/// Orders failed jobs for resubmission: oldest batch first, prompt order
/// within each batch. `failed` is in display order (newest batch first).
fn resubmission_order(failed: Vec<VideoJob>) -> Vec<String> {
    let mut batches: Vec<Vec<String>> = Vec::new();
    let mut current: Option<DateTime<Utc>> = None;
    for job in failed {
        if current != Some(job.timestamp) {
            current = Some(job.timestamp);
            batches.push(Vec::new());
        }
        if let Some(batch) = batches.last_mut() {
            batch.push(job.prompt);
        }
    }
    batches.into_iter().rev().flatten().collect()
}
