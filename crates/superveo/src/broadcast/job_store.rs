//! Ordered job collection with snapshot persistence.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::broadcast::job_events::{JobChange, JobEventBroadcaster};
use crate::db::{DatabaseError, SnapshotStore, JOBS_KEY};
use crate::job::{JobPatch, JobStatus, VideoJob};

/// Job counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Ordered collection of jobs keyed by id.
///
/// Display order is insertion order with the newest batch first. Every
/// mutation rewrites the `veo-jobs` snapshot and publishes a [`JobChange`].
pub struct JobStore {
    store: Arc<dyn SnapshotStore>,
    jobs: RwLock<Vec<VideoJob>>,
    events: JobEventBroadcaster,
}

impl JobStore {
    /// Creates an empty job store persisting into `store`.
    pub fn new(store: Arc<dyn SnapshotStore>, events: JobEventBroadcaster) -> Self {
        Self {
            store,
            jobs: RwLock::new(Vec::new()),
            events,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<VideoJob>> {
        match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<VideoJob>> {
        match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Returns the broadcaster observers subscribe to.
    pub fn events(&self) -> &JobEventBroadcaster {
        &self.events
    }

    /// Replaces the in-memory collection with the persisted snapshot.
    ///
    /// A missing snapshot yields an empty store; an unreadable one is logged
    /// and also yields an empty store.
    pub fn load(&self) -> Result<usize, DatabaseError> {
        let loaded: Vec<VideoJob> = match self.store.load(JOBS_KEY)? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(jobs) => jobs,
                Err(e) => {
                    log::warn!("Discarding unreadable job snapshot: {}", e);
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let count = loaded.len();
        *self.write() = loaded;
        log::info!("Loaded {} jobs from snapshot", count);
        Ok(count)
    }

    /// Serializes the current collection.
    pub fn snapshot(&self) -> Result<String, DatabaseError> {
        serde_json::to_string(&*self.read()).map_err(|source| DatabaseError::Serialization {
            key: JOBS_KEY.to_string(),
            source,
        })
    }

    /// Writes the current collection to the snapshot store.
    pub fn persist(&self) -> Result<(), DatabaseError> {
        let raw = self.snapshot()?;
        self.store.save(JOBS_KEY, &raw)
    }

    fn persist_logged(&self) {
        if let Err(e) = self.persist() {
            log::error!("Failed to persist jobs: {}", e);
        }
    }

    /// Prepends a batch, keeping the batch's own order.
    pub fn insert_batch(&self, batch: Vec<VideoJob>) {
        if batch.is_empty() {
            return;
        }
        {
            let mut jobs = self.write();
            jobs.splice(0..0, batch.iter().cloned());
        }
        self.persist_logged();
        self.events.send(JobChange::Inserted { jobs: batch });
    }

    /// Merges `patch` into the job with `id`. Missing ids are a no-op.
    ///
    /// Returns the job after the update if it exists.
    pub fn update_by_id(&self, id: &str, patch: &JobPatch) -> Option<VideoJob> {
        let updated = {
            let mut jobs = self.write();
            let job = jobs.iter_mut().find(|j| j.id == id)?;
            job.apply(patch).then(|| job.clone())
        };

        match updated {
            Some(job) => {
                self.persist_logged();
                self.events.send(JobChange::Updated { job: job.clone() });
                Some(job)
            }
            None => self.get(id),
        }
    }

    /// Applies the same patch to every listed job in one update.
    ///
    /// Returns how many jobs changed.
    pub fn update_many(&self, ids: &[String], patch: &JobPatch) -> usize {
        let changed: Vec<VideoJob> = {
            let mut jobs = self.write();
            jobs.iter_mut()
                .filter(|j| ids.contains(&j.id))
                .filter_map(|j| j.apply(patch).then(|| j.clone()))
                .collect()
        };

        if !changed.is_empty() {
            self.persist_logged();
        }
        let count = changed.len();
        for job in changed {
            self.events.send(JobChange::Updated { job });
        }
        count
    }

    /// Removes the job with `id`.
    pub fn remove_by_id(&self, id: &str) -> Option<VideoJob> {
        let removed = {
            let mut jobs = self.write();
            let index = jobs.iter().position(|j| j.id == id)?;
            jobs.remove(index)
        };
        self.persist_logged();
        self.events.send(JobChange::Removed {
            job_id: id.to_string(),
        });
        Some(removed)
    }

    /// Removes every job with the given status. Returns the removed jobs in
    /// display order.
    pub fn remove_by_status(&self, status: JobStatus) -> Vec<VideoJob> {
        let removed: Vec<VideoJob> = {
            let mut jobs = self.write();
            let (removed, kept): (Vec<VideoJob>, Vec<VideoJob>) =
                jobs.drain(..).partition(|j| j.status == status);
            *jobs = kept;
            removed
        };
        if !removed.is_empty() {
            self.persist_logged();
            for job in &removed {
                self.events.send(JobChange::Removed {
                    job_id: job.id.clone(),
                });
            }
        }
        removed
    }

    /// Removes every job.
    pub fn clear(&self) {
        self.write().clear();
        self.persist_logged();
        self.events.send(JobChange::Cleared);
    }

    /// Returns a job by id.
    pub fn get(&self, id: &str) -> Option<VideoJob> {
        self.read().iter().find(|j| j.id == id).cloned()
    }

    /// Returns all jobs in display order.
    pub fn get_all(&self) -> Vec<VideoJob> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns jobs with the given status in display order.
    pub fn with_status(&self, status: JobStatus) -> Vec<VideoJob> {
        self.read()
            .iter()
            .filter(|j| j.status == status)
            .cloned()
            .collect()
    }

    /// Completed jobs that carry a video URL, in display order.
    pub fn completed_videos(&self) -> Vec<VideoJob> {
        self.read()
            .iter()
            .filter(|j| j.status == JobStatus::Completed && j.video_url.is_some())
            .cloned()
            .collect()
    }

    pub fn counts(&self) -> JobCounts {
        let mut counts = JobCounts::default();
        for job in self.read().iter() {
            match job.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::InProgress => counts.in_progress += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}
