//! Process-wide application state.
//!
//! One `AppState` owns the job store, the activity log, and the user
//! settings. It is created once per process, handed to the orchestrator by
//! reference, and has explicit `load`/`save`/`reset` hooks instead of ambient
//! globals.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::broadcast::{JobEventBroadcaster, JobStore, LogSink};
use crate::config::{AppConfig, Settings};
use crate::credentials::{
    Credential, CredentialResolver, EnvKeyProvider, SessionKeyError, SessionKeyProvider,
};
use crate::db::{Database, DatabaseError, SnapshotStore, JOBS_KEY, LOGS_KEY, SETTINGS_KEY};
use crate::job::VideoJob;

pub struct AppState {
    store: Arc<dyn SnapshotStore>,
    jobs: JobStore,
    logs: LogSink,
    settings: RwLock<Settings>,
    resolver: CredentialResolver,
    credential_selected: AtomicBool,
}

impl AppState {
    /// Creates empty state with default settings. Nothing is read yet.
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        session: Option<Arc<dyn SessionKeyProvider>>,
    ) -> Self {
        Self {
            jobs: JobStore::new(store.clone(), JobEventBroadcaster::default()),
            logs: LogSink::new(store.clone()),
            settings: RwLock::new(Settings::default()),
            resolver: CredentialResolver::new(session),
            credential_selected: AtomicBool::new(false),
            store,
        }
    }

    /// Creates state and reads the three persisted snapshots.
    pub fn load(
        store: Arc<dyn SnapshotStore>,
        session: Option<Arc<dyn SessionKeyProvider>>,
    ) -> Result<Self, DatabaseError> {
        let state = Self::new(store, session);
        state.reload()?;
        Ok(state)
    }

    /// Opens the SQLite store under the configured data directory and loads
    /// state, using the configured key file or env var as the session key.
    pub fn open(config: &AppConfig) -> Result<Self, DatabaseError> {
        let path = config.database_path();
        log::info!("Opening state database at {}", path.display());
        let db = Database::open(&path)?;
        let session =
            EnvKeyProvider::new(config.api_key_env_var.clone(), config.api_key_file.clone());
        Self::load(Arc::new(db), Some(Arc::new(session)))
    }

    /// Re-reads jobs, logs, and settings from the store.
    pub fn reload(&self) -> Result<(), DatabaseError> {
        let jobs = self.jobs.load()?;
        let logs = self.logs.load()?;

        let settings = match self.store.load(SETTINGS_KEY)? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("Discarding unreadable settings snapshot: {}", e);
                Settings::default()
            }),
            None => Settings::default(),
        };
        *self.settings_write() = settings;

        log::info!("Loaded state: {} jobs, {} log entries", jobs, logs);
        Ok(())
    }

    /// Writes all three snapshots.
    pub fn save(&self) -> Result<(), DatabaseError> {
        self.jobs.persist()?;
        self.logs.persist()?;
        self.persist_settings()
    }

    /// Deletes every snapshot and returns to the initial state.
    pub fn reset(&self) -> Result<(), DatabaseError> {
        for key in [JOBS_KEY, LOGS_KEY, SETTINGS_KEY] {
            self.store.delete(key)?;
        }
        self.credential_selected.store(false, Ordering::Release);
        self.reload()?;
        log::info!("Application state reset");
        Ok(())
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    pub fn logs(&self) -> &LogSink {
        &self.logs
    }

    fn settings_read(&self) -> RwLockReadGuard<'_, Settings> {
        match self.settings.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Settings lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn settings_write(&self) -> RwLockWriteGuard<'_, Settings> {
        match self.settings.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Settings lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Returns a snapshot of the current settings.
    pub fn settings(&self) -> Settings {
        self.settings_read().clone()
    }

    /// Applies `f` to the settings and persists the result.
    pub fn update_settings<F>(&self, f: F) -> Result<Settings, DatabaseError>
    where
        F: FnOnce(&mut Settings),
    {
        let updated = {
            let mut settings = self.settings_write();
            f(&mut settings);
            settings.clone()
        };
        self.persist_settings()?;
        Ok(updated)
    }

    fn persist_settings(&self) -> Result<(), DatabaseError> {
        let raw = serde_json::to_string(&*self.settings_read()).map_err(|source| {
            DatabaseError::Serialization {
                key: SETTINGS_KEY.to_string(),
                source,
            }
        })?;
        self.store.save(SETTINGS_KEY, &raw)
    }

    /// Resolves the credential for the next request from current settings.
    pub fn resolve_credential(&self) -> Option<Credential> {
        self.resolver
            .resolve(&self.settings_read(), self.is_credential_selected())
    }

    pub fn is_credential_selected(&self) -> bool {
        self.credential_selected.load(Ordering::Acquire)
    }

    pub fn set_credential_selected(&self, selected: bool) {
        self.credential_selected.store(selected, Ordering::Release);
    }

    /// Marks the session key as rejected so the host prompts again.
    pub fn invalidate_credential(&self) {
        self.set_credential_selected(false);
    }

    /// Asks the host whether a session key is selected and stores the answer.
    pub async fn refresh_session_selection(&self) -> bool {
        let selected = match self.resolver.session() {
            Some(session) => match session.has_selected_key().await {
                Ok(selected) => selected,
                Err(e) => {
                    log::warn!("Could not check session key selection: {}", e);
                    false
                }
            },
            None => false,
        };
        self.set_credential_selected(selected);
        selected
    }

    /// Prompts the host to select a session key.
    pub async fn select_session_key(&self) -> bool {
        let Some(session) = self.resolver.session() else {
            self.logs.error(&SessionKeyError::NotAvailable.to_string());
            return false;
        };

        match session.open_select_key().await {
            Ok(()) => {
                self.set_credential_selected(true);
                self.logs
                    .success("API Key selected. You can now generate videos.");
                true
            }
            Err(SessionKeyError::NotAvailable) => {
                self.logs.error(&SessionKeyError::NotAvailable.to_string());
                false
            }
            Err(e) => {
                log::warn!("Key selection failed: {}", e);
                self.logs.error("Could not open API key selection dialog.");
                false
            }
        }
    }

    /// Removes one job. In-flight updates to it become no-ops.
    pub fn delete_job(&self, id: &str) -> Option<VideoJob> {
        self.jobs.remove_by_id(id)
    }

    pub fn clear_jobs(&self) {
        self.jobs.clear();
        self.logs.info("All jobs cleared.");
    }
}
