//! Test harness for orchestrator integration tests.
//!
//! Wires an `AppState` on an in-memory snapshot store, a scripted
//! `FakeClient`, and a `BatchOrchestrator` with no inter-poll delay.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use superveo::broadcast::LogType;
use superveo::db::MemorySnapshotStore;
use superveo::{
    AppState, AspectRatio, BatchOrchestrator, BatchSummary, GenerationParams, OrchestratorConfig,
    VideoJob,
};

use super::fake_client::FakeClient;

pub const TEST_API_KEY: &str = "AIzaSyTESTKEY0001";

pub struct TestHarness {
    pub store: Arc<MemorySnapshotStore>,
    pub state: Arc<AppState>,
    pub client: Arc<FakeClient>,
    pub orchestrator: Arc<BatchOrchestrator>,
}

impl TestHarness {
    /// Harness with a manual API key and the default fake client.
    pub fn new() -> Self {
        Self::with_client(FakeClient::new())
    }

    pub fn with_client(client: FakeClient) -> Self {
        let harness = Self::build(client, Self::fast_config());
        harness.set_manual_key(Some(TEST_API_KEY));
        harness
    }

    /// Harness with no credential configured.
    pub fn without_credential() -> Self {
        Self::build(FakeClient::new(), Self::fast_config())
    }

    pub fn build(client: FakeClient, config: OrchestratorConfig) -> Self {
        let store = Arc::new(MemorySnapshotStore::new());
        let state = Arc::new(AppState::load(store.clone(), None).expect("load state"));
        let client = Arc::new(client);
        let orchestrator = Arc::new(BatchOrchestrator::new(
            state.clone(),
            client.clone(),
            config,
        ));
        Self {
            store,
            state,
            client,
            orchestrator,
        }
    }

    pub fn fast_config() -> OrchestratorConfig {
        OrchestratorConfig {
            poll_interval: Duration::ZERO,
            ..OrchestratorConfig::default()
        }
    }

    pub fn params() -> GenerationParams {
        GenerationParams::new(AspectRatio::Landscape, "veo-3.1-generate-preview")
    }

    pub fn set_manual_key(&self, key: Option<&str>) {
        self.state
            .update_settings(|s| s.manual_api_key = key.map(str::to_string))
            .expect("update settings");
    }

    pub async fn run(&self, input: &str) -> Result<BatchSummary, superveo::BatchError> {
        self.orchestrator.run_batch(input, &Self::params()).await
    }

    /// Jobs of a batch in prompt order.
    pub fn batch_jobs(&self, summary: &BatchSummary) -> Vec<VideoJob> {
        summary
            .job_ids
            .iter()
            .map(|id| self.state.jobs().get(id).expect("job exists"))
            .collect()
    }

    /// Log messages oldest first.
    pub fn log_messages(&self) -> Vec<String> {
        self.state
            .logs()
            .entries()
            .into_iter()
            .rev()
            .map(|e| e.message)
            .collect()
    }

    pub fn log_count(&self, kind: LogType) -> usize {
        self.state
            .logs()
            .entries()
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }

    /// Polls `condition` until it holds or two seconds pass.
    pub async fn wait_until<F>(&self, condition: F) -> bool
    where
        F: Fn(&TestHarness) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while tokio::time::Instant::now() < deadline {
            if condition(self) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        condition(self)
    }
}
