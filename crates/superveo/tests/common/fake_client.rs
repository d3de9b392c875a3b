//! Scripted `OperationClient` for orchestrator tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use superveo::client::{GenerationRequest, Operation, OperationClient};
use superveo::{Credential, GenerationError};

use super::builders::{
    completed_operation, operation_with_error, operation_without_uri, pending_operation,
    video_uri_for,
};

/// What the fake API does for one prompt.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Stays pending for `polls` polls, then completes with a video.
    Complete { polls: usize },
    /// The start call fails.
    FailOnStart(GenerationError),
    /// Stays pending for `polls` polls, then the next poll fails.
    FailOnPoll { polls: usize, error: GenerationError },
    /// Stays pending for `polls` polls, then reports an embedded error.
    EmbeddedError { polls: usize, message: String },
    /// Completes immediately without a video URI.
    NoVideoUri,
    /// Never finishes.
    Hang,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Start,
    Poll,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub kind: CallKind,
    pub prompt: String,
    pub bearer: bool,
}

struct Tracked {
    prompt: String,
    behavior: Behavior,
    polls: usize,
}

type StartHook = Arc<dyn Fn(&str) + Send + Sync>;

pub struct FakeClient {
    default: Behavior,
    behaviors: Mutex<HashMap<String, Behavior>>,
    operations: Mutex<HashMap<String, Tracked>>,
    calls: Mutex<Vec<Call>>,
    next_id: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    start_hook: Mutex<Option<StartHook>>,
}

impl FakeClient {
    /// Every prompt completes after two polls unless scripted otherwise.
    pub fn new() -> Self {
        Self::with_default(Behavior::Complete { polls: 2 })
    }

    pub fn with_default(default: Behavior) -> Self {
        Self {
            default,
            behaviors: Mutex::new(HashMap::new()),
            operations: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            start_hook: Mutex::new(None),
        }
    }

    pub fn script(&self, prompt: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(prompt.to_string(), behavior);
    }

    /// Runs `hook` with the prompt before each start call is answered.
    pub fn on_start<F>(&self, hook: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.start_hook.lock().unwrap() = Some(Arc::new(hook));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn started_prompts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.kind == CallKind::Start)
            .map(|c| c.prompt)
            .collect()
    }

    pub fn poll_count(&self, prompt: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.kind == CallKind::Poll && c.prompt == prompt)
            .count()
    }

    /// Highest number of calls that were ever outstanding at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn behavior_for(&self, prompt: &str) -> Behavior {
        self.behaviors
            .lock()
            .unwrap()
            .get(prompt)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    fn record(&self, kind: CallKind, prompt: &str, credential: &Credential) {
        self.calls.lock().unwrap().push(Call {
            kind,
            prompt: prompt.to_string(),
            bearer: credential.is_bearer(),
        });
    }

    fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn answer_start(&self, prompt: &str) -> Result<Operation, GenerationError> {
        let behavior = self.behavior_for(prompt);
        let name = format!(
            "models/fake/operations/{}",
            self.next_id.fetch_add(1, Ordering::SeqCst)
        );

        let value = match &behavior {
            Behavior::FailOnStart(error) => return Err(error.clone()),
            Behavior::NoVideoUri => operation_without_uri(&name),
            Behavior::Complete { polls: 0 } => completed_operation(&name, &video_uri_for(prompt)),
            _ => pending_operation(&name),
        };

        self.operations.lock().unwrap().insert(
            name,
            Tracked {
                prompt: prompt.to_string(),
                behavior,
                polls: 0,
            },
        );
        Ok(Operation::from_value(value))
    }

    fn answer_poll(&self, operation: &Operation) -> Result<Operation, GenerationError> {
        let name = operation
            .name
            .clone()
            .ok_or_else(|| GenerationError::Api("Operation has no name to poll.".into()))?;

        let mut operations = self.operations.lock().unwrap();
        let tracked = operations
            .get_mut(&name)
            .ok_or_else(|| GenerationError::Auth("Requested entity was not found.".into()))?;
        tracked.polls += 1;
        let polls = tracked.polls;

        let value = match &tracked.behavior {
            Behavior::Complete { polls: needed } if polls >= *needed => {
                completed_operation(&name, &video_uri_for(&tracked.prompt))
            }
            Behavior::FailOnPoll { polls: needed, error } if polls > *needed => {
                return Err(error.clone());
            }
            Behavior::EmbeddedError {
                polls: needed,
                message,
            } if polls > *needed => operation_with_error(&name, message),
            _ => pending_operation(&name),
        };

        let refreshed = Operation::from_value(value);
        if let Some(message) = refreshed.embedded_error() {
            return Err(GenerationError::Api(format!(
                "Generation failed during operation: {}",
                message
            )));
        }
        Ok(refreshed)
    }

    fn prompt_of(&self, operation: &Operation) -> String {
        operation
            .name
            .as_ref()
            .and_then(|name| {
                self.operations
                    .lock()
                    .unwrap()
                    .get(name)
                    .map(|t| t.prompt.clone())
            })
            .unwrap_or_default()
    }
}

impl Default for FakeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperationClient for FakeClient {
    async fn start_generation(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
    ) -> Result<Operation, GenerationError> {
        self.enter();
        self.record(CallKind::Start, &request.prompt, credential);
        let hook = self.start_hook.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(&request.prompt);
        }
        tokio::task::yield_now().await;
        let result = self.answer_start(&request.prompt);
        self.exit();
        result
    }

    async fn poll_operation(
        &self,
        operation: &Operation,
        credential: &Credential,
    ) -> Result<Operation, GenerationError> {
        self.enter();
        let prompt = self.prompt_of(operation);
        self.record(CallKind::Poll, &prompt, credential);
        tokio::task::yield_now().await;
        let result = self.answer_poll(operation);
        self.exit();
        result
    }
}
