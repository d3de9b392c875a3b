//! Batch orchestration.
//!
//! Prompts are processed strictly one at a time: each job is started, polled
//! until done, and recorded before the next begins. The only waits are the
//! network calls and the fixed inter-poll delay, both of which race the
//! batch's [`StopSignal`].

pub mod config;
pub mod progress;
pub mod prompts;
pub mod runner;
pub mod stop;

pub use config::{GenerationParams, OrchestratorConfig};
pub use progress::ProgressTracker;
pub use prompts::{load_prompt_file, parse_prompts};
pub use runner::{
    BatchOrchestrator, BatchOutcome, BatchSummary, AUTH_ABORT_MESSAGE, NO_CREDENTIAL_MESSAGE,
    STOPPED_MESSAGE,
};
pub use stop::StopSignal;
