//! Observable state collections.
//!
//! The job store and the activity log both persist on every mutation and
//! publish changes on broadcast channels so any host can re-render.

pub mod job_events;
pub mod job_store;
pub mod log_sink;

pub use job_events::{JobChange, JobEvent, JobEventBroadcaster};
pub use job_store::{JobCounts, JobStore};
pub use log_sink::{LogEntry, LogSink, LogType, MAX_LOG_ENTRIES};
