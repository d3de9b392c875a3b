//! Job event broadcaster for real-time job status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::job::VideoJob;

/// What happened to the job collection.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobChange {
    /// A batch was prepended, in display order.
    Inserted { jobs: Vec<VideoJob> },
    /// A job changed; carries the job after the change.
    Updated { job: VideoJob },
    Removed { job_id: String },
    Cleared,
}

/// A change notification with the time it was published.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub change: JobChange,
    pub timestamp: DateTime<Utc>,
}

impl JobEvent {
    pub fn new(change: JobChange) -> Self {
        Self {
            change,
            timestamp: Utc::now(),
        }
    }
}

/// Broadcasts job changes to any number of observers.
#[derive(Clone)]
pub struct JobEventBroadcaster {
    sender: Arc<broadcast::Sender<JobEvent>>,
}

impl JobEventBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends a change to all subscribers.
    pub fn send(&self, change: JobChange) {
        // No active receivers is fine
        let _ = self.sender.send(JobEvent::new(change));
    }

    /// Creates a new subscriber.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for JobEventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_without_receivers() {
        let broadcaster = JobEventBroadcaster::new(4);
        broadcaster.send(JobChange::Cleared);
    }

    #[test]
    fn test_send_receive() {
        let broadcaster = JobEventBroadcaster::new(4);
        let mut rx = broadcaster.subscribe();

        broadcaster.send(JobChange::Removed {
            job_id: "job-1".to_string(),
        });

        let event = rx.try_recv().unwrap();
        assert_eq!(
            event.change,
            JobChange::Removed {
                job_id: "job-1".to_string()
            }
        );
    }

    #[test]
    fn test_event_serializes_with_kind_tag() {
        let event = JobEvent::new(JobChange::Cleared);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["change"]["kind"], "cleared");
        assert!(value.get("timestamp").is_some());
    }
}
