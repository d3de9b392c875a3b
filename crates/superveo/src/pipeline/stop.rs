use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Cooperative stop flag for a running batch.
///
/// Checked between jobs and raced against every network call and
/// inter-poll wait.
#[derive(Debug, Clone)]
pub struct StopSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn stop(&self) {
        self.sender.send_replace(true);
    }

    /// Clears the flag before a new batch starts.
    pub fn reset(&self) {
        self.sender.send_replace(false);
    }

    pub fn is_stopped(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once the flag is set.
    pub async fn stopped(&self) {
        let mut rx = self.sender.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Sleeps for `duration`. Returns true if stopped first.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_stopped() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_stopped(),
            _ = self.stopped() => true,
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
