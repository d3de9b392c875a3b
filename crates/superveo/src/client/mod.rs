//! Remote operation client for the video generation API.
//!
//! Generation is a long-running operation: one call starts it and returns a
//! handle, further calls poll the handle until it is done. The client never
//! retries on its own; all scheduling belongs to the orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::credentials::Credential;
use crate::error::GenerationError;

pub mod operation;
pub mod veo;

pub use operation::{Operation, OperationState};
pub use veo::{classify_failure, RequestPhase, VeoClient};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One prompt submitted for generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub model: String,
}

#[async_trait]
pub trait OperationClient: Send + Sync {
    /// Submits a prompt and returns the operation handle.
    async fn start_generation(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
    ) -> Result<Operation, GenerationError>;

    /// Fetches the current state of a previously started operation.
    ///
    /// An error embedded in the refreshed operation is returned as
    /// [`GenerationError::Api`].
    async fn poll_operation(
        &self,
        operation: &Operation,
        credential: &Credential,
    ) -> Result<Operation, GenerationError>;
}
