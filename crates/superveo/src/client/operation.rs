use serde_json::Value;

/// Message used when a finished operation carries no video.
pub const MISSING_URI_MESSAGE: &str = "Video URI not found in API response.";

/// State of a remote operation, decided once when the response is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    Completed { video_uri: String },
    Failed { message: String },
}

/// Handle returned by the generation API.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Resource name used for polling, e.g. `models/veo/operations/abc`.
    pub name: Option<String>,
    pub state: OperationState,
    /// Raw response, kept for the job record.
    pub raw: Value,
    embedded_error: Option<String>,
}

impl Operation {
    pub fn from_value(raw: Value) -> Self {
        let name = raw
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        let done = raw.get("done").and_then(Value::as_bool).unwrap_or(false);
        let embedded_error = raw.get("error").filter(|e| !e.is_null()).map(error_message);

        let state = if let Some(message) = &embedded_error {
            OperationState::Failed {
                message: format!("Generation failed during operation: {}", message),
            }
        } else if done {
            match video_uri(&raw) {
                Some(uri) => OperationState::Completed {
                    video_uri: uri.to_string(),
                },
                None => OperationState::Failed {
                    message: MISSING_URI_MESSAGE.to_string(),
                },
            }
        } else {
            OperationState::Pending
        };

        Self {
            name,
            state,
            raw,
            embedded_error,
        }
    }

    pub fn is_done(&self) -> bool {
        !matches!(self.state, OperationState::Pending)
    }

    /// The upstream error message, when the operation reported one.
    pub fn embedded_error(&self) -> Option<&str> {
        self.embedded_error.as_deref()
    }
}

fn video_uri(raw: &Value) -> Option<&str> {
    raw.pointer("/response/generatedVideos/0/video/uri")
        .and_then(Value::as_str)
        .filter(|uri| !uri.is_empty())
}

fn error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}
