//! HTTP implementation of [`OperationClient`] for the Veo API.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, Request, StatusCode};
use serde::Serialize;

use super::{AspectRatio, GenerationRequest, Operation, OperationClient};
use crate::config::AppConfig;
use crate::credentials::Credential;
use crate::error::GenerationError;
use crate::sanitize::redact_api_key;

/// Maximum length for error bodies carried in messages.
const MAX_ERROR_BODY_LENGTH: usize = 200;

const API_KEY_INVALID: &str = "API key not valid";
const ENTITY_NOT_FOUND: &str = "Requested entity was not found";

/// Which call a failure came from; polling reclassifies some messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Start,
    Poll,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideosBody<'a> {
    prompt: &'a str,
    config: VideoConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoConfig {
    number_of_videos: u8,
    resolution: &'static str,
    aspect_ratio: AspectRatio,
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_LENGTH {
        let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", head)
    } else {
        body.to_string()
    }
}

/// Extracts `error.message` from a JSON error body.
fn upstream_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

/// Maps a non-success response to the error taxonomy.
pub fn classify_failure(status: StatusCode, body: &str, phase: RequestPhase) -> GenerationError {
    let detail = upstream_message(body).unwrap_or_else(|| truncate_body(body));

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return GenerationError::Auth(format!(
            "The provided token or key may be invalid or expired. Details: {}",
            detail
        ));
    }

    if status == StatusCode::BAD_REQUEST && detail.contains(API_KEY_INVALID) {
        return GenerationError::Auth(detail);
    }

    if phase == RequestPhase::Poll && detail.contains(ENTITY_NOT_FOUND) {
        return GenerationError::Auth(
            "Polling failed: Operation not found. This can happen with an invalid API key or permissions issue."
                .to_string(),
        );
    }

    match phase {
        RequestPhase::Start => GenerationError::Api(format!(
            "Failed to start video generation ({}): {}",
            status.as_u16(),
            detail
        )),
        RequestPhase::Poll => GenerationError::Api(format!(
            "Polling failed ({}): {}",
            status.as_u16(),
            detail
        )),
    }
}

fn transport_error(e: reqwest::Error) -> GenerationError {
    GenerationError::Network(e.without_url().to_string())
}

/// Veo client over reqwest.
#[derive(Debug, Clone)]
pub struct VeoClient {
    http: Client,
    base_url: String,
}

impl VeoClient {
    pub fn new(
        base_url: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| GenerationError::Application(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, GenerationError> {
        Self::new(
            config.api_base_url.clone(),
            config.connect_timeout(),
            config.request_timeout(),
        )
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST {base}/v1beta/models/{model}:generateVideos`
    pub fn build_start_request(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
    ) -> Result<Request, GenerationError> {
        let url = format!(
            "{}/v1beta/models/{}:generateVideos",
            self.base_url, request.model
        );
        let body = GenerateVideosBody {
            prompt: &request.prompt,
            config: VideoConfig {
                number_of_videos: 1,
                resolution: "720p",
                aspect_ratio: request.aspect_ratio,
            },
        };

        credential
            .authorize(self.http.post(url).json(&body))
            .build()
            .map_err(|e| GenerationError::Application(e.without_url().to_string()))
    }

    /// `GET {base}/v1/{operation name}`
    pub fn build_poll_request(
        &self,
        operation_name: &str,
        credential: &Credential,
    ) -> Result<Request, GenerationError> {
        let url = format!(
            "{}/v1/{}",
            self.base_url,
            operation_name.trim_start_matches('/')
        );

        credential
            .authorize(self.http.get(url))
            .build()
            .map_err(|e| GenerationError::Application(e.without_url().to_string()))
    }

    async fn execute(
        &self,
        request: Request,
        phase: RequestPhase,
    ) -> Result<Operation, GenerationError> {
        debug!("{:?} request to {}", phase, redact_api_key(request.url().as_str()));

        let response = self.http.execute(request).await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            let error = classify_failure(status, &body, phase);
            warn!("{:?} request failed with {}: {}", phase, status, error);
            return Err(error);
        }

        let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            GenerationError::Api(format!(
                "Unexpected response from API ({}): {}",
                e,
                truncate_body(&body)
            ))
        })?;

        Ok(Operation::from_value(value))
    }
}

#[async_trait]
impl OperationClient for VeoClient {
    async fn start_generation(
        &self,
        request: &GenerationRequest,
        credential: &Credential,
    ) -> Result<Operation, GenerationError> {
        let http_request = self.build_start_request(request, credential)?;
        self.execute(http_request, RequestPhase::Start).await
    }

    async fn poll_operation(
        &self,
        operation: &Operation,
        credential: &Credential,
    ) -> Result<Operation, GenerationError> {
        let name = operation.name.as_deref().ok_or_else(|| {
            GenerationError::Api("Operation has no name to poll.".to_string())
        })?;

        let http_request = self.build_poll_request(name, credential)?;
        let refreshed = self.execute(http_request, RequestPhase::Poll).await?;

        if let Some(message) = refreshed.embedded_error() {
            return Err(GenerationError::Api(format!(
                "Generation failed during operation: {}",
                message
            )));
        }

        Ok(refreshed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> VeoClient {
        VeoClient::new(
            "https://veo.example.com/",
            Duration::from_secs(1),
            Duration::from_secs(2),
        )
        .unwrap()
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "A red fox in snow".to_string(),
            aspect_ratio: AspectRatio::Portrait,
            model: "veo-3.1-generate-preview".to_string(),
        }
    }

    #[test]
    fn test_start_request_with_api_key() {
        let credential = Credential::from_raw("AIzaSyXXXX").unwrap();
        let req = client().build_start_request(&request(), &credential).unwrap();

        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(
            req.url().as_str(),
            "https://veo.example.com/v1beta/models/veo-3.1-generate-preview:generateVideos?key=AIzaSyXXXX"
        );
        assert!(req.headers().get("authorization").is_none());

        let body: serde_json::Value =
            serde_json::from_slice(req.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "prompt": "A red fox in snow",
                "config": {
                    "numberOfVideos": 1,
                    "resolution": "720p",
                    "aspectRatio": "9:16"
                }
            })
        );
    }

    #[test]
    fn test_start_request_with_token() {
        let credential = Credential::from_raw("ya29.abc123").unwrap();
        let req = client().build_start_request(&request(), &credential).unwrap();

        assert_eq!(req.url().query(), None);
        assert_eq!(req.headers().get("authorization").unwrap(), "Bearer ya29.abc123");
    }

    #[test]
    fn test_poll_request_routes_credential() {
        let key = Credential::from_raw("AIzaSyXXXX").unwrap();
        let req = client()
            .build_poll_request("models/veo/operations/op1", &key)
            .unwrap();
        assert_eq!(req.method(), reqwest::Method::GET);
        assert_eq!(
            req.url().as_str(),
            "https://veo.example.com/v1/models/veo/operations/op1?key=AIzaSyXXXX"
        );

        let token = Credential::from_raw("ya29.abc123").unwrap();
        let req = client()
            .build_poll_request("models/veo/operations/op1", &token)
            .unwrap();
        assert_eq!(req.url().query(), None);
        assert_eq!(req.headers().get("authorization").unwrap(), "Bearer ya29.abc123");
    }

    #[test]
    fn test_classify_unauthorized() {
        let body = r#"{"error":{"code":401,"message":"Request had invalid credentials."}}"#;
        let err = classify_failure(StatusCode::UNAUTHORIZED, body, RequestPhase::Start);
        assert!(matches!(err, GenerationError::Auth(ref m) if m.contains("invalid credentials")));

        let err = classify_failure(StatusCode::FORBIDDEN, "denied", RequestPhase::Poll);
        assert!(matches!(err, GenerationError::Auth(_)));
    }

    #[test]
    fn test_classify_invalid_key_on_bad_request() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key."}}"#;
        let err = classify_failure(StatusCode::BAD_REQUEST, body, RequestPhase::Start);
        assert!(matches!(err, GenerationError::Auth(_)));
    }

    #[test]
    fn test_classify_other_bad_request_is_api() {
        let body = r#"{"error":{"code":400,"message":"Prompt too long"}}"#;
        let err = classify_failure(StatusCode::BAD_REQUEST, body, RequestPhase::Start);
        assert_eq!(
            err,
            GenerationError::Api("Failed to start video generation (400): Prompt too long".into())
        );
    }

    #[test]
    fn test_classify_not_found_only_auth_when_polling() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found."}}"#;
        let poll = classify_failure(StatusCode::NOT_FOUND, body, RequestPhase::Poll);
        assert!(matches!(poll, GenerationError::Auth(ref m) if m.contains("Operation not found")));

        let start = classify_failure(StatusCode::NOT_FOUND, body, RequestPhase::Start);
        assert!(matches!(start, GenerationError::Api(_)));
    }

    #[test]
    fn test_classify_truncates_raw_body() {
        let body = "x".repeat(500);
        let err = classify_failure(StatusCode::INTERNAL_SERVER_ERROR, &body, RequestPhase::Start);
        let message = err.to_string();
        assert!(message.ends_with("... (truncated)"));
        assert!(message.len() < 300);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let client = VeoClient::new(
            "http://127.0.0.1:1",
            Duration::from_millis(200),
            Duration::from_millis(500),
        )
        .unwrap();
        let credential = Credential::from_raw("AIzaSyXXXX").unwrap();

        let err = client
            .start_generation(&request(), &credential)
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Network(_)));
        assert!(!err.to_string().contains("AIzaSyXXXX"));
    }

    #[tokio::test]
    async fn test_poll_without_name_is_api_error() {
        let credential = Credential::from_raw("AIzaSyXXXX").unwrap();
        let op = Operation::from_value(serde_json::json!({ "done": false }));

        let err = client().poll_operation(&op, &credential).await.unwrap_err();
        assert!(matches!(err, GenerationError::Api(_)));
    }
}
