//! Saving generated videos to disk.

use std::path::{Path, PathBuf};

use log::{info, warn};
use reqwest::{Client, Request};

use crate::config::AppConfig;
use crate::credentials::Credential;
use crate::error::DownloadError;
use crate::job::{JobStatus, VideoJob};
use crate::sanitize::{prompt_slug, redact_api_key};

/// `<prefix>_<index>_<slug>.mp4`
pub fn video_file_name(prefix: &str, index: usize, prompt: &str) -> String {
    format!("{}_{}_{}.mp4", prefix, index, prompt_slug(prompt))
}

/// Result of downloading every completed job.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub saved: Vec<PathBuf>,
    /// Job id and the reason it was not saved.
    pub failed: Vec<(String, DownloadError)>,
}

#[derive(Debug, Clone)]
pub struct VideoDownloader {
    http: Client,
    directory: PathBuf,
}

impl VideoDownloader {
    pub fn new(http: Client, directory: impl Into<PathBuf>) -> Self {
        Self {
            http,
            directory: directory.into(),
        }
    }

    /// Videos can be large, so only the connect phase is bounded.
    pub fn from_config(config: &AppConfig) -> Result<Self, DownloadError> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| DownloadError::Request(e.to_string()))?;
        Ok(Self::new(http, config.download_dir()))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Builds the fetch for a video URI, authorized like every API call.
    pub fn build_request(
        &self,
        video_url: &str,
        credential: &Credential,
    ) -> Result<Request, DownloadError> {
        credential
            .authorize(self.http.get(video_url))
            .build()
            .map_err(|e| DownloadError::Request(e.without_url().to_string()))
    }

    /// Downloads one completed job. `index` is its 1-based display position.
    pub async fn download(
        &self,
        job: &VideoJob,
        index: usize,
        prefix: &str,
        credential: &Credential,
    ) -> Result<PathBuf, DownloadError> {
        let video_url = match (job.status, job.video_url.as_deref()) {
            (JobStatus::Completed, Some(url)) => url,
            _ => return Err(DownloadError::NoVideo(job.id.clone())),
        };

        let request = self.build_request(video_url, credential)?;
        info!("Downloading {}", redact_api_key(request.url().as_str()));

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| DownloadError::Request(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.chars().take(200).collect();
            return Err(DownloadError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DownloadError::Request(e.without_url().to_string()))?;

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| DownloadError::WriteFile {
                path: self.directory.clone(),
                source: e,
            })?;

        let path = self
            .directory
            .join(video_file_name(prefix, index, &job.prompt));
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| DownloadError::WriteFile {
                path: path.clone(),
                source: e,
            })?;

        Ok(path)
    }

    /// Downloads every completed job in `jobs`, numbered by display position.
    pub async fn download_all_completed(
        &self,
        jobs: &[VideoJob],
        prefix: &str,
        credential: &Credential,
    ) -> DownloadReport {
        let mut report = DownloadReport::default();

        for (position, job) in jobs.iter().enumerate() {
            if job.status != JobStatus::Completed {
                continue;
            }
            match self.download(job, position + 1, prefix, credential).await {
                Ok(path) => report.saved.push(path),
                Err(e) => {
                    warn!("Failed to download video for job {}: {}", job.id, e);
                    report.failed.push((job.id.clone(), e));
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobPatch;
    use chrono::Utc;

    fn downloader(dir: &Path) -> VideoDownloader {
        VideoDownloader::new(Client::new(), dir)
    }

    #[test]
    fn test_video_file_name() {
        assert_eq!(
            video_file_name("video", 3, "A cat playing in the garden!"),
            "video_3_a_cat_playing_in_the_garden_.mp4"
        );
    }

    #[test]
    fn test_request_appends_key_to_existing_query() {
        let dir = tempfile::tempdir().unwrap();
        let credential = Credential::from_raw("AIzaSyXXXX").unwrap();
        let request = downloader(dir.path())
            .build_request("https://files.example.com/v1/files/abc:download?alt=media", &credential)
            .unwrap();
        assert_eq!(request.url().query(), Some("alt=media&key=AIzaSyXXXX"));
    }

    #[test]
    fn test_request_with_token_uses_header() {
        let dir = tempfile::tempdir().unwrap();
        let credential = Credential::from_raw("ya29.abc").unwrap();
        let request = downloader(dir.path())
            .build_request("https://files.example.com/v1/files/abc:download?alt=media", &credential)
            .unwrap();
        assert_eq!(request.url().query(), Some("alt=media"));
        assert_eq!(request.headers().get("authorization").unwrap(), "Bearer ya29.abc");
    }

    #[tokio::test]
    async fn test_download_requires_completed_job() {
        let dir = tempfile::tempdir().unwrap();
        let credential = Credential::from_raw("AIzaSyXXXX").unwrap();
        let job = VideoJob::new("pending prompt", Utc::now());

        let result = downloader(dir.path())
            .download(&job, 1, "video", &credential)
            .await;
        assert!(matches!(result, Err(DownloadError::NoVideo(_))));
    }

    #[tokio::test]
    async fn test_download_all_skips_unfinished_and_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let credential = Credential::from_raw("AIzaSyXXXX").unwrap();

        let pending = VideoJob::new("still waiting", Utc::now());
        let mut done = VideoJob::new("unreachable video", Utc::now());
        done.apply(&JobPatch::in_progress());
        done.apply(&JobPatch::completed(
            "http://127.0.0.1:1/video.mp4",
            serde_json::json!({ "done": true }),
        ));

        let report = downloader(dir.path())
            .download_all_completed(&[pending, done.clone()], "video", &credential)
            .await;
        assert!(report.saved.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, done.id);
    }
}
