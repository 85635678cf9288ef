// Interview API client. The trait keeps the runner testable; the HTTP
// implementation talks to the backend's REST surface.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::types::{CreatedInterview, Interview, NewQuestion};
use crate::media::RecordingArtifact;

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("interview service transport failure: {0}")]
    Transport(String),

    #[error("interview not found: {0}")]
    NotFound(String),

    #[error("recording upload failed: {0}")]
    Upload(String),

    #[error("unexpected response ({status}): {message}")]
    Unexpected { status: u16, message: String },
}

#[async_trait]
pub trait InterviewApi: Send + Sync {
    async fn create_interview(
        &self,
        questions: &[NewQuestion],
    ) -> Result<CreatedInterview, ApiError>;

    /// Fetch an interview by its candidate access token.
    async fn get_by_token(&self, token: &str) -> Result<Interview, ApiError>;

    /// Upload one recorded answer. Progress is only advanced after this
    /// returns Ok.
    async fn upload_recording(
        &self,
        interview_id: &str,
        question_id: &str,
        artifact: &RecordingArtifact,
    ) -> Result<(), ApiError>;
}

pub struct HttpInterviewApi {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct CreateInterviewBody<'a> {
    questions: &'a [NewQuestion],
}

impl HttpInterviewApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

#[async_trait]
impl InterviewApi for HttpInterviewApi {
    async fn create_interview(
        &self,
        questions: &[NewQuestion],
    ) -> Result<CreatedInterview, ApiError> {
        let url = format!("{}/interviews", self.base_url);
        debug!("creating interview with {} questions", questions.len());
        let response = self
            .client
            .post(&url)
            .json(&CreateInterviewBody { questions })
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Unexpected {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<CreatedInterview>()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))
    }

    async fn get_by_token(&self, token: &str) -> Result<Interview, ApiError> {
        let url = format!("{}/interviews/by-token/{}", self.base_url, token);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(token.to_string()));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Unexpected {
                status: status.as_u16(),
                message,
            });
        }
        let mut interview = response
            .json::<Interview>()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        interview.sort_questions();
        info!(
            "fetched interview {} with {} questions",
            interview.id,
            interview.questions.len()
        );
        Ok(interview)
    }

    async fn upload_recording(
        &self,
        interview_id: &str,
        question_id: &str,
        artifact: &RecordingArtifact,
    ) -> Result<(), ApiError> {
        let url = format!("{}/recordings/upload", self.base_url);
        // Codec parameters are stripped; multipart wants the bare mime type.
        let mime = artifact
            .media_type
            .split(';')
            .next()
            .unwrap_or("video/webm")
            .to_string();
        let part = reqwest::multipart::Part::bytes(artifact.data.clone())
            .file_name("response.webm")
            .mime_str(&mime)
            .map_err(|e| ApiError::Upload(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("interview_id", interview_id.to_string())
            .text("question_id", question_id.to_string())
            .part("file", part);

        info!(
            "uploading {} bytes for question {}",
            artifact.data.len(),
            question_id
        );
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Upload(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(ApiError::Upload(format!("{}: {}", status, message)))
        }
    }
}
