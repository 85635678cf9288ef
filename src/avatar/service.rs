// Avatar generation service client. The trait is the seam: the pipeline is
// exercised against scripted implementations in tests while deployments use
// the HTTP client below.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote generation state for one question's avatar clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

/// Status payload returned by one poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarStatusResponse {
    pub status: GenerationStatus,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// What the service should generate. Voice fields are optional overrides
/// forwarded verbatim.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub question_id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_style: Option<String>,
}

impl GenerationRequest {
    pub fn new(question_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            text: text.into(),
            voice_id: None,
            voice_style: None,
        }
    }
}

/// Failures talking to the generation service. Transport problems are
/// transient and retried; rejections are not.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("avatar service transport failure: {0}")]
    Transport(String),

    #[error("avatar generation request rejected: {0}")]
    Rejected(String),
}

impl ServiceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Transport(_))
    }
}

#[async_trait]
pub trait AvatarService: Send + Sync {
    /// Ask the service to start generating the clip. An accepted request
    /// moves the question into `processing`.
    async fn invoke(&self, request: &GenerationRequest) -> Result<(), ServiceError>;

    /// One status poll.
    async fn status(&self, question_id: &str) -> Result<AvatarStatusResponse, ServiceError>;
}

/// HTTP client for the generation endpoints.
pub struct HttpAvatarService {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct InvokeBody<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice_style: Option<&'a str>,
}

impl HttpAvatarService {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }
}

#[async_trait]
impl AvatarService for HttpAvatarService {
    async fn invoke(&self, request: &GenerationRequest) -> Result<(), ServiceError> {
        let url = format!(
            "{}/interviews/questions/{}/invoke-avatar",
            self.base_url, request.question_id
        );
        debug!("invoking avatar generation: {}", url);
        let response = self
            .client
            .post(&url)
            .json(&InvokeBody {
                text: &request.text,
                voice_id: request.voice_id.as_deref(),
                voice_style: request.voice_style.as_deref(),
            })
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                Err(ServiceError::Transport(format!("{}: {}", status, body)))
            } else {
                Err(ServiceError::Rejected(format!("{}: {}", status, body)))
            }
        }
    }

    async fn status(&self, question_id: &str) -> Result<AvatarStatusResponse, ServiceError> {
        let url = format!(
            "{}/interviews/questions/{}/avatar-status",
            self.base_url, question_id
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ServiceError::Transport(format!(
                "status poll returned {}",
                response.status()
            )));
        }
        response
            .json::<AvatarStatusResponse>()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))
    }
}
