// Interview wire types, shared between the HTTP client and the runner.

use serde::{Deserialize, Serialize};

use crate::avatar::{GenerationRequest, GenerationStatus};

/// One interview question as served by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub order_number: u32,
    /// Set when the presenter clip was generated ahead of time.
    #[serde(default)]
    pub avatar_video_url: Option<String>,
    #[serde(default)]
    pub avatar_video_status: Option<GenerationStatus>,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub voice_style: Option<String>,
}

impl Question {
    pub fn generation_request(&self) -> GenerationRequest {
        GenerationRequest {
            question_id: self.id.clone(),
            text: self.text.clone(),
            voice_id: self.voice_id.clone(),
            voice_style: self.voice_style.clone(),
        }
    }

    /// A pre-generated clip URL, when one exists.
    pub fn known_avatar_url(&self) -> Option<String> {
        self.avatar_video_url.clone()
    }
}

/// A previously submitted answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub id: String,
    pub question_id: String,
    pub video_url: String,
    #[serde(default)]
    pub transcription: Option<String>,
}

/// Full interview as fetched by access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interview {
    pub id: String,
    pub url_id: String,
    pub status: String,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub responses: Vec<ResponseRecord>,
}

impl Interview {
    /// Questions in presentation order.
    pub fn sort_questions(&mut self) {
        self.questions.sort_by_key(|q| q.order_number);
    }

    pub fn response_for(&self, question_id: &str) -> Option<&ResponseRecord> {
        self.responses.iter().find(|r| r.question_id == question_id)
    }
}

/// Payload for creating a question when setting up an interview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestion {
    pub text: String,
    pub order_number: u32,
}

/// Minimal response to interview creation: the id for API calls and the
/// url id handed to candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedInterview {
    pub id: String,
    pub url_id: String,
}
