// Persisted progress snapshot. The wire shape is camelCase JSON so snapshots
// written by earlier clients keep loading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STORAGE_KEY_PREFIX: &str = "interview_progress_";

/// Storage key for one interview's snapshot.
pub fn storage_key(interview_id: &str) -> String {
    format!("{}{}", STORAGE_KEY_PREFIX, interview_id)
}

/// Per-question completion record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStatus {
    pub id: String,
    pub completed: bool,
    pub has_recording: bool,
}

impl QuestionStatus {
    pub fn fresh(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            completed: false,
            has_recording: false,
        }
    }
}

/// Everything needed to restore a session after reload: the position and the
/// per-question statuses, stamped with the time of the last mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub current_question_index: usize,
    pub question_statuses: Vec<QuestionStatus>,
    pub last_updated: DateTime<Utc>,
}
