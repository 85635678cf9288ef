// Session progress tracker. In-memory position and per-question statuses,
// persisted through a SnapshotStore on every mutation so a reload can resume
// mid-interview. Storage failures degrade to fresh state; they never block
// the interview.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use super::snapshot::{storage_key, ProgressSnapshot, QuestionStatus};
use super::store::SnapshotStore;

pub struct ProgressTracker {
    interview_id: String,
    key: String,
    store: Arc<dyn SnapshotStore>,
    question_ids: Vec<String>,
    statuses: Vec<QuestionStatus>,
    current: usize,
}

impl ProgressTracker {
    /// Restore persisted progress for an interview, or start fresh.
    ///
    /// A stored snapshot is accepted only when its question count matches the
    /// interview's current question list and its index is in bounds; anything
    /// else is discarded as stale. A corrupt or unreadable snapshot is
    /// likewise discarded, never propagated.
    pub fn load_or_new(
        store: Arc<dyn SnapshotStore>,
        interview_id: &str,
        question_ids: &[String],
    ) -> Self {
        let key = storage_key(interview_id);
        let restored = match store.load(&key) {
            Ok(Some(snapshot)) => {
                if snapshot.question_statuses.len() != question_ids.len() {
                    warn!(
                        "discarding stale progress for interview {}: {} stored questions, {} current",
                        interview_id,
                        snapshot.question_statuses.len(),
                        question_ids.len()
                    );
                    None
                } else if snapshot.current_question_index >= question_ids.len() {
                    warn!(
                        "discarding stale progress for interview {}: index {} out of bounds",
                        interview_id, snapshot.current_question_index
                    );
                    None
                } else {
                    info!(
                        "restored progress for interview {}: question {} of {}",
                        interview_id,
                        snapshot.current_question_index + 1,
                        question_ids.len()
                    );
                    Some(snapshot)
                }
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    "could not load progress for interview {}: {}; starting fresh",
                    interview_id, e
                );
                None
            }
        };

        let (statuses, current) = match restored {
            Some(snapshot) => (snapshot.question_statuses, snapshot.current_question_index),
            None => (
                question_ids
                    .iter()
                    .map(|id| QuestionStatus::fresh(id.clone()))
                    .collect(),
                0,
            ),
        };

        Self {
            interview_id: interview_id.to_string(),
            key,
            store,
            question_ids: question_ids.to_vec(),
            statuses,
            current,
        }
    }

    pub fn interview_id(&self) -> &str {
        &self.interview_id
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn total(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_first(&self) -> bool {
        self.current == 0
    }

    pub fn is_last(&self) -> bool {
        self.total() > 0 && self.current == self.total() - 1
    }

    pub fn statuses(&self) -> &[QuestionStatus] {
        &self.statuses
    }

    pub fn status_of(&self, question_id: &str) -> Option<&QuestionStatus> {
        self.statuses.iter().find(|s| s.id == question_id)
    }

    pub fn completed_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.completed).count()
    }

    /// Completion percentage in `[0, 100]`.
    pub fn progress_percent(&self) -> f32 {
        if self.statuses.is_empty() {
            return 0.0;
        }
        (self.completed_count() as f32 / self.total() as f32) * 100.0
    }

    /// Mark the current question answered.
    pub fn mark_current_completed(&mut self, has_recording: bool) {
        if let Some(status) = self.statuses.get_mut(self.current) {
            status.completed = true;
            status.has_recording = has_recording;
            self.persist();
        }
    }

    /// Move to the next question. Returns false at the end.
    pub fn go_next(&mut self) -> bool {
        if self.current + 1 < self.total() {
            self.current += 1;
            self.persist();
            true
        } else {
            false
        }
    }

    /// Move to the previous question. Returns false at the start.
    pub fn go_previous(&mut self) -> bool {
        if self.current > 0 {
            self.current -= 1;
            self.persist();
            true
        } else {
            false
        }
    }

    /// Jump to a question by index. Returns false when out of bounds.
    pub fn go_to(&mut self, index: usize) -> bool {
        if index < self.total() {
            self.current = index;
            self.persist();
            true
        } else {
            false
        }
    }

    /// Erase the persisted snapshot and reset in-memory state. Nothing is
    /// re-persisted until the next mutation.
    pub fn clear(&mut self) {
        if let Err(e) = self.store.remove(&self.key) {
            warn!(
                "could not clear progress for interview {}: {}",
                self.interview_id, e
            );
        }
        self.statuses = self
            .question_ids
            .iter()
            .map(|id| QuestionStatus::fresh(id.clone()))
            .collect();
        self.current = 0;
        info!("progress cleared for interview {}", self.interview_id);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            current_question_index: self.current,
            question_statuses: self.statuses.clone(),
            last_updated: Utc::now(),
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.key, &self.snapshot()) {
            warn!(
                "could not persist progress for interview {}: {}",
                self.interview_id, e
            );
        }
    }
}
