// Interview runner: drives one candidate session. Owns the capture
// controller, the avatar pipeline, and the progress tracker, and sequences
// them per question: presenter clip and camera are prepared concurrently,
// the answer is recorded and uploaded, and only a confirmed upload advances
// progress.

use std::sync::Arc;
use tracing::{error, info, warn};

use super::client::{ApiError, InterviewApi};
use super::types::{Interview, Question};
use crate::avatar::{AvatarError, AvatarPipeline, AvatarService, AvatarSource, ResolvedAvatar};
use crate::config::Config;
use crate::media::{CaptureController, MediaError, MediaProvider};
use crate::progress::{ProgressTracker, SnapshotStore};

/// Everything the presentation layer needs to show one question.
#[derive(Debug)]
pub struct QuestionReady {
    pub question: Question,
    pub avatar: Result<ResolvedAvatar, AvatarError>,
    pub camera: Result<(), MediaError>,
}

/// Final per-question outcome for the completion screen.
#[derive(Debug, Clone)]
pub struct QuestionOutcome {
    pub question_id: String,
    pub text: String,
    pub completed: bool,
    pub has_recording: bool,
    pub avatar_source: Option<AvatarSource>,
}

#[derive(Debug, Clone)]
pub struct InterviewSummary {
    pub interview_id: String,
    pub questions: Vec<QuestionOutcome>,
    pub progress_percent: f32,
}

pub struct InterviewRunner {
    interview: Interview,
    api: Arc<dyn InterviewApi>,
    pipeline: AvatarPipeline,
    controller: CaptureController,
    tracker: ProgressTracker,
}

impl InterviewRunner {
    pub fn new(
        mut interview: Interview,
        api: Arc<dyn InterviewApi>,
        provider: Arc<dyn MediaProvider>,
        service: Arc<dyn AvatarService>,
        store: Arc<dyn SnapshotStore>,
        config: &Config,
    ) -> Self {
        interview.sort_questions();
        let question_ids: Vec<String> = interview.questions.iter().map(|q| q.id.clone()).collect();
        let tracker = ProgressTracker::load_or_new(store, &interview.id, &question_ids);
        let pipeline = AvatarPipeline::new(service, config.avatar.catalog(), config.avatar.pipeline_config());
        let controller = CaptureController::new(
            provider,
            config.recording.recorder_config(),
            config.recording.constraints.clone(),
        );
        Self {
            interview,
            api,
            pipeline,
            controller,
            tracker,
        }
    }

    /// Fetch the interview by access token and build a runner for it.
    pub async fn connect(
        api: Arc<dyn InterviewApi>,
        token: &str,
        provider: Arc<dyn MediaProvider>,
        service: Arc<dyn AvatarService>,
        store: Arc<dyn SnapshotStore>,
        config: &Config,
    ) -> Result<Self, ApiError> {
        let interview = api.get_by_token(token).await?;
        Ok(Self::new(interview, api, provider, service, store, config))
    }

    pub fn interview(&self) -> &Interview {
        &self.interview
    }

    /// The question the session is positioned on. `None` for an interview
    /// that has no questions at all; the caller shows an empty state instead
    /// of the question flow.
    pub fn current_question(&self) -> Option<&Question> {
        self.interview.questions.get(self.tracker.current_index())
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ProgressTracker {
        &mut self.tracker
    }

    pub fn controller(&self) -> &CaptureController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut CaptureController {
        &mut self.controller
    }

    pub fn pipeline(&self) -> &AvatarPipeline {
        &self.pipeline
    }

    /// Prepare the current question: resolve its presenter clip and arm the
    /// camera, concurrently. Neither failure aborts the other; both results
    /// are reported so the caller can retry the camera or surface the avatar
    /// problem independently. `None` when the interview has no questions.
    pub async fn prepare_current(&mut self) -> Option<QuestionReady> {
        let question = self.current_question()?.clone();
        let avatar_fut = self
            .pipeline
            .resolve(question.generation_request(), question.known_avatar_url());
        let camera_fut = self.controller.initialize(None);
        let (avatar, camera) = futures::future::join(avatar_fut, camera_fut).await;

        if let Err(e) = &camera {
            error!("camera unavailable for question {}: {}", question.id, e);
        }
        if let Err(e) = &avatar {
            error!("no presenter clip for question {}: {}", question.id, e);
        }
        Some(QuestionReady {
            question,
            avatar,
            camera,
        })
    }

    /// Re-attempt camera acquisition after a capture failure.
    pub async fn retry_camera(&mut self) -> Result<(), MediaError> {
        self.controller.initialize(None).await
    }

    /// Upload the finished recording for the current question and mark it
    /// completed. A failed upload leaves progress untouched so the answer
    /// can be retried.
    pub async fn submit_answer(&mut self) -> Result<(), ApiError> {
        let question_id = self
            .current_question()
            .ok_or_else(|| ApiError::Upload("no question to answer".to_string()))?
            .id
            .clone();
        let artifact = self
            .controller
            .artifact()
            .ok_or_else(|| ApiError::Upload("no finished recording to upload".to_string()))?;
        if artifact.below_min {
            warn!(
                "recording for question {} is shorter than the configured minimum",
                question_id
            );
        }
        self.api
            .upload_recording(&self.interview.id, &question_id, &artifact)
            .await?;
        self.tracker.mark_current_completed(true);
        info!(
            "answer for question {} uploaded ({} bytes)",
            question_id,
            artifact.data.len()
        );
        Ok(())
    }

    /// Leave the current question and move to the next one. Polling for the
    /// departed question is cancelled and the recorder is readied for the
    /// next answer. `None` means the interview is finished.
    pub fn advance(&mut self) -> Option<&Question> {
        if let Some(question) = self.current_question() {
            self.pipeline.cancel(&question.id);
        }
        if self.tracker.go_next() {
            self.controller.reset();
            self.current_question()
        } else {
            info!("interview {} complete", self.interview.id);
            None
        }
    }

    /// Navigate back to the previous question.
    pub fn go_back(&mut self) -> Option<&Question> {
        if let Some(question) = self.current_question() {
            self.pipeline.cancel(&question.id);
        }
        if self.tracker.go_previous() {
            self.controller.reset();
            self.current_question()
        } else {
            None
        }
    }

    /// Discard the stopped take so the question can be answered again.
    pub fn record_again(&mut self) {
        self.controller.reset();
    }

    pub fn summary(&self) -> InterviewSummary {
        let questions = self
            .interview
            .questions
            .iter()
            .map(|q| {
                let status = self.tracker.status_of(&q.id);
                QuestionOutcome {
                    question_id: q.id.clone(),
                    text: q.text.clone(),
                    completed: status.map(|s| s.completed).unwrap_or(false),
                    has_recording: status.map(|s| s.has_recording).unwrap_or(false),
                    avatar_source: self.pipeline.resolved(&q.id).map(|r| r.source),
                }
            })
            .collect();
        InterviewSummary {
            interview_id: self.interview.id.clone(),
            questions,
            progress_percent: self.tracker.progress_percent(),
        }
    }

    /// Tear down the session: stop polling, stop any recording, and release
    /// the camera. Must run on every exit path.
    pub async fn shutdown(&mut self) {
        self.pipeline.shutdown();
        self.controller.shutdown().await;
        info!("interview session {} shut down", self.interview.id);
    }
}
