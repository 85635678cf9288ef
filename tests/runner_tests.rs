// End-to-end tests for the interview runner
//
// These tests drive a whole session in-process: synthetic camera, scripted
// avatar service, and a fake interview API. They verify the per-question
// flow, upload failure handling, resume after restart, and teardown.

use anyhow::Result;
use async_trait::async_trait;
use greenroom::avatar::{
    AvatarService, AvatarStatusResponse, GenerationRequest, GenerationStatus, ServiceError,
};
use greenroom::interview::{
    ApiError, CreatedInterview, Interview, InterviewApi, NewQuestion, Question,
};
use greenroom::media::RecordingArtifact;
use greenroom::progress::MemorySnapshotStore;
use greenroom::{
    AvatarSource, Config, InterviewRunner, MediaError, MediaProvider, SyntheticProvider,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Generation service that completes on the first poll.
struct InstantAvatarService;

#[async_trait]
impl AvatarService for InstantAvatarService {
    async fn invoke(&self, _request: &GenerationRequest) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn status(&self, question_id: &str) -> Result<AvatarStatusResponse, ServiceError> {
        Ok(AvatarStatusResponse {
            status: GenerationStatus::Completed,
            video_url: Some(format!("https://videos.test/{}.mp4", question_id)),
            error: None,
        })
    }
}

/// Interview API double that records uploads and can be told to fail them.
struct FakeApi {
    interview: Interview,
    uploads: Mutex<Vec<(String, String, usize)>>,
    fail_uploads: AtomicBool,
}

impl FakeApi {
    fn new(interview: Interview) -> Self {
        Self {
            interview,
            uploads: Mutex::new(Vec::new()),
            fail_uploads: AtomicBool::new(false),
        }
    }

    fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl InterviewApi for FakeApi {
    async fn create_interview(
        &self,
        _questions: &[NewQuestion],
    ) -> Result<CreatedInterview, ApiError> {
        Ok(CreatedInterview {
            id: self.interview.id.clone(),
            url_id: self.interview.url_id.clone(),
        })
    }

    async fn get_by_token(&self, token: &str) -> Result<Interview, ApiError> {
        if token == "bad-token" {
            return Err(ApiError::NotFound(token.to_string()));
        }
        Ok(self.interview.clone())
    }

    async fn upload_recording(
        &self,
        interview_id: &str,
        question_id: &str,
        artifact: &RecordingArtifact,
    ) -> Result<(), ApiError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(ApiError::Upload("storage offline".to_string()));
        }
        self.uploads.lock().unwrap().push((
            interview_id.to_string(),
            question_id.to_string(),
            artifact.data.len(),
        ));
        Ok(())
    }
}

fn question(id: &str, order: u32) -> Question {
    Question {
        id: id.to_string(),
        text: format!("Question {}", order),
        order_number: order,
        avatar_video_url: None,
        avatar_video_status: None,
        voice_id: None,
        voice_style: None,
    }
}

fn interview(question_count: usize) -> Interview {
    Interview {
        id: "iv-1".to_string(),
        url_id: "token-1".to_string(),
        status: "pending".to_string(),
        questions: (1..=question_count)
            .map(|i| question(&format!("q{}", i), i as u32))
            .collect(),
        responses: Vec::new(),
    }
}

fn fast_config() -> Config {
    let mut config = Config::default();
    config.recording.timeslice_ms = 10;
    config.recording.min_duration_secs = 0;
    config.avatar.poll_interval_ms = 5;
    config.avatar.retry_base_delay_ms = 1;
    config
}

async fn answer_current(runner: &mut InterviewRunner) -> Result<()> {
    runner.controller_mut().start_recording().await?;
    tokio::time::sleep(Duration::from_millis(40)).await;
    runner.controller_mut().stop_recording().await?;
    Ok(())
}

#[tokio::test]
async fn test_full_interview_flow() -> Result<()> {
    let api = Arc::new(FakeApi::new(interview(2)));
    let provider = Arc::new(SyntheticProvider::new().with_chunk_bytes(32));
    let store = Arc::new(MemorySnapshotStore::new());
    let mut runner = InterviewRunner::new(
        interview(2),
        Arc::clone(&api) as Arc<dyn InterviewApi>,
        provider,
        Arc::new(InstantAvatarService),
        store,
        &fast_config(),
    );

    // First question
    let ready = runner.prepare_current().await.expect("a question is current");
    assert_eq!(ready.question.id, "q1");
    let clip = ready.avatar.unwrap();
    assert_eq!(clip.source, AvatarSource::Generated);
    assert!(ready.camera.is_ok());

    answer_current(&mut runner).await?;
    runner.submit_answer().await?;
    assert!(runner.tracker().statuses()[0].completed);

    // Second question
    let next = runner.advance().expect("a second question follows");
    assert_eq!(next.id, "q2");
    let ready = runner.prepare_current().await.expect("a question is current");
    assert!(ready.avatar.is_ok());

    answer_current(&mut runner).await?;
    runner.submit_answer().await?;
    assert!(runner.advance().is_none(), "the interview ends after the last question");

    let summary = runner.summary();
    assert_eq!(summary.progress_percent, 100.0);
    assert_eq!(summary.questions.len(), 2);
    assert!(summary.questions.iter().all(|q| q.completed && q.has_recording));
    assert!(summary
        .questions
        .iter()
        .all(|q| q.avatar_source == Some(AvatarSource::Generated)));
    assert_eq!(api.upload_count(), 2);

    runner.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_failed_upload_leaves_progress_unchanged() -> Result<()> {
    let api = Arc::new(FakeApi::new(interview(2)));
    api.set_fail_uploads(true);
    let mut runner = InterviewRunner::new(
        interview(2),
        Arc::clone(&api) as Arc<dyn InterviewApi>,
        Arc::new(SyntheticProvider::new().with_chunk_bytes(32)),
        Arc::new(InstantAvatarService),
        Arc::new(MemorySnapshotStore::new()),
        &fast_config(),
    );

    runner.prepare_current().await;
    answer_current(&mut runner).await?;

    let err = runner.submit_answer().await.unwrap_err();
    assert!(matches!(err, ApiError::Upload(_)));
    assert!(
        !runner.tracker().statuses()[0].completed,
        "a failed upload must not advance progress"
    );
    assert_eq!(runner.tracker().current_index(), 0);

    // The artifact survives, so the retry needs no re-recording
    api.set_fail_uploads(false);
    runner.submit_answer().await?;
    assert!(runner.tracker().statuses()[0].completed);
    assert_eq!(api.upload_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_submit_without_a_recording_is_rejected() -> Result<()> {
    let api = Arc::new(FakeApi::new(interview(1)));
    let mut runner = InterviewRunner::new(
        interview(1),
        Arc::clone(&api) as Arc<dyn InterviewApi>,
        Arc::new(SyntheticProvider::new()),
        Arc::new(InstantAvatarService),
        Arc::new(MemorySnapshotStore::new()),
        &fast_config(),
    );

    runner.prepare_current().await;
    let err = runner.submit_answer().await.unwrap_err();
    assert!(matches!(err, ApiError::Upload(_)));
    assert_eq!(api.upload_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_camera_failure_does_not_block_the_avatar() -> Result<()> {
    let api = Arc::new(FakeApi::new(interview(1)));
    let mut runner = InterviewRunner::new(
        interview(1),
        Arc::clone(&api) as Arc<dyn InterviewApi>,
        Arc::new(SyntheticProvider::with_devices(vec![])),
        Arc::new(InstantAvatarService),
        Arc::new(MemorySnapshotStore::new()),
        &fast_config(),
    );

    let ready = runner.prepare_current().await.expect("a question is current");
    assert!(matches!(ready.camera, Err(MediaError::NoDeviceAvailable)));
    assert!(
        ready.avatar.is_ok(),
        "the presenter clip resolves even when the camera fails"
    );
    Ok(())
}

#[tokio::test]
async fn test_connect_sorts_questions_by_order() -> Result<()> {
    let mut shuffled = interview(0);
    shuffled.questions = vec![question("q-second", 2), question("q-first", 1)];
    let api = Arc::new(FakeApi::new(shuffled));

    let runner = InterviewRunner::connect(
        Arc::clone(&api) as Arc<dyn InterviewApi>,
        "token-1",
        Arc::new(SyntheticProvider::new()),
        Arc::new(InstantAvatarService),
        Arc::new(MemorySnapshotStore::new()),
        &fast_config(),
    )
    .await?;

    assert_eq!(runner.current_question().expect("questions exist").id, "q-first");
    assert_eq!(runner.interview().questions[1].id, "q-second");
    Ok(())
}

#[tokio::test]
async fn test_connect_with_unknown_token_fails() -> Result<()> {
    let api = Arc::new(FakeApi::new(interview(1)));
    let result = InterviewRunner::connect(
        Arc::clone(&api) as Arc<dyn InterviewApi>,
        "bad-token",
        Arc::new(SyntheticProvider::new()),
        Arc::new(InstantAvatarService),
        Arc::new(MemorySnapshotStore::new()),
        &fast_config(),
    )
    .await;
    assert!(matches!(result, Err(ApiError::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_interview_without_questions_is_handled() -> Result<()> {
    let api = Arc::new(FakeApi::new(interview(0)));
    let mut runner = InterviewRunner::new(
        interview(0),
        Arc::clone(&api) as Arc<dyn InterviewApi>,
        Arc::new(SyntheticProvider::new()),
        Arc::new(InstantAvatarService),
        Arc::new(MemorySnapshotStore::new()),
        &fast_config(),
    );

    assert!(runner.current_question().is_none());
    assert!(runner.prepare_current().await.is_none(), "nothing to prepare");
    assert!(runner.advance().is_none());
    assert!(runner.go_back().is_none());

    let err = runner.submit_answer().await.unwrap_err();
    assert!(matches!(err, ApiError::Upload(_)));
    assert_eq!(api.upload_count(), 0);

    let summary = runner.summary();
    assert!(summary.questions.is_empty());
    assert_eq!(summary.progress_percent, 0.0);

    runner.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_restart_resumes_from_persisted_progress() -> Result<()> {
    let store = Arc::new(MemorySnapshotStore::new());
    let api = Arc::new(FakeApi::new(interview(3)));

    {
        let mut runner = InterviewRunner::new(
            interview(3),
            Arc::clone(&api) as Arc<dyn InterviewApi>,
            Arc::new(SyntheticProvider::new().with_chunk_bytes(32)),
            Arc::new(InstantAvatarService),
            Arc::clone(&store) as Arc<dyn greenroom::progress::SnapshotStore>,
            &fast_config(),
        );
        runner.prepare_current().await;
        answer_current(&mut runner).await?;
        runner.submit_answer().await?;
        runner.advance();
        runner.shutdown().await;
    }

    // Simulated reload: a brand new runner over the same store
    let runner = InterviewRunner::new(
        interview(3),
        Arc::clone(&api) as Arc<dyn InterviewApi>,
        Arc::new(SyntheticProvider::new()),
        Arc::new(InstantAvatarService),
        Arc::clone(&store) as Arc<dyn greenroom::progress::SnapshotStore>,
        &fast_config(),
    );
    let current = runner.current_question().expect("questions exist");
    assert_eq!(current.id, "q2", "the session resumes mid-interview");
    assert!(runner.tracker().statuses()[0].completed);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_leaves_no_live_handles() -> Result<()> {
    let provider = Arc::new(SyntheticProvider::new().with_chunk_bytes(16));
    let api = Arc::new(FakeApi::new(interview(1)));
    let mut runner = InterviewRunner::new(
        interview(1),
        Arc::clone(&api) as Arc<dyn InterviewApi>,
        Arc::clone(&provider) as Arc<dyn MediaProvider>,
        Arc::new(InstantAvatarService),
        Arc::new(MemorySnapshotStore::new()),
        &fast_config(),
    );

    runner.prepare_current().await;
    runner.controller_mut().start_recording().await?;
    tokio::time::sleep(Duration::from_millis(30)).await;

    runner.shutdown().await;
    assert_eq!(runner.controller().live_task_count(), 0);
    assert_eq!(runner.pipeline().live_poll_tasks(), 0);
    assert_eq!(provider.live_stream_count(), 0, "teardown turns the camera off");
    Ok(())
}

#[tokio::test]
async fn test_record_again_discards_the_previous_take() -> Result<()> {
    let api = Arc::new(FakeApi::new(interview(1)));
    let mut runner = InterviewRunner::new(
        interview(1),
        Arc::clone(&api) as Arc<dyn InterviewApi>,
        Arc::new(SyntheticProvider::new().with_chunk_bytes(32)),
        Arc::new(InstantAvatarService),
        Arc::new(MemorySnapshotStore::new()),
        &fast_config(),
    );

    runner.prepare_current().await;
    answer_current(&mut runner).await?;
    let first = runner.controller().artifact().expect("first take");

    runner.record_again();
    assert!(runner.controller().artifact().is_none());

    answer_current(&mut runner).await?;
    let second = runner.controller().artifact().expect("second take");
    assert_ne!(first.id, second.id);
    Ok(())
}
