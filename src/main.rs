use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

use greenroom::avatar::{
    AvatarService, AvatarStatusResponse, GenerationRequest, GenerationStatus, ServiceError,
};
use greenroom::interview::{
    ApiError, CreatedInterview, Interview, InterviewApi, NewQuestion, Question,
};
use greenroom::media::RecordingArtifact;
use greenroom::progress::{ensure_store_dir, FileSnapshotStore};
use greenroom::{Config, InterviewRunner, SyntheticProvider};

#[derive(Parser)]
#[command(name = "greenroom", version, about = "Unattended video interview client")]
struct Cli {
    /// Config file stem, e.g. config/greenroom. Defaults apply when omitted.
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scripted interview session against the synthetic provider.
    Demo {
        /// Number of questions in the generated interview.
        #[arg(long, default_value_t = 3)]
        questions: usize,

        /// Seconds to record per answer.
        #[arg(long, default_value_t = 3)]
        answer_secs: u64,

        /// Discard persisted progress before starting.
        #[arg(long)]
        fresh: bool,
    },
    /// Show which fallback clip a question id maps to.
    Fallback { question_id: String },
    /// Load the configuration and print the effective settings.
    ConfigCheck,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Demo {
            questions,
            answer_secs,
            fresh,
        } => run_demo(cfg, questions, answer_secs, fresh).await,
        Command::Fallback { question_id } => {
            let catalog = cfg.avatar.catalog();
            match catalog.select(&question_id) {
                Some(url) => info!("question {} falls back to {}", question_id, url),
                None => warn!("no fallback configured for question {}", question_id),
            }
            Ok(())
        }
        Command::ConfigCheck => {
            info!("api base url: {}", cfg.api.base_url);
            info!(
                "recording: max {}s, min {}s, {}ms timeslice, {}",
                cfg.recording.max_duration_secs,
                cfg.recording.min_duration_secs,
                cfg.recording.timeslice_ms,
                cfg.recording.media_type
            );
            info!(
                "avatar: poll every {}ms (max {} attempts), {} retries from {}ms",
                cfg.avatar.poll_interval_ms,
                cfg.avatar.max_poll_attempts,
                cfg.avatar.retry_max_attempts,
                cfg.avatar.retry_base_delay_ms
            );
            info!("fallback clips: {}", cfg.avatar.fallback_videos.len());
            info!("progress dir: {}", cfg.storage.progress_dir);
            Ok(())
        }
    }
}

async fn run_demo(mut cfg: Config, questions: usize, answer_secs: u64, fresh: bool) -> Result<()> {
    // Demo pacing: shrink the durations that exist for real interviews.
    cfg.recording.min_duration_secs = 1;
    cfg.avatar.poll_interval_ms = 500;
    cfg.avatar.retry_base_delay_ms = 200;

    ensure_store_dir(Path::new(&cfg.storage.progress_dir))
        .context("progress directory is not writable")?;

    let interview = sample_interview(questions);
    let api: Arc<dyn InterviewApi> = Arc::new(LocalInterviewApi::new(interview.clone()));
    let provider = Arc::new(SyntheticProvider::new());
    // Every third generation request is rejected so the fallback path shows.
    let service = Arc::new(DemoAvatarService::new(2, Some(3)));
    let store = Arc::new(FileSnapshotStore::new(&cfg.storage.progress_dir));

    let mut runner = InterviewRunner::new(interview, api, provider, service, store, &cfg);
    if fresh {
        runner.tracker_mut().clear();
    }
    if runner.tracker().completed_count() > 0 {
        info!(
            "resuming interview: {} of {} questions already answered",
            runner.tracker().completed_count(),
            runner.tracker().total()
        );
    }

    loop {
        let number = runner.tracker().current_index() + 1;
        let total = runner.tracker().total();
        let Some(ready) = runner.prepare_current().await else {
            warn!("interview has no questions to ask");
            break;
        };
        info!("question {} of {}: {}", number, total, ready.question.text);

        match &ready.avatar {
            Ok(clip) => info!("presenter clip ({:?}): {}", clip.source, clip.url),
            Err(e) => warn!("presenter unavailable: {}", e),
        }
        if let Err(e) = ready.camera {
            warn!("camera error: {}; retrying once", e);
            runner.retry_camera().await.context("camera unavailable")?;
        }

        runner.controller_mut().start_recording().await?;
        tokio::time::sleep(Duration::from_secs(answer_secs)).await;
        if let Some(artifact) = runner.controller_mut().stop_recording().await? {
            info!(
                "recorded {} bytes over {}ms",
                artifact.data.len(),
                artifact.duration_ms
            );
        }

        runner.submit_answer().await?;
        if runner.advance().is_none() {
            break;
        }
    }

    let summary = runner.summary();
    info!(
        "interview {} finished at {:.0}%",
        summary.interview_id, summary.progress_percent
    );
    for question in &summary.questions {
        info!(
            "  {}: completed={} avatar={:?}",
            question.question_id, question.completed, question.avatar_source
        );
    }

    runner.shutdown().await;
    // The run is complete; the next demo starts over.
    runner.tracker_mut().clear();
    Ok(())
}

fn sample_interview(count: usize) -> Interview {
    let texts = [
        "Tell us about yourself.",
        "Describe a challenging project and how you approached it.",
        "Why are you interested in this role?",
        "Where do you want to grow over the next few years?",
        "What questions do you have for us?",
    ];
    let questions = (0..count)
        .map(|i| Question {
            id: format!("demo-q{}", i + 1),
            text: texts[i % texts.len()].to_string(),
            order_number: (i + 1) as u32,
            avatar_video_url: None,
            avatar_video_status: None,
            voice_id: None,
            voice_style: None,
        })
        .collect();
    Interview {
        id: "demo-interview".to_string(),
        url_id: "demo".to_string(),
        status: "pending".to_string(),
        questions,
        responses: Vec::new(),
    }
}

/// Generation service that completes after a fixed number of polls, with an
/// optional simulated outage every nth invocation.
struct DemoAvatarService {
    completes_after: u32,
    fail_every: Option<usize>,
    invocations: AtomicUsize,
    polls: Mutex<HashMap<String, u32>>,
}

impl DemoAvatarService {
    fn new(completes_after: u32, fail_every: Option<usize>) -> Self {
        Self {
            completes_after,
            fail_every,
            invocations: AtomicUsize::new(0),
            polls: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl AvatarService for DemoAvatarService {
    async fn invoke(&self, request: &GenerationRequest) -> Result<(), ServiceError> {
        let n = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(every) = self.fail_every {
            if n % every == 0 {
                return Err(ServiceError::Rejected(format!(
                    "simulated outage on invocation {}",
                    n
                )));
            }
        }
        info!("demo service generating clip for question {}", request.question_id);
        Ok(())
    }

    async fn status(&self, question_id: &str) -> Result<AvatarStatusResponse, ServiceError> {
        let mut polls = self.polls.lock().unwrap();
        let seen = polls.entry(question_id.to_string()).or_insert(0);
        *seen += 1;
        if *seen >= self.completes_after {
            Ok(AvatarStatusResponse {
                status: GenerationStatus::Completed,
                video_url: Some(format!("https://videos.example/generated/{}.mp4", question_id)),
                error: None,
            })
        } else {
            Ok(AvatarStatusResponse {
                status: GenerationStatus::Processing,
                video_url: None,
                error: None,
            })
        }
    }
}

/// Interview API that answers from memory and accepts uploads without a
/// backend, so the demo runs offline.
struct LocalInterviewApi {
    interview: Interview,
}

impl LocalInterviewApi {
    fn new(interview: Interview) -> Self {
        Self { interview }
    }
}

#[async_trait]
impl InterviewApi for LocalInterviewApi {
    async fn create_interview(
        &self,
        questions: &[NewQuestion],
    ) -> Result<CreatedInterview, ApiError> {
        info!("demo api: created interview with {} questions", questions.len());
        Ok(CreatedInterview {
            id: self.interview.id.clone(),
            url_id: self.interview.url_id.clone(),
        })
    }

    async fn get_by_token(&self, _token: &str) -> Result<Interview, ApiError> {
        Ok(self.interview.clone())
    }

    async fn upload_recording(
        &self,
        _interview_id: &str,
        question_id: &str,
        artifact: &RecordingArtifact,
    ) -> Result<(), ApiError> {
        info!(
            "demo api: accepted {} bytes for question {}",
            artifact.data.len(),
            question_id
        );
        Ok(())
    }
}
