// Avatar acquisition pipeline. One request slot per question for the life of
// the session: the first resolve arms a background task that invokes
// generation and polls for completion; concurrent resolves for the same
// question await that task's outcome instead of invoking again. Generation
// failures of any kind are absorbed by deterministic fallback selection and
// only surface when the catalog itself has nothing to offer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::catalog::FallbackCatalog;
use super::retry::RetryPolicy;
use super::service::{AvatarService, GenerationRequest, GenerationStatus, ServiceError};

/// How a playable clip was obtained. Callers use this to badge fallback
/// playback differently from generated clips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarSource {
    Generated,
    Fallback,
}

/// A playable presenter clip for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAvatar {
    pub question_id: String,
    pub url: String,
    pub source: AvatarSource,
}

/// Why generation could not supply a clip. Absorbed by fallback selection;
/// carried in the error only when fallback is unavailable too.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationFailure {
    #[error("generation timed out after {attempts} status polls")]
    Timeout { attempts: u32 },

    #[error("generation failed: {0}")]
    Failed(String),

    #[error("service unreachable: {0}")]
    Transport(String),

    #[error("resolved clip failed to play")]
    Playback,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AvatarError {
    #[error("no fallback video available: {cause}")]
    FallbackUnavailable { cause: GenerationFailure },

    #[error("avatar resolution cancelled")]
    Cancelled,
}

/// Pipeline tuning; see [`crate::config::AvatarSettings`].
#[derive(Debug, Clone)]
pub struct AvatarConfig {
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub retry: RetryPolicy,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_poll_attempts: 30,
            retry: RetryPolicy::default(),
        }
    }
}

/// Observable per-question request record.
#[derive(Debug, Clone, Serialize)]
pub struct AvatarRequestState {
    pub question_id: String,
    pub status: GenerationStatus,
    pub video_url: Option<String>,
    pub error_message: Option<String>,
    pub poll_attempts: u32,
}

impl AvatarRequestState {
    fn new(question_id: &str) -> Self {
        Self {
            question_id: question_id.to_string(),
            status: GenerationStatus::Pending,
            video_url: None,
            error_message: None,
            poll_attempts: 0,
        }
    }
}

type Outcome = Option<Result<ResolvedAvatar, AvatarError>>;

struct Slot {
    state: Arc<Mutex<AvatarRequestState>>,
    outcome_rx: watch::Receiver<Outcome>,
    task: Option<JoinHandle<()>>,
}

impl Slot {
    /// A cancelled slot: its task is gone but it never produced an outcome.
    /// The next resolve re-arms it in place.
    fn needs_rearm(&self) -> bool {
        self.outcome_rx.borrow().is_none()
            && self.task.as_ref().map(|t| t.is_finished()).unwrap_or(true)
    }
}

pub struct AvatarPipeline {
    service: Arc<dyn AvatarService>,
    catalog: FallbackCatalog,
    config: AvatarConfig,
    slots: Mutex<HashMap<String, Slot>>,
}

impl AvatarPipeline {
    pub fn new(
        service: Arc<dyn AvatarService>,
        catalog: FallbackCatalog,
        config: AvatarConfig,
    ) -> Self {
        Self {
            service,
            catalog,
            config,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &FallbackCatalog {
        &self.catalog
    }

    /// Resolve a playable clip for a question.
    ///
    /// Resolution order: a known pre-generated URL wins without touching the
    /// service; otherwise generation is invoked and polled to completion;
    /// otherwise the fallback catalog decides. Calling this again for a
    /// question with a resolution in flight awaits that same resolution.
    pub async fn resolve(
        &self,
        request: GenerationRequest,
        known_url: Option<String>,
    ) -> Result<ResolvedAvatar, AvatarError> {
        let mut rx = self.slot_for(request, known_url);
        loop {
            {
                let current = rx.borrow_and_update();
                if let Some(result) = current.as_ref() {
                    return result.clone();
                }
            }
            if rx.changed().await.is_err() {
                return Err(AvatarError::Cancelled);
            }
        }
    }

    /// The resolved clip for a question, if resolution has finished.
    pub fn resolved(&self, question_id: &str) -> Option<ResolvedAvatar> {
        let slots = self.slots.lock().unwrap();
        let slot = slots.get(question_id)?;
        let outcome = slot.outcome_rx.borrow();
        match outcome.as_ref() {
            Some(Ok(resolved)) => Some(resolved.clone()),
            _ => None,
        }
    }

    /// Snapshot of a question's request record.
    pub fn request_state(&self, question_id: &str) -> Option<AvatarRequestState> {
        let slots = self.slots.lock().unwrap();
        slots
            .get(question_id)
            .map(|slot| slot.state.lock().unwrap().clone())
    }

    /// The clip resolved earlier failed at playback time. Abandon it for the
    /// deterministic fallback; the substitution is terminal for the session.
    pub fn report_playback_failure(
        &self,
        question_id: &str,
    ) -> Result<ResolvedAvatar, AvatarError> {
        warn!(
            "playback failed for question {}; switching to fallback",
            question_id
        );
        let mut slots = self.slots.lock().unwrap();
        let state = match slots.get_mut(question_id) {
            Some(slot) => {
                if let Some(task) = slot.task.take() {
                    task.abort();
                }
                Arc::clone(&slot.state)
            }
            None => Arc::new(Mutex::new(AvatarRequestState::new(question_id))),
        };

        let result = fall_back(&self.catalog, &state, question_id, GenerationFailure::Playback);
        let (_tx, rx) = watch::channel(Some(result.clone()));
        slots.insert(
            question_id.to_string(),
            Slot {
                state,
                outcome_rx: rx,
                task: None,
            },
        );
        result
    }

    /// Stop polling for a question without recording an outcome. A later
    /// resolve retries in place.
    pub fn cancel(&self, question_id: &str) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get_mut(question_id) {
            if let Some(task) = slot.task.take() {
                if !task.is_finished() {
                    info!("cancelling avatar resolution for question {}", question_id);
                    task.abort();
                }
            }
        }
    }

    /// Abort every in-flight resolution. Request records stay queryable.
    pub fn shutdown(&self) {
        let mut slots = self.slots.lock().unwrap();
        for (question_id, slot) in slots.iter_mut() {
            if let Some(task) = slot.task.take() {
                if !task.is_finished() {
                    debug!("aborting avatar resolution for question {}", question_id);
                    task.abort();
                }
            }
        }
        info!("avatar pipeline shut down");
    }

    /// Number of resolution tasks still running.
    pub fn live_poll_tasks(&self) -> usize {
        let slots = self.slots.lock().unwrap();
        slots
            .values()
            .filter(|slot| slot.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false))
            .count()
    }

    fn slot_for(
        &self,
        request: GenerationRequest,
        known_url: Option<String>,
    ) -> watch::Receiver<Outcome> {
        let mut slots = self.slots.lock().unwrap();
        if let Some(slot) = slots.get_mut(&request.question_id) {
            if !slot.needs_rearm() {
                return slot.outcome_rx.clone();
            }
            debug!(
                "re-arming cancelled avatar resolution for question {}",
                request.question_id
            );
            let question_id = request.question_id.clone();
            let (new_slot, rx) = self.arm(request, known_url, Some(Arc::clone(&slot.state)));
            slots.insert(question_id, new_slot);
            return rx;
        }
        let question_id = request.question_id.clone();
        let (slot, rx) = self.arm(request, known_url, None);
        slots.insert(question_id, slot);
        rx
    }

    fn arm(
        &self,
        request: GenerationRequest,
        known_url: Option<String>,
        existing: Option<Arc<Mutex<AvatarRequestState>>>,
    ) -> (Slot, watch::Receiver<Outcome>) {
        let state = existing
            .unwrap_or_else(|| Arc::new(Mutex::new(AvatarRequestState::new(&request.question_id))));
        {
            let mut s = state.lock().unwrap();
            s.status = GenerationStatus::Pending;
            s.poll_attempts = 0;
            s.error_message = None;
        }

        let (tx, rx) = watch::channel(None);
        let service = Arc::clone(&self.service);
        let catalog = self.catalog.clone();
        let config = self.config.clone();
        let task_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            let result = drive(service, catalog, config, task_state, request, known_url).await;
            let _ = tx.send(Some(result));
        });

        (
            Slot {
                state,
                outcome_rx: rx.clone(),
                task: Some(task),
            },
            rx,
        )
    }
}

impl Drop for AvatarPipeline {
    fn drop(&mut self) {
        // Teardown normally goes through shutdown(); this catches the rest so
        // no poll timer outlives the pipeline.
        if let Ok(mut slots) = self.slots.lock() {
            for slot in slots.values_mut() {
                if let Some(task) = slot.task.take() {
                    task.abort();
                }
            }
        }
    }
}

/// One resolution attempt, run on its own task.
async fn drive(
    service: Arc<dyn AvatarService>,
    catalog: FallbackCatalog,
    config: AvatarConfig,
    state: Arc<Mutex<AvatarRequestState>>,
    request: GenerationRequest,
    known_url: Option<String>,
) -> Result<ResolvedAvatar, AvatarError> {
    let question_id = request.question_id.clone();

    if let Some(url) = known_url {
        info!(
            "question {} already has a generated clip; skipping invocation",
            question_id
        );
        {
            let mut s = state.lock().unwrap();
            s.status = GenerationStatus::Completed;
            s.video_url = Some(url.clone());
        }
        return Ok(ResolvedAvatar {
            question_id,
            url,
            source: AvatarSource::Generated,
        });
    }

    info!("invoking avatar generation for question {}", question_id);
    if let Err(e) = config
        .retry
        .run("avatar generation invoke", || service.invoke(&request))
        .await
    {
        return fall_back(&catalog, &state, &question_id, failure_from(e));
    }
    state.lock().unwrap().status = GenerationStatus::Processing;

    let mut ticker = tokio::time::interval(config.poll_interval);
    // First tick completes immediately; the first poll should wait a full
    // interval, matching the service's processing ramp-up.
    ticker.tick().await;

    let mut attempts: u32 = 0;
    loop {
        if attempts >= config.max_poll_attempts {
            return fall_back(
                &catalog,
                &state,
                &question_id,
                GenerationFailure::Timeout { attempts },
            );
        }
        ticker.tick().await;
        attempts += 1;
        state.lock().unwrap().poll_attempts = attempts;

        let response = match config
            .retry
            .run("avatar status poll", || service.status(&question_id))
            .await
        {
            Ok(response) => response,
            Err(e) => return fall_back(&catalog, &state, &question_id, failure_from(e)),
        };

        match response.status {
            GenerationStatus::Completed => match response.video_url {
                Some(url) => {
                    info!(
                        "avatar ready for question {} after {} polls",
                        question_id, attempts
                    );
                    {
                        let mut s = state.lock().unwrap();
                        s.status = GenerationStatus::Completed;
                        s.video_url = Some(url.clone());
                    }
                    return Ok(ResolvedAvatar {
                        question_id,
                        url,
                        source: AvatarSource::Generated,
                    });
                }
                None => {
                    return fall_back(
                        &catalog,
                        &state,
                        &question_id,
                        GenerationFailure::Failed("completed without a video url".to_string()),
                    );
                }
            },
            GenerationStatus::Error => {
                let message = response
                    .error
                    .unwrap_or_else(|| "generation failed".to_string());
                return fall_back(
                    &catalog,
                    &state,
                    &question_id,
                    GenerationFailure::Failed(message),
                );
            }
            GenerationStatus::Pending | GenerationStatus::Processing => {
                debug!(
                    "question {} still generating (poll {} of {})",
                    question_id, attempts, config.max_poll_attempts
                );
            }
        }
    }
}

fn failure_from(error: ServiceError) -> GenerationFailure {
    match error {
        ServiceError::Transport(message) => GenerationFailure::Transport(message),
        ServiceError::Rejected(message) => GenerationFailure::Failed(message),
    }
}

fn fall_back(
    catalog: &FallbackCatalog,
    state: &Arc<Mutex<AvatarRequestState>>,
    question_id: &str,
    cause: GenerationFailure,
) -> Result<ResolvedAvatar, AvatarError> {
    warn!(
        "avatar generation unavailable for question {} ({}); selecting fallback",
        question_id, cause
    );
    {
        let mut s = state.lock().unwrap();
        s.status = GenerationStatus::Error;
        s.error_message = Some(cause.to_string());
    }
    match catalog.select(question_id) {
        Some(url) => {
            info!("fallback clip for question {}: {}", question_id, url);
            state.lock().unwrap().video_url = Some(url.to_string());
            Ok(ResolvedAvatar {
                question_id: question_id.to_string(),
                url: url.to_string(),
                source: AvatarSource::Fallback,
            })
        }
        None => Err(AvatarError::FallbackUnavailable { cause }),
    }
}
