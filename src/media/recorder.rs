// Clip recorder: consumes encoded fragments from a capture stream and
// assembles them into a single playable artifact. Recording ends when the
// caller signals stop, the max-duration deadline passes, or the fragment
// source closes; whichever fires first, finalization happens exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::provider::MediaChunk;

/// Lifecycle of a recording attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    Idle,
    Recording,
    Stopped,
}

impl Default for RecorderState {
    fn default() -> Self {
        RecorderState::Idle
    }
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderState::Idle => write!(f, "idle"),
            RecorderState::Recording => write!(f, "recording"),
            RecorderState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Why a recording ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The caller asked for the stop.
    Requested,
    /// The max-duration deadline fired.
    DeadlineElapsed,
    /// The capture stream stopped delivering fragments.
    SourceEnded,
}

/// Recorder tuning. Durations come from configuration; see
/// [`crate::config::RecordingSettings`].
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub max_duration: Duration,
    /// Advisory lower bound; shorter artifacts are flagged, not rejected.
    pub min_duration: Duration,
    pub timeslice: Duration,
    pub media_type: String,
    pub video_bits_per_second: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(300),
            min_duration: Duration::from_secs(5),
            timeslice: Duration::from_secs(1),
            media_type: "video/webm;codecs=vp8,opus".to_string(),
            video_bits_per_second: 1_000_000,
        }
    }
}

/// Finished recording, assembled from buffered fragments in arrival order.
#[derive(Debug, Clone)]
pub struct RecordingArtifact {
    pub id: String,
    pub media_type: String,
    pub data: Vec<u8>,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
    /// Set when the clip came in under the configured minimum duration.
    pub below_min: bool,
}

/// Buffers fragments for one recording attempt.
pub struct ClipRecorder {
    config: RecorderConfig,
    chunks: Vec<MediaChunk>,
}

impl ClipRecorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            chunks: Vec::new(),
        }
    }

    /// Consume fragments until stopped, then assemble the artifact.
    ///
    /// `stop` is the controller's stop signal. The deadline is armed here so
    /// that it lives and dies with the recording task.
    pub async fn record(
        mut self,
        mut fragments: mpsc::Receiver<MediaChunk>,
        mut stop: watch::Receiver<bool>,
    ) -> (RecordingArtifact, StopReason) {
        let started = Instant::now();
        let deadline = started + self.config.max_duration;
        info!(
            "recording started (max {}s, {}ms timeslice)",
            self.config.max_duration.as_secs(),
            self.config.timeslice.as_millis()
        );

        let reason = loop {
            tokio::select! {
                maybe_chunk = fragments.recv() => match maybe_chunk {
                    Some(chunk) if chunk.data.is_empty() => {
                        debug!("discarding empty fragment at {}ms", chunk.timestamp_ms);
                    }
                    Some(chunk) => {
                        debug!(
                            "buffered fragment {} ({} bytes at {}ms)",
                            self.chunks.len(),
                            chunk.data.len(),
                            chunk.timestamp_ms
                        );
                        self.chunks.push(chunk);
                    }
                    None => {
                        info!("fragment source closed; finalizing recording");
                        break StopReason::SourceEnded;
                    }
                },
                _ = tokio::time::sleep_until(deadline) => {
                    info!(
                        "max recording duration of {}s reached; stopping automatically",
                        self.config.max_duration.as_secs()
                    );
                    break StopReason::DeadlineElapsed;
                }
                changed = stop.changed() => {
                    match changed {
                        Ok(()) if *stop.borrow() => break StopReason::Requested,
                        Ok(()) => {}
                        // Controller dropped the sender; treat as a stop.
                        Err(_) => break StopReason::Requested,
                    }
                }
            }
        };

        (self.finish(started.elapsed()), reason)
    }

    fn finish(self, elapsed: Duration) -> RecordingArtifact {
        let total_bytes: usize = self.chunks.iter().map(|c| c.data.len()).sum();
        let mut data = Vec::with_capacity(total_bytes);
        for chunk in &self.chunks {
            data.extend_from_slice(&chunk.data);
        }

        let below_min = elapsed < self.config.min_duration;
        let artifact = RecordingArtifact {
            id: format!("artifact-{}", Uuid::new_v4()),
            media_type: self.config.media_type.clone(),
            data,
            duration_ms: elapsed.as_millis() as u64,
            created_at: Utc::now(),
            below_min,
        };
        info!(
            "assembled artifact {}: {} fragments, {} bytes, {}ms",
            artifact.id,
            self.chunks.len(),
            artifact.data.len(),
            artifact.duration_ms
        );
        if below_min {
            info!(
                "clip is shorter than the {}s minimum",
                self.config.min_duration.as_secs()
            );
        }
        artifact
    }
}
