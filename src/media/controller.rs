// Capture controller: owns device selection, the single active capture
// stream, and the recording lifecycle. One controller per interview client;
// the active stream holds its device exclusively until released.

use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::provider::{
    CaptureConstraints, CaptureStream, DeviceDescriptor, DeviceKind, MediaError, MediaProvider,
};
use super::recorder::{ClipRecorder, RecorderConfig, RecorderState, RecordingArtifact, StopReason};

const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Observable lifecycle transitions, published on a single broadcast channel.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    CameraReady { device_id: String },
    RecordingStarted,
    RecordingStopped { reason: StopReason, artifact_id: String },
    RecordingReset,
}

// State shared with the recording task. Plain mutex; never held across await.
#[derive(Default)]
struct RecorderShared {
    state: RecorderState,
    artifact: Option<RecordingArtifact>,
}

struct RecordingTask {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct CaptureController {
    provider: Arc<dyn MediaProvider>,
    config: RecorderConfig,
    constraints: CaptureConstraints,
    devices: Vec<DeviceDescriptor>,
    selected_device: Option<String>,
    stream: Option<Box<dyn CaptureStream>>,
    shared: Arc<Mutex<RecorderShared>>,
    task: Option<RecordingTask>,
    events: broadcast::Sender<CaptureEvent>,
}

impl CaptureController {
    pub fn new(
        provider: Arc<dyn MediaProvider>,
        config: RecorderConfig,
        constraints: CaptureConstraints,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            provider,
            config,
            constraints,
            devices: Vec::new(),
            selected_device: None,
            stream: None,
            shared: Arc::new(Mutex::new(RecorderShared::default())),
            task: None,
            events,
        }
    }

    /// Subscribe to lifecycle events. Subscribers joining mid-session only
    /// see transitions from that point on.
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> RecorderState {
        self.shared.lock().unwrap().state
    }

    /// Video input devices found by the last enumeration.
    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    pub fn selected_device(&self) -> Option<&str> {
        self.selected_device.as_deref()
    }

    /// The artifact of the last stopped recording, if any.
    pub fn artifact(&self) -> Option<RecordingArtifact> {
        self.shared.lock().unwrap().artifact.clone()
    }

    /// Whether a recording task is still running.
    pub fn live_task_count(&self) -> usize {
        match &self.task {
            Some(task) if !task.handle.is_finished() => 1,
            _ => 0,
        }
    }

    /// Enumerate devices, pick one, and open its stream.
    ///
    /// `device_id` forces a specific device; otherwise a previous selection is
    /// kept when still attached, and failing that a built-in camera is
    /// preferred over external ones. Any previously held stream is released
    /// before the new one is opened. On failure no stream is left attached.
    pub async fn initialize(&mut self, device_id: Option<&str>) -> Result<(), MediaError> {
        if self.state() == RecorderState::Recording {
            warn!("camera initialization requested while recording; stopping first");
            self.stop_recording().await?;
        }

        let devices = self.provider.enumerate_devices().await?;
        self.devices = devices
            .into_iter()
            .filter(|d| d.kind == DeviceKind::VideoInput)
            .collect();
        if self.devices.is_empty() {
            return Err(MediaError::NoDeviceAvailable);
        }

        let chosen = match device_id {
            Some(id) => id.to_string(),
            None => self
                .selected_device
                .clone()
                .filter(|id| self.devices.iter().any(|d| &d.id == id))
                .unwrap_or_else(|| pick_default(&self.devices).id.clone()),
        };

        // The previous device must be given back before the next one is
        // acquired; two held streams would fight over the hardware.
        if let Some(mut old) = self.stream.take() {
            if let Err(e) = old.release().await {
                warn!("failed to release previous stream: {}", e);
            }
        }

        let stream = self.provider.open_stream(&chosen, &self.constraints).await?;
        info!(
            "capture stream open on device {} via {} provider",
            chosen,
            self.provider.name()
        );
        self.selected_device = Some(chosen.clone());
        self.stream = Some(stream);
        let _ = self.events.send(CaptureEvent::CameraReady { device_id: chosen });
        Ok(())
    }

    /// Switch to another camera, releasing the current stream first.
    pub async fn change_camera(&mut self, device_id: &str) -> Result<(), MediaError> {
        info!("switching camera to {}", device_id);
        self.initialize(Some(device_id)).await
    }

    /// Begin recording from the active stream. Valid only while idle.
    pub async fn start_recording(&mut self) -> Result<(), MediaError> {
        {
            let shared = self.shared.lock().unwrap();
            if shared.state != RecorderState::Idle {
                return Err(MediaError::RecorderStart(format!(
                    "recorder is {}",
                    shared.state
                )));
            }
        }

        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| MediaError::RecorderStart("no active capture stream".to_string()))?;
        let fragments = stream.start_capture(self.config.timeslice).await?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let recorder = ClipRecorder::new(self.config.clone());
        let shared = Arc::clone(&self.shared);
        let events = self.events.clone();

        {
            let mut s = self.shared.lock().unwrap();
            s.state = RecorderState::Recording;
            s.artifact = None;
        }

        let handle = tokio::spawn(async move {
            let (artifact, reason) = recorder.record(fragments, stop_rx).await;
            let artifact_id = artifact.id.clone();
            {
                let mut s = shared.lock().unwrap();
                s.state = RecorderState::Stopped;
                s.artifact = Some(artifact);
            }
            let _ = events.send(CaptureEvent::RecordingStopped {
                reason,
                artifact_id,
            });
        });
        self.task = Some(RecordingTask { stop_tx, handle });
        let _ = self.events.send(CaptureEvent::RecordingStarted);
        Ok(())
    }

    /// Stop the current recording and return its artifact.
    ///
    /// A stop with no recording in progress is a no-op returning `Ok(None)`;
    /// stopping twice produces the artifact once.
    pub async fn stop_recording(&mut self) -> Result<Option<RecordingArtifact>, MediaError> {
        let Some(task) = self.task.take() else {
            warn!("stop requested but no recording is in progress");
            return Ok(None);
        };

        let _ = task.stop_tx.send(true);
        if let Err(e) = task.handle.await {
            error!("recording task failed: {}", e);
        }

        if let Some(stream) = self.stream.as_mut() {
            if let Err(e) = stream.stop_capture().await {
                warn!("failed to stop fragment delivery: {}", e);
            }
        }
        Ok(self.shared.lock().unwrap().artifact.clone())
    }

    /// Discard the stopped recording and return to idle so the question can
    /// be answered again. The capture stream is untouched.
    pub fn reset(&mut self) {
        {
            let mut s = self.shared.lock().unwrap();
            match s.state {
                RecorderState::Stopped => {
                    s.state = RecorderState::Idle;
                    s.artifact = None;
                }
                RecorderState::Idle => return,
                RecorderState::Recording => {
                    warn!("reset requested while recording; ignoring");
                    return;
                }
            }
        }
        // After a deadline-triggered stop the finished task is still parked
        // here; drop it so the next start begins clean.
        if let Some(task) = self.task.take() {
            task.handle.abort();
        }
        let _ = self.events.send(CaptureEvent::RecordingReset);
        info!("recording discarded; ready to record again");
    }

    /// Tear down everything: force-stop any recording, then release the
    /// stream so the camera light goes off. Runs on every exit path.
    pub async fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.stop_tx.send(true);
            if let Err(e) = task.handle.await {
                error!("recording task failed during teardown: {}", e);
            }
        }
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.stop_capture().await {
                warn!("failed to stop fragment delivery during teardown: {}", e);
            }
            if let Err(e) = stream.release().await {
                error!("failed to release capture stream during teardown: {}", e);
            }
        }
        self.selected_device = None;
        info!("capture controller torn down");
    }
}

/// Prefer an integrated camera, falling back to the first device.
fn pick_default(devices: &[DeviceDescriptor]) -> &DeviceDescriptor {
    devices
        .iter()
        .find(|d| d.looks_built_in())
        .unwrap_or(&devices[0])
}
