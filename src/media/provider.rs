// Media provider abstraction. The controller never talks to capture hardware
// directly; it goes through this trait so deployments can plug in a real
// device layer while tests and the demo run against the synthetic provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Kind of media input a device exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
}

/// Snapshot of an attached capture device.
///
/// Descriptors come from [`MediaProvider::enumerate_devices`] and are refreshed
/// on every controller activation rather than cached, since devices can be
/// plugged and unplugged between sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub label: String,
    pub kind: DeviceKind,
}

impl DeviceDescriptor {
    pub fn video(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: DeviceKind::VideoInput,
        }
    }

    /// Whether the label suggests an integrated camera, preferred by default
    /// over external ones.
    pub fn looks_built_in(&self) -> bool {
        let label = self.label.to_lowercase();
        label.contains("built-in") || label.contains("integrated")
    }
}

/// Capture constraints requested when opening a stream. The provider treats
/// `ideal_*` values as targets and `max_*` values as hard caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub ideal_frame_rate: u32,
    pub max_frame_rate: u32,
    pub front_facing: bool,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub audio_sample_rate: u32,
    pub audio_channels: u16,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 720,
            max_width: 1920,
            max_height: 1080,
            ideal_frame_rate: 30,
            max_frame_rate: 60,
            front_facing: true,
            echo_cancellation: true,
            noise_suppression: true,
            audio_sample_rate: 44_100,
            audio_channels: 1,
        }
    }
}

/// One encoded media fragment delivered by a capturing stream.
#[derive(Debug, Clone)]
pub struct MediaChunk {
    pub data: Vec<u8>,
    /// Milliseconds since capture started.
    pub timestamp_ms: u64,
}

/// Errors raised by device access and recording control.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("camera/microphone permission denied")]
    PermissionDenied,

    #[error("no video input device available")]
    NoDeviceAvailable,

    #[error("failed to access capture device: {0}")]
    DeviceAccess(String),

    #[error("failed to start recorder: {0}")]
    RecorderStart(String),
}

/// An open capture stream holding exclusive access to a device.
///
/// Opening the stream turns the hardware on; it stays on (for preview and
/// re-recording) until [`release`](CaptureStream::release) stops every track.
/// Fragment delivery is restartable: a new `start_capture` supersedes any
/// previous delivery on the same stream.
#[async_trait]
pub trait CaptureStream: Send {
    /// Device this stream was opened against.
    fn device_id(&self) -> &str;

    /// Whether the underlying tracks are still held.
    fn is_live(&self) -> bool;

    /// Begin delivering one encoded fragment per `timeslice`. Implementations
    /// stop delivering on their own when the receiver is dropped.
    async fn start_capture(
        &mut self,
        timeslice: Duration,
    ) -> Result<mpsc::Receiver<MediaChunk>, MediaError>;

    /// Stop delivering fragments. The device stays held.
    async fn stop_capture(&mut self) -> Result<(), MediaError>;

    /// Stop every track and give the hardware back. Idempotent.
    async fn release(&mut self) -> Result<(), MediaError>;
}

/// Source of capture devices and streams.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// List currently attached devices.
    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, MediaError>;

    /// Open a stream against one device.
    async fn open_stream(
        &self,
        device_id: &str,
        constraints: &CaptureConstraints,
    ) -> Result<Box<dyn CaptureStream>, MediaError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}
