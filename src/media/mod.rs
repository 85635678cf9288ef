//! Media capture: device enumeration, stream acquisition, and recording.

pub mod controller;
pub mod provider;
pub mod recorder;
pub mod synthetic;

pub use controller::{CaptureController, CaptureEvent};
pub use provider::{
    CaptureConstraints, CaptureStream, DeviceDescriptor, DeviceKind, MediaChunk, MediaError,
    MediaProvider,
};
pub use recorder::{ClipRecorder, RecorderConfig, RecorderState, RecordingArtifact, StopReason};
pub use synthetic::{SyntheticProvider, SyntheticStream};
