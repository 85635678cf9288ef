pub mod avatar;
pub mod config;
pub mod interview;
pub mod media;
pub mod progress;

pub use avatar::{
    AvatarConfig, AvatarError, AvatarPipeline, AvatarRequestState, AvatarService, AvatarSource,
    FallbackCatalog, GenerationRequest, GenerationStatus, HttpAvatarService, ResolvedAvatar,
    RetryPolicy,
};
pub use config::Config;
pub use interview::{
    ApiError, HttpInterviewApi, Interview, InterviewApi, InterviewRunner, InterviewSummary,
    Question, QuestionReady,
};
pub use media::{
    CaptureConstraints, CaptureController, CaptureEvent, CaptureStream, DeviceDescriptor,
    DeviceKind, MediaChunk, MediaError, MediaProvider, RecorderConfig, RecorderState,
    RecordingArtifact, StopReason, SyntheticProvider,
};
pub use progress::{
    FileSnapshotStore, MemorySnapshotStore, ProgressSnapshot, ProgressTracker, QuestionStatus,
    SnapshotError, SnapshotStore,
};
