//! Avatar acquisition: generation invocation, status polling, retry, and
//! deterministic fallback to the pre-recorded catalog.

pub mod catalog;
pub mod pipeline;
pub mod retry;
pub mod service;

pub use catalog::{FallbackCatalog, DEFAULT_CATEGORY};
pub use pipeline::{
    AvatarConfig, AvatarError, AvatarPipeline, AvatarRequestState, AvatarSource, GenerationFailure,
    ResolvedAvatar,
};
pub use retry::RetryPolicy;
pub use service::{
    AvatarService, AvatarStatusResponse, GenerationRequest, GenerationStatus, HttpAvatarService,
    ServiceError,
};
