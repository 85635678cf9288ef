//! Interview progress: persisted position and per-question completion.

pub mod snapshot;
pub mod store;
pub mod tracker;

pub use snapshot::{storage_key, ProgressSnapshot, QuestionStatus, STORAGE_KEY_PREFIX};
pub use store::{ensure_store_dir, FileSnapshotStore, MemorySnapshotStore, SnapshotError, SnapshotStore};
pub use tracker::ProgressTracker;
