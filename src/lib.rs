// ============================================================================
// scormtrack — SCORM Run-Time Tracking Engine
// ============================================================================
//
// Brokers communication between browser-sandboxed SCORM 1.2 / 2004 content
// packages and the platform's learner-progress store: validates batched CMI
// writes, reconciles the two time serializations, resolves completion, and
// persists attempts and enrollment aggregates under an idempotent commit
// protocol that tolerates duplicate and lost deliveries.

pub mod cmi;
pub mod completion;
pub mod config;
pub mod core;
pub mod engine;
pub mod resume;
pub mod shim;
pub mod store;
pub mod timecodec;
pub mod web;

// Re-export the main types for convenience
pub use config::EngineConfig;
pub use crate::core::{
    AttemptId, CompletionStatus, ContentId, EnrollmentId, EnrollmentStatus, EntryMode, ExitMode,
    LearnerId, LessonStatus, Result, ScormVersion, Score, SessionId, SuccessStatus, TrackError,
};
pub use engine::{
    CommitHandler, CommitRequest, CommitResponse, ContentPackages, EnrollmentSummary,
    InMemoryContentPackages, LaunchResponse, TerminateResponse,
};
pub use store::{Attempt, Enrollment, TrackingStore};
