pub mod error;
pub mod types;

pub use error::{Result, TrackError};
pub use types::{
    AttemptId, CompletionStatus, ContentId, EnrollmentId, EnrollmentStatus, EntryMode, ExitMode,
    LearnerId, LessonStatus, ScormVersion, Score, SessionId, SuccessStatus,
};
