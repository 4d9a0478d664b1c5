//! Completion resolution.
//!
//! Derives a single "is this attempt complete, and did the learner pass"
//! answer from the version-specific status fields. Completion is monotonic:
//! the store applies a resolution's side effects only on the first
//! transition into complete, never in reverse.

use crate::core::{CompletionStatus, LessonStatus, ScormVersion, SuccessStatus};

/// Outcome of resolving the current status fields of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// The attempt has reached a terminal completion state.
    pub complete: bool,
    /// Pass/fail verdict where one exists. Independent of `complete`: a 1.2
    /// `failed` is both complete and not passed.
    pub passed: Option<bool>,
}

/// Resolve completion from an attempt's current structured fields.
///
/// SCORM 1.2 signals completion through the single lesson-status field:
/// `passed`, `completed`, and `failed` are all terminal (a learner who
/// attempted and failed still finished); `incomplete`, `browsed`, and
/// `not attempted` are not.
///
/// SCORM 2004 splits the signal: `completion_status == completed` OR
/// `success_status == passed` resolves complete. The two fields are
/// independent because packages report either one without the other.
pub fn resolve(
    version: ScormVersion,
    lesson_status: Option<LessonStatus>,
    completion_status: Option<CompletionStatus>,
    success_status: Option<SuccessStatus>,
) -> Resolution {
    match version {
        ScormVersion::V1_2 => {
            let complete = matches!(
                lesson_status,
                Some(LessonStatus::Passed | LessonStatus::Completed | LessonStatus::Failed)
            );
            let passed = match lesson_status {
                Some(LessonStatus::Passed) => Some(true),
                Some(LessonStatus::Failed) => Some(false),
                _ => None,
            };
            Resolution { complete, passed }
        }
        ScormVersion::V2004 => {
            let completed = completion_status == Some(CompletionStatus::Completed);
            let passed = match success_status {
                Some(SuccessStatus::Passed) => Some(true),
                Some(SuccessStatus::Failed) => Some(false),
                _ => None,
            };
            Resolution {
                complete: completed || passed == Some(true),
                passed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_is_terminal_in_12() {
        let resolution = resolve(ScormVersion::V1_2, Some(LessonStatus::Failed), None, None);
        assert!(resolution.complete);
        assert_eq!(resolution.passed, Some(false));
    }

    #[test]
    fn browsed_and_incomplete_are_not_terminal_in_12() {
        for status in [LessonStatus::Browsed, LessonStatus::Incomplete, LessonStatus::NotAttempted] {
            let resolution = resolve(ScormVersion::V1_2, Some(status), None, None);
            assert!(!resolution.complete, "{status:?} must not resolve complete");
        }
    }

    #[test]
    fn passed_alone_completes_a_2004_attempt() {
        let resolution = resolve(
            ScormVersion::V2004,
            None,
            Some(CompletionStatus::Incomplete),
            Some(SuccessStatus::Passed),
        );
        assert!(resolution.complete);
        assert_eq!(resolution.passed, Some(true));
    }

    #[test]
    fn completed_alone_completes_a_2004_attempt() {
        let resolution = resolve(
            ScormVersion::V2004,
            None,
            Some(CompletionStatus::Completed),
            None,
        );
        assert!(resolution.complete);
        assert_eq!(resolution.passed, None);
    }

    #[test]
    fn failed_without_completion_is_not_terminal_in_2004() {
        // Unlike 1.2, a 2004 `failed` without `completed` stays open: the
        // package may still be mid-activity.
        let resolution = resolve(
            ScormVersion::V2004,
            None,
            Some(CompletionStatus::Incomplete),
            Some(SuccessStatus::Failed),
        );
        assert!(!resolution.complete);
        assert_eq!(resolution.passed, Some(false));
    }

    #[test]
    fn empty_fields_resolve_open() {
        assert!(!resolve(ScormVersion::V1_2, None, None, None).complete);
        assert!(!resolve(ScormVersion::V2004, None, None, None).complete);
    }
}
