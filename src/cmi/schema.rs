//! Per-version CMI element schemas.
//!
//! Each SCORM version declares the element names content may write, the type
//! of each element, and where a valid value lands in the structured
//! projection. Names absent from the table are vendor extensions: accepted,
//! quarantined into the raw snapshot, never projected.

use crate::core::ScormVersion;
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Where a validated element value lands in [`super::ProjectedWrites`].
/// Elements with no slot are known but tracked in the raw snapshot only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    LessonStatus,
    CompletionStatus,
    SuccessStatus,
    ScoreRaw,
    ScoreMin,
    ScoreMax,
    ScoreScaled,
    SessionTime,
    TotalTime,
    LessonLocation,
    SuspendData,
    Exit,
}

#[derive(Debug, Clone)]
pub enum ElementKind {
    /// Free-form string with a size cap.
    Text { max_len: usize },
    /// Decimal with optional static bounds.
    Decimal { min: Option<f64>, max: Option<f64> },
    /// One of a closed token vocabulary.
    Token(&'static [&'static str]),
    /// Time in the version's serialization (HHHH:MM:SS.ss or ISO-8601).
    Time,
}

#[derive(Debug, Clone)]
pub struct ElementSpec {
    pub kind: ElementKind,
    pub slot: Option<Slot>,
}

impl ElementSpec {
    fn new(kind: ElementKind, slot: Option<Slot>) -> Self {
        Self { kind, slot }
    }
}

/// Collection prefixes (`cmi.interactions.n.*`, `cmi.objectives.n.*`) shared
/// by both versions. Values are capped at this length per field.
pub const COLLECTION_FIELD_MAX_LEN: usize = 4096;

pub const EXIT_TOKENS_12: &[&str] = &["", "time-out", "suspend", "logout"];
pub const EXIT_TOKENS_2004: &[&str] = &["", "time-out", "suspend", "logout", "normal"];
const ENTRY_TOKENS: &[&str] = &["", "ab-initio", "resume"];
const MODE_TOKENS: &[&str] = &["browse", "normal", "review"];
const LESSON_STATUS_TOKENS: &[&str] = &[
    "passed",
    "completed",
    "failed",
    "incomplete",
    "browsed",
    "not attempted",
];
const COMPLETION_TOKENS: &[&str] = &["completed", "incomplete", "not attempted", "unknown"];
const SUCCESS_TOKENS: &[&str] = &["passed", "failed", "unknown"];

lazy_static! {
    static ref SCHEMA_12: HashMap<&'static str, ElementSpec> = {
        use ElementKind::*;
        let mut m = HashMap::new();
        m.insert(
            "cmi.core.lesson_status",
            ElementSpec::new(Token(LESSON_STATUS_TOKENS), Some(Slot::LessonStatus)),
        );
        m.insert(
            "cmi.core.lesson_location",
            ElementSpec::new(Text { max_len: 255 }, Some(Slot::LessonLocation)),
        );
        m.insert(
            "cmi.core.score.raw",
            ElementSpec::new(Decimal { min: Some(0.0), max: Some(100.0) }, Some(Slot::ScoreRaw)),
        );
        m.insert(
            "cmi.core.score.min",
            ElementSpec::new(Decimal { min: Some(0.0), max: Some(100.0) }, Some(Slot::ScoreMin)),
        );
        m.insert(
            "cmi.core.score.max",
            ElementSpec::new(Decimal { min: Some(0.0), max: Some(100.0) }, Some(Slot::ScoreMax)),
        );
        m.insert(
            "cmi.core.session_time",
            ElementSpec::new(Time, Some(Slot::SessionTime)),
        );
        m.insert("cmi.core.total_time", ElementSpec::new(Time, Some(Slot::TotalTime)));
        m.insert(
            "cmi.core.exit",
            ElementSpec::new(Token(EXIT_TOKENS_12), Some(Slot::Exit)),
        );
        m.insert("cmi.core.entry", ElementSpec::new(Token(ENTRY_TOKENS), None));
        m.insert("cmi.core.lesson_mode", ElementSpec::new(Token(MODE_TOKENS), None));
        m.insert("cmi.core.student_id", ElementSpec::new(Text { max_len: 255 }, None));
        m.insert("cmi.core.student_name", ElementSpec::new(Text { max_len: 255 }, None));
        m.insert(
            "cmi.suspend_data",
            ElementSpec::new(Text { max_len: 4096 }, Some(Slot::SuspendData)),
        );
        m.insert("cmi.launch_data", ElementSpec::new(Text { max_len: 4096 }, None));
        m.insert("cmi.comments", ElementSpec::new(Text { max_len: 4096 }, None));
        m
    };
    static ref SCHEMA_2004: HashMap<&'static str, ElementSpec> = {
        use ElementKind::*;
        let mut m = HashMap::new();
        m.insert(
            "cmi.completion_status",
            ElementSpec::new(Token(COMPLETION_TOKENS), Some(Slot::CompletionStatus)),
        );
        m.insert(
            "cmi.success_status",
            ElementSpec::new(Token(SUCCESS_TOKENS), Some(Slot::SuccessStatus)),
        );
        m.insert(
            "cmi.score.raw",
            ElementSpec::new(Decimal { min: None, max: None }, Some(Slot::ScoreRaw)),
        );
        m.insert(
            "cmi.score.min",
            ElementSpec::new(Decimal { min: None, max: None }, Some(Slot::ScoreMin)),
        );
        m.insert(
            "cmi.score.max",
            ElementSpec::new(Decimal { min: None, max: None }, Some(Slot::ScoreMax)),
        );
        m.insert(
            "cmi.score.scaled",
            ElementSpec::new(Decimal { min: Some(-1.0), max: Some(1.0) }, Some(Slot::ScoreScaled)),
        );
        m.insert("cmi.session_time", ElementSpec::new(Time, Some(Slot::SessionTime)));
        m.insert("cmi.total_time", ElementSpec::new(Time, Some(Slot::TotalTime)));
        m.insert(
            "cmi.location",
            ElementSpec::new(Text { max_len: 1000 }, Some(Slot::LessonLocation)),
        );
        m.insert(
            "cmi.suspend_data",
            ElementSpec::new(Text { max_len: 64_000 }, Some(Slot::SuspendData)),
        );
        m.insert(
            "cmi.exit",
            ElementSpec::new(Token(EXIT_TOKENS_2004), Some(Slot::Exit)),
        );
        m.insert("cmi.entry", ElementSpec::new(Token(ENTRY_TOKENS), None));
        m.insert("cmi.mode", ElementSpec::new(Token(MODE_TOKENS), None));
        m.insert(
            "cmi.progress_measure",
            ElementSpec::new(Decimal { min: Some(0.0), max: Some(1.0) }, None),
        );
        m.insert("cmi.learner_id", ElementSpec::new(Text { max_len: 255 }, None));
        m.insert("cmi.learner_name", ElementSpec::new(Text { max_len: 255 }, None));
        m.insert("cmi.launch_data", ElementSpec::new(Text { max_len: 4096 }, None));
        m
    };
}

/// Look up a flat (non-collection) element in the version's schema.
pub fn lookup(version: ScormVersion, element: &str) -> Option<&'static ElementSpec> {
    match version {
        ScormVersion::V1_2 => SCHEMA_12.get(element),
        ScormVersion::V2004 => SCHEMA_2004.get(element),
    }
}

/// Collection an element belongs to, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Interactions,
    Objectives,
}

/// Split `cmi.interactions.3.id` into `(Interactions, 3, "id")`. Returns
/// `Err(())` for a collection element whose index or field is malformed,
/// `Ok(None)` for elements outside both collections.
#[allow(clippy::result_unit_err)]
pub fn parse_collection_element(element: &str) -> Result<Option<(Collection, u32, &str)>, ()> {
    let (collection, rest) = if let Some(rest) = element.strip_prefix("cmi.interactions.") {
        (Collection::Interactions, rest)
    } else if let Some(rest) = element.strip_prefix("cmi.objectives.") {
        (Collection::Objectives, rest)
    } else {
        return Ok(None);
    };

    let (index_text, field) = rest.split_once('.').ok_or(())?;
    let index: u32 = index_text.parse().map_err(|_| ())?;
    if field.is_empty() {
        return Err(());
    }
    Ok(Some((collection, index, field)))
}

/// `_count` and `_children` are LMS-populated; content may read them but a
/// write is a protocol violation on the element level.
pub fn is_read_only(element: &str) -> bool {
    element.ends_with("._count") || element.ends_with("._children")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_use_disjoint_status_elements() {
        assert!(lookup(ScormVersion::V1_2, "cmi.core.lesson_status").is_some());
        assert!(lookup(ScormVersion::V1_2, "cmi.completion_status").is_none());
        assert!(lookup(ScormVersion::V2004, "cmi.completion_status").is_some());
        assert!(lookup(ScormVersion::V2004, "cmi.core.lesson_status").is_none());
    }

    #[test]
    fn collection_elements_parse_index_and_field() {
        assert_eq!(
            parse_collection_element("cmi.interactions.0.id"),
            Ok(Some((Collection::Interactions, 0, "id")))
        );
        assert_eq!(
            parse_collection_element("cmi.objectives.12.score.raw"),
            Ok(Some((Collection::Objectives, 12, "score.raw")))
        );
        assert_eq!(parse_collection_element("cmi.suspend_data"), Ok(None));
        assert_eq!(parse_collection_element("cmi.interactions.x.id"), Err(()));
        assert_eq!(parse_collection_element("cmi.interactions.3"), Err(()));
    }

    #[test]
    fn count_and_children_are_read_only() {
        assert!(is_read_only("cmi.interactions._count"));
        assert!(is_read_only("cmi.objectives._children"));
        assert!(!is_read_only("cmi.interactions.0.id"));
    }
}
