//! Batch validation and normalization of CMI writes.
//!
//! A commit carries an ordered list of `(element, value)` pairs. Validation
//! never fails the batch over a single bad element: invalid values are
//! dropped from the structured projection, reported as warnings, and kept in
//! the raw snapshot for audit. Unknown element names (vendor extensions) are
//! quarantined into the raw snapshot silently.

use super::schema::{self, Collection, ElementKind, Slot};
use crate::core::{CompletionStatus, ExitMode, LessonStatus, ScormVersion, Score, SuccessStatus};
use crate::timecodec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Why an element was dropped from the structured projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    InvalidToken,
    NotANumber,
    OutOfRange,
    TooLong,
    BadTime,
    BadCollectionIndex,
    ReadOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementWarning {
    pub element: String,
    pub value: String,
    pub kind: WarningKind,
}

/// Structured fields a validated batch projects onto an attempt. Every field
/// is optional: content writes only what it writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectedWrites {
    pub lesson_status: Option<LessonStatus>,
    pub completion_status: Option<CompletionStatus>,
    pub success_status: Option<SuccessStatus>,
    pub score: Score,
    pub session_time_seconds: Option<u64>,
    pub total_time_seconds: Option<u64>,
    pub lesson_location: Option<String>,
    pub suspend_data: Option<String>,
    pub exit: Option<ExitMode>,
}

/// Result of validating one commit batch.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub projected: ProjectedWrites,
    /// Per-index merged `cmi.interactions.n.*` records.
    pub interactions: BTreeMap<u32, BTreeMap<String, String>>,
    /// Per-index merged `cmi.objectives.n.*` records.
    pub objectives: BTreeMap<u32, BTreeMap<String, String>>,
    /// Every write as received, including quarantined and rejected ones.
    pub raw: BTreeMap<String, String>,
    pub warnings: Vec<ElementWarning>,
}

/// Validate an ordered batch of writes. Later writes for the same element
/// win. Never fails: a structurally decodable batch always normalizes.
pub fn validate_batch(version: ScormVersion, writes: &[(String, String)]) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for (element, value) in writes {
        batch.raw.insert(element.clone(), value.clone());

        if schema::is_read_only(element) {
            batch.reject(element, value, WarningKind::ReadOnly);
            continue;
        }

        match schema::parse_collection_element(element) {
            Ok(Some((collection, index, field))) => {
                if value.len() > schema::COLLECTION_FIELD_MAX_LEN {
                    batch.reject(element, value, WarningKind::TooLong);
                    continue;
                }
                let records = match collection {
                    Collection::Interactions => &mut batch.interactions,
                    Collection::Objectives => &mut batch.objectives,
                };
                // Writing a higher index than previously seen auto-extends
                // the collection; BTreeMap keeps indexes ordered.
                records
                    .entry(index)
                    .or_default()
                    .insert(field.to_string(), value.clone());
                continue;
            }
            Ok(None) => {}
            Err(()) => {
                batch.reject(element, value, WarningKind::BadCollectionIndex);
                continue;
            }
        }

        let Some(spec) = schema::lookup(version, element) else {
            // Vendor extension: raw snapshot only.
            continue;
        };

        match &spec.kind {
            ElementKind::Text { max_len } => {
                if value.len() > *max_len {
                    batch.reject(element, value, WarningKind::TooLong);
                } else if let Some(slot) = spec.slot {
                    batch.project_text(slot, value.clone());
                }
            }
            ElementKind::Token(allowed) => {
                if !allowed.contains(&value.as_str()) {
                    batch.reject(element, value, WarningKind::InvalidToken);
                } else if let Some(slot) = spec.slot {
                    batch.project_token(slot, value);
                }
            }
            ElementKind::Decimal { min, max } => match value.parse::<f64>() {
                Ok(number) if number.is_finite() => {
                    let below = min.map(|m| number < m).unwrap_or(false);
                    let above = max.map(|m| number > m).unwrap_or(false);
                    if below || above {
                        batch.reject(element, value, WarningKind::OutOfRange);
                    } else if let Some(slot) = spec.slot {
                        batch.project_decimal(slot, number);
                    }
                }
                _ => batch.reject(element, value, WarningKind::NotANumber),
            },
            ElementKind::Time => match timecodec::parse_for(version, value) {
                Some(seconds) => {
                    if let Some(slot) = spec.slot {
                        batch.project_time(slot, seconds);
                    }
                }
                None => batch.reject(element, value, WarningKind::BadTime),
            },
        }
    }

    batch.check_score_bounds();
    batch
}

impl NormalizedBatch {
    fn reject(&mut self, element: &str, value: &str, kind: WarningKind) {
        self.warnings.push(ElementWarning {
            element: element.to_string(),
            value: value.to_string(),
            kind,
        });
    }

    fn project_text(&mut self, slot: Slot, value: String) {
        match slot {
            Slot::LessonLocation => self.projected.lesson_location = Some(value),
            Slot::SuspendData => self.projected.suspend_data = Some(value),
            _ => {}
        }
    }

    fn project_token(&mut self, slot: Slot, value: &str) {
        match slot {
            Slot::LessonStatus => self.projected.lesson_status = LessonStatus::from_token(value),
            Slot::CompletionStatus => {
                self.projected.completion_status = CompletionStatus::from_token(value)
            }
            Slot::SuccessStatus => {
                self.projected.success_status = SuccessStatus::from_token(value)
            }
            Slot::Exit => self.projected.exit = ExitMode::from_token(value),
            _ => {}
        }
    }

    fn project_decimal(&mut self, slot: Slot, value: f64) {
        match slot {
            Slot::ScoreRaw => self.projected.score.raw = Some(value),
            Slot::ScoreMin => self.projected.score.min = Some(value),
            Slot::ScoreMax => self.projected.score.max = Some(value),
            Slot::ScoreScaled => self.projected.score.scaled = Some(value),
            _ => {}
        }
    }

    fn project_time(&mut self, slot: Slot, seconds: u64) {
        match slot {
            Slot::SessionTime => self.projected.session_time_seconds = Some(seconds),
            Slot::TotalTime => self.projected.total_time_seconds = Some(seconds),
            _ => {}
        }
    }

    /// Cross-field rule: a raw score outside its own declared [min, max]
    /// window is dropped. Runs after the whole batch so declaration order
    /// within the batch does not matter.
    fn check_score_bounds(&mut self) {
        let score = &self.projected.score;
        if let (Some(raw), Some(min), Some(max)) = (score.raw, score.min, score.max) {
            if raw < min || raw > max {
                self.warnings.push(ElementWarning {
                    element: "score.raw".to_string(),
                    value: raw.to_string(),
                    kind: WarningKind::OutOfRange,
                });
                self.projected.score.raw = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writes(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn projects_known_12_elements() {
        let batch = validate_batch(
            ScormVersion::V1_2,
            &writes(&[
                ("cmi.core.lesson_status", "passed"),
                ("cmi.core.score.raw", "85"),
                ("cmi.core.session_time", "0000:10:00.00"),
                ("cmi.suspend_data", "bookmark-blob"),
            ]),
        );
        assert!(batch.warnings.is_empty());
        assert_eq!(batch.projected.lesson_status, Some(LessonStatus::Passed));
        assert_eq!(batch.projected.score.raw, Some(85.0));
        assert_eq!(batch.projected.session_time_seconds, Some(600));
        assert_eq!(batch.projected.suspend_data.as_deref(), Some("bookmark-blob"));
    }

    #[test]
    fn later_write_for_same_element_wins() {
        let batch = validate_batch(
            ScormVersion::V2004,
            &writes(&[
                ("cmi.completion_status", "incomplete"),
                ("cmi.completion_status", "completed"),
            ]),
        );
        assert_eq!(
            batch.projected.completion_status,
            Some(CompletionStatus::Completed)
        );
        assert_eq!(batch.raw["cmi.completion_status"], "completed");
    }

    #[test]
    fn unknown_elements_are_quarantined_not_rejected() {
        let batch = validate_batch(
            ScormVersion::V2004,
            &writes(&[("cmi.articulate.custom_state", "whatever")]),
        );
        assert!(batch.warnings.is_empty());
        assert_eq!(batch.raw["cmi.articulate.custom_state"], "whatever");
        assert_eq!(batch.projected, ProjectedWrites::default());
    }

    #[test]
    fn invalid_token_is_dropped_but_kept_raw() {
        let batch = validate_batch(
            ScormVersion::V1_2,
            &writes(&[("cmi.core.lesson_status", "finished")]),
        );
        assert_eq!(batch.warnings.len(), 1);
        assert_eq!(batch.warnings[0].kind, WarningKind::InvalidToken);
        assert_eq!(batch.projected.lesson_status, None);
        assert_eq!(batch.raw["cmi.core.lesson_status"], "finished");
    }

    #[test]
    fn scaled_score_bounds_enforced() {
        let batch = validate_batch(ScormVersion::V2004, &writes(&[("cmi.score.scaled", "1.5")]));
        assert_eq!(batch.warnings[0].kind, WarningKind::OutOfRange);
        assert_eq!(batch.projected.score.scaled, None);
    }

    #[test]
    fn raw_score_outside_declared_window_is_dropped() {
        let batch = validate_batch(
            ScormVersion::V2004,
            &writes(&[
                ("cmi.score.raw", "150"),
                ("cmi.score.min", "0"),
                ("cmi.score.max", "100"),
            ]),
        );
        assert_eq!(batch.projected.score.raw, None);
        assert_eq!(batch.projected.score.max, Some(100.0));
        assert!(batch
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::OutOfRange));
    }

    #[test]
    fn interactions_merge_per_index_and_auto_extend() {
        let batch = validate_batch(
            ScormVersion::V2004,
            &writes(&[
                ("cmi.interactions.0.id", "q1"),
                ("cmi.interactions.0.result", "correct"),
                ("cmi.interactions.4.id", "q5"),
            ]),
        );
        assert_eq!(batch.interactions.len(), 2);
        assert_eq!(batch.interactions[&0]["id"], "q1");
        assert_eq!(batch.interactions[&0]["result"], "correct");
        assert_eq!(batch.interactions[&4]["id"], "q5");
    }

    #[test]
    fn malformed_collection_index_is_warned() {
        let batch = validate_batch(
            ScormVersion::V1_2,
            &writes(&[("cmi.interactions.first.id", "q1")]),
        );
        assert_eq!(batch.warnings[0].kind, WarningKind::BadCollectionIndex);
        assert!(batch.interactions.is_empty());
    }

    #[test]
    fn writes_to_count_are_read_only_violations() {
        let batch = validate_batch(ScormVersion::V2004, &writes(&[("cmi.interactions._count", "3")]));
        assert_eq!(batch.warnings[0].kind, WarningKind::ReadOnly);
    }

    #[test]
    fn bad_session_time_is_flagged_not_fatal() {
        let batch = validate_batch(
            ScormVersion::V1_2,
            &writes(&[
                ("cmi.core.session_time", "ten minutes"),
                ("cmi.core.lesson_status", "completed"),
            ]),
        );
        assert_eq!(batch.warnings[0].kind, WarningKind::BadTime);
        assert_eq!(batch.projected.session_time_seconds, None);
        assert_eq!(batch.projected.lesson_status, Some(LessonStatus::Completed));
    }

    #[test]
    fn oversized_suspend_data_is_rejected_for_12() {
        let blob = "x".repeat(5000);
        let batch = validate_batch(ScormVersion::V1_2, &writes(&[("cmi.suspend_data", &blob)]));
        assert_eq!(batch.warnings[0].kind, WarningKind::TooLong);
        assert_eq!(batch.projected.suspend_data, None);
        // 2004 allows much larger blobs.
        let batch = validate_batch(ScormVersion::V2004, &writes(&[("cmi.suspend_data", &blob)]));
        assert!(batch.warnings.is_empty());
        assert!(batch.projected.suspend_data.is_some());
    }
}
