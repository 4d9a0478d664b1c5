use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Protocol version
// ============================================================================

/// SCORM protocol version an attempt was launched under.
///
/// The two versions share similar data elements under different names and
/// token sets; everything downstream of the commit envelope branches on this
/// tag rather than duplicating the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScormVersion {
    #[serde(rename = "1.2")]
    V1_2,
    #[serde(rename = "2004")]
    V2004,
}

impl ScormVersion {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "1.2" => Some(Self::V1_2),
            "2004" => Some(Self::V2004),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::V1_2 => "1.2",
            Self::V2004 => "2004",
        }
    }
}

impl fmt::Display for ScormVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ============================================================================
// Identifiers
// ============================================================================

/// Learner identity supplied by the surrounding platform's identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LearnerId(pub String);

/// Identifier of a content package in the external package store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId(pub String);

/// Opaque client-generated id, stable for the life of one browser tab's
/// launch. Sequence numbers are scoped to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnrollmentId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptId(pub Uuid);

impl fmt::Display for LearnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Status enums
// ============================================================================

/// Lifetime status of a (learner, content) enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrollmentStatus {
    #[serde(rename = "not-started")]
    NotStarted,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "completed")]
    Completed,
}

impl EnrollmentStatus {
    pub fn token(&self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }
}

/// SCORM 2004 `cmi.completion_status` token set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionStatus {
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "incomplete")]
    Incomplete,
    #[serde(rename = "not attempted")]
    NotAttempted,
    #[serde(rename = "unknown")]
    Unknown,
}

impl CompletionStatus {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "completed" => Some(Self::Completed),
            "incomplete" => Some(Self::Incomplete),
            "not attempted" => Some(Self::NotAttempted),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Incomplete => "incomplete",
            Self::NotAttempted => "not attempted",
            Self::Unknown => "unknown",
        }
    }
}

/// SCORM 2004 `cmi.success_status` token set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuccessStatus {
    #[serde(rename = "passed")]
    Passed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "unknown")]
    Unknown,
}

impl SuccessStatus {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "passed" => Some(Self::Passed),
            "failed" => Some(Self::Failed),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

/// SCORM 1.2 `cmi.core.lesson_status` token set. The single field carries
/// both completion and pass/fail in 1.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LessonStatus {
    #[serde(rename = "passed")]
    Passed,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "incomplete")]
    Incomplete,
    #[serde(rename = "browsed")]
    Browsed,
    #[serde(rename = "not attempted")]
    NotAttempted,
}

impl LessonStatus {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "passed" => Some(Self::Passed),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "incomplete" => Some(Self::Incomplete),
            "browsed" => Some(Self::Browsed),
            "not attempted" => Some(Self::NotAttempted),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Incomplete => "incomplete",
            Self::Browsed => "browsed",
            Self::NotAttempted => "not attempted",
        }
    }
}

/// Whether a launch starts fresh or continues a prior session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryMode {
    #[serde(rename = "ab-initio")]
    AbInitio,
    #[serde(rename = "resume")]
    Resume,
}

impl EntryMode {
    pub fn token(&self) -> &'static str {
        match self {
            Self::AbInitio => "ab-initio",
            Self::Resume => "resume",
        }
    }
}

/// How an attempt ended, per the last committed `cmi(.core).exit` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitMode {
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "suspend")]
    Suspend,
    #[serde(rename = "logout")]
    Logout,
    #[serde(rename = "time-out")]
    TimeOut,
}

impl ExitMode {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "" | "normal" => Some(Self::Normal),
            "suspend" => Some(Self::Suspend),
            "logout" => Some(Self::Logout),
            "time-out" => Some(Self::TimeOut),
            _ => None,
        }
    }
}

// ============================================================================
// Score
// ============================================================================

/// Score fields as reported by content. `scaled` only exists in SCORM 2004.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub raw: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub scaled: Option<f64>,
}

impl Score {
    pub fn is_empty(&self) -> bool {
        self.raw.is_none() && self.min.is_none() && self.max.is_none() && self.scaled.is_none()
    }

    /// Overlay later-reported fields onto an existing score.
    pub fn merge(&mut self, other: &Score) {
        if other.raw.is_some() {
            self.raw = other.raw;
        }
        if other.min.is_some() {
            self.min = other.min;
        }
        if other.max.is_some() {
            self.max = other.max;
        }
        if other.scaled.is_some() {
            self.scaled = other.scaled;
        }
    }
}
