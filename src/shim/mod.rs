//! In-process RTE API surface.
//!
//! The protocol-fixed Get/Set/Commit/Terminate method surface content
//! packages call, backed by a local write buffer that flushes whole batches
//! through a [`CommitSink`]. The embedding context receives an explicit API
//! handle rather than discovering a process-wide singleton. One generic
//! session drives both versions; `Scorm12Api` and `Scorm2004Api` are thin
//! wrappers exposing the exact protocol method names.

use crate::core::{ContentId, LearnerId, Result, ScormVersion, SessionId};
use crate::engine::{CommitHandler, CommitRequest, CommitResponse, LaunchResponse, TerminateResponse};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

// ============================================================================
// Delivery seam
// ============================================================================

/// Where the shim's buffered batches go. The engine-side commit handler is
/// the production implementation; tests substitute flaky or recording sinks.
#[async_trait]
pub trait CommitSink: Send + Sync {
    async fn deliver(
        &self,
        learner: &LearnerId,
        content: &ContentId,
        request: CommitRequest,
    ) -> Result<CommitResponse>;

    async fn close(
        &self,
        learner: &LearnerId,
        content: &ContentId,
        session: &SessionId,
    ) -> Result<TerminateResponse>;
}

#[async_trait]
impl CommitSink for CommitHandler {
    async fn deliver(
        &self,
        learner: &LearnerId,
        content: &ContentId,
        request: CommitRequest,
    ) -> Result<CommitResponse> {
        self.commit(learner, content, request).await
    }

    async fn close(
        &self,
        learner: &LearnerId,
        content: &ContentId,
        session: &SessionId,
    ) -> Result<TerminateResponse> {
        self.terminate(learner, content, &session.0).await
    }
}

#[async_trait]
impl<S: CommitSink + ?Sized> CommitSink for Arc<S> {
    async fn deliver(
        &self,
        learner: &LearnerId,
        content: &ContentId,
        request: CommitRequest,
    ) -> Result<CommitResponse> {
        (**self).deliver(learner, content, request).await
    }

    async fn close(
        &self,
        learner: &LearnerId,
        content: &ContentId,
        session: &SessionId,
    ) -> Result<TerminateResponse> {
        (**self).close(learner, content, session).await
    }
}

// ============================================================================
// Error codes
// ============================================================================

/// Internal fault classification; the protocol code differs per version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    None,
    General,
    InvalidArgument,
    NotInitialized,
    AlreadyInitialized,
    AfterTermination,
    ReadOnly,
    Undefined,
}

fn fault_code(version: ScormVersion, fault: Fault) -> u16 {
    match version {
        ScormVersion::V1_2 => match fault {
            Fault::None => 0,
            Fault::General | Fault::AlreadyInitialized | Fault::AfterTermination => 101,
            Fault::InvalidArgument => 201,
            Fault::NotInitialized => 301,
            Fault::Undefined => 401,
            Fault::ReadOnly => 403,
        },
        ScormVersion::V2004 => match fault {
            Fault::None => 0,
            Fault::General => 101,
            Fault::AlreadyInitialized => 103,
            Fault::AfterTermination => 113,
            Fault::NotInitialized => 122,
            Fault::InvalidArgument => 201,
            Fault::Undefined => 401,
            Fault::ReadOnly => 404,
        },
    }
}

fn fault_string(fault: Fault) -> &'static str {
    match fault {
        Fault::None => "No error",
        Fault::General => "General exception",
        Fault::InvalidArgument => "Invalid argument",
        Fault::NotInitialized => "Not initialized",
        Fault::AlreadyInitialized => "Already initialized",
        Fault::AfterTermination => "Session already terminated",
        Fault::ReadOnly => "Element is read only",
        Fault::Undefined => "Undefined data model element",
    }
}

// ============================================================================
// Generic session
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    NotInitialized,
    Running,
    Terminated,
}

/// One content session: local element cache, dirty-write buffer, sequence
/// counter, last-error state.
struct RteSession<S: CommitSink> {
    sink: S,
    learner: LearnerId,
    content: ContentId,
    version: ScormVersion,
    session: SessionId,
    sequence: u64,
    values: BTreeMap<String, String>,
    dirty: BTreeMap<String, String>,
    phase: Phase,
    fault: Fault,
    diagnostic: String,
}

impl<S: CommitSink> RteSession<S> {
    fn new(
        sink: S,
        learner: LearnerId,
        content: ContentId,
        version: ScormVersion,
        launch: &LaunchResponse,
    ) -> Self {
        let mut values = BTreeMap::new();
        match version {
            ScormVersion::V1_2 => {
                values.insert("cmi.core.entry".into(), launch.entry.clone());
                values.insert("cmi.core.lesson_location".into(), launch.lesson_location.clone());
                values.insert("cmi.suspend_data".into(), launch.suspend_data.clone());
                values.insert("cmi.core.lesson_status".into(), "not attempted".into());
            }
            ScormVersion::V2004 => {
                values.insert("cmi.entry".into(), launch.entry.clone());
                values.insert("cmi.location".into(), launch.lesson_location.clone());
                values.insert("cmi.suspend_data".into(), launch.suspend_data.clone());
                values.insert("cmi.completion_status".into(), "unknown".into());
            }
        }
        Self {
            sink,
            learner,
            content,
            version,
            session: SessionId(launch.session_id.clone()),
            sequence: 0,
            values,
            dirty: BTreeMap::new(),
            phase: Phase::NotInitialized,
            fault: Fault::None,
            diagnostic: String::new(),
        }
    }

    fn ok(&mut self) -> bool {
        self.fault = Fault::None;
        true
    }

    fn fail(&mut self, fault: Fault, diagnostic: impl Into<String>) -> bool {
        self.fault = fault;
        self.diagnostic = diagnostic.into();
        false
    }

    fn initialize(&mut self, param: &str) -> bool {
        if !param.is_empty() {
            return self.fail(Fault::InvalidArgument, "parameter must be \"\"");
        }
        match self.phase {
            Phase::NotInitialized => {
                self.phase = Phase::Running;
                self.ok()
            }
            Phase::Running => self.fail(Fault::AlreadyInitialized, "Initialize called twice"),
            Phase::Terminated => self.fail(Fault::AfterTermination, "session is over"),
        }
    }

    fn get_value(&mut self, element: &str) -> String {
        if self.phase != Phase::Running {
            self.fail(Fault::NotInitialized, format!("GetValue('{element}')"));
            return String::new();
        }
        match self.values.get(element).cloned() {
            Some(value) => {
                self.ok();
                value
            }
            None => {
                self.fail(Fault::Undefined, format!("no value for '{element}'"));
                String::new()
            }
        }
    }

    fn set_value(&mut self, element: &str, value: &str) -> bool {
        if self.phase != Phase::Running {
            return self.fail(Fault::NotInitialized, format!("SetValue('{element}')"));
        }
        if element.is_empty() {
            return self.fail(Fault::InvalidArgument, "empty element name");
        }
        if crate::cmi::schema::is_read_only(element) || is_lms_owned(self.version, element) {
            return self.fail(Fault::ReadOnly, format!("'{element}' is LMS-owned"));
        }
        self.values.insert(element.to_string(), value.to_string());
        self.dirty.insert(element.to_string(), value.to_string());
        self.ok()
    }

    /// Flush the dirty buffer as one batch. A clean buffer is a successful
    /// no-op. On delivery failure both the buffer and the sequence number are
    /// kept, so the next commit resends the same elements under the same
    /// sequence and the server-side watermark can absorb a late duplicate.
    async fn commit(&mut self, param: &str) -> bool {
        if !param.is_empty() {
            return self.fail(Fault::InvalidArgument, "parameter must be \"\"");
        }
        if self.phase != Phase::Running {
            return self.fail(Fault::NotInitialized, "Commit outside a session");
        }
        if self.dirty.is_empty() {
            return self.ok();
        }
        let sequence = self.sequence + 1;
        let request = CommitRequest {
            session_id: self.session.0.clone(),
            sequence,
            scorm_version: self.version.tag().to_string(),
            cmi: self.dirty.clone(),
        };
        match self
            .sink
            .deliver(&self.learner, &self.content, request)
            .await
        {
            Ok(_) => {
                self.sequence = sequence;
                self.dirty.clear();
                self.ok()
            }
            Err(err) => self.fail(Fault::General, err.to_string()),
        }
    }

    async fn terminate(&mut self, param: &str) -> bool {
        if !param.is_empty() {
            return self.fail(Fault::InvalidArgument, "parameter must be \"\"");
        }
        match self.phase {
            Phase::NotInitialized => self.fail(Fault::NotInitialized, "Terminate before Initialize"),
            Phase::Terminated => self.fail(Fault::AfterTermination, "Terminate called twice"),
            Phase::Running => {
                // Last commit before the shutdown handshake.
                if !self.dirty.is_empty() && !self.commit("").await {
                    return false;
                }
                self.phase = Phase::Terminated;
                match self
                    .sink
                    .close(&self.learner, &self.content, &self.session)
                    .await
                {
                    Ok(_) => self.ok(),
                    Err(err) => self.fail(Fault::General, err.to_string()),
                }
            }
        }
    }

    fn last_error(&self) -> String {
        fault_code(self.version, self.fault).to_string()
    }

    fn error_string(&self, code: &str) -> String {
        let known = [
            Fault::None,
            Fault::General,
            Fault::InvalidArgument,
            Fault::NotInitialized,
            Fault::AlreadyInitialized,
            Fault::AfterTermination,
            Fault::ReadOnly,
            Fault::Undefined,
        ];
        known
            .into_iter()
            .find(|f| fault_code(self.version, *f).to_string() == code)
            .map(fault_string)
            .unwrap_or("Unknown error code")
            .to_string()
    }

    fn diagnostic(&self) -> String {
        self.diagnostic.clone()
    }
}

/// Elements the LMS populates that content may read but never write.
fn is_lms_owned(version: ScormVersion, element: &str) -> bool {
    match version {
        ScormVersion::V1_2 => matches!(
            element,
            "cmi.core.entry"
                | "cmi.core.total_time"
                | "cmi.core.student_id"
                | "cmi.core.student_name"
                | "cmi.launch_data"
        ),
        ScormVersion::V2004 => matches!(
            element,
            "cmi.entry" | "cmi.total_time" | "cmi.learner_id" | "cmi.learner_name" | "cmi.launch_data"
        ),
    }
}

// ============================================================================
// Protocol-named surfaces
// ============================================================================

/// SCORM 1.2 RTE API. Method names are protocol-fixed.
#[allow(non_snake_case)]
pub struct Scorm12Api<S: CommitSink> {
    inner: RteSession<S>,
}

#[allow(non_snake_case)]
impl<S: CommitSink> Scorm12Api<S> {
    pub fn new(sink: S, learner: LearnerId, content: ContentId, launch: &LaunchResponse) -> Self {
        Self {
            inner: RteSession::new(sink, learner, content, ScormVersion::V1_2, launch),
        }
    }

    pub fn LMSInitialize(&mut self, param: &str) -> &'static str {
        bool_str(self.inner.initialize(param))
    }

    pub fn LMSGetValue(&mut self, element: &str) -> String {
        self.inner.get_value(element)
    }

    pub fn LMSSetValue(&mut self, element: &str, value: &str) -> &'static str {
        bool_str(self.inner.set_value(element, value))
    }

    pub async fn LMSCommit(&mut self, param: &str) -> &'static str {
        bool_str(self.inner.commit(param).await)
    }

    pub async fn LMSFinish(&mut self, param: &str) -> &'static str {
        bool_str(self.inner.terminate(param).await)
    }

    pub fn LMSGetLastError(&self) -> String {
        self.inner.last_error()
    }

    pub fn LMSGetErrorString(&self, code: &str) -> String {
        self.inner.error_string(code)
    }

    pub fn LMSGetDiagnostic(&self, _code: &str) -> String {
        self.inner.diagnostic()
    }
}

/// SCORM 2004 RTE API. Method names are protocol-fixed.
#[allow(non_snake_case)]
pub struct Scorm2004Api<S: CommitSink> {
    inner: RteSession<S>,
}

#[allow(non_snake_case)]
impl<S: CommitSink> Scorm2004Api<S> {
    pub fn new(sink: S, learner: LearnerId, content: ContentId, launch: &LaunchResponse) -> Self {
        Self {
            inner: RteSession::new(sink, learner, content, ScormVersion::V2004, launch),
        }
    }

    pub fn Initialize(&mut self, param: &str) -> &'static str {
        bool_str(self.inner.initialize(param))
    }

    pub fn GetValue(&mut self, element: &str) -> String {
        self.inner.get_value(element)
    }

    pub fn SetValue(&mut self, element: &str, value: &str) -> &'static str {
        bool_str(self.inner.set_value(element, value))
    }

    pub async fn Commit(&mut self, param: &str) -> &'static str {
        bool_str(self.inner.commit(param).await)
    }

    pub async fn Terminate(&mut self, param: &str) -> &'static str {
        bool_str(self.inner.terminate(param).await)
    }

    pub fn GetLastError(&self) -> String {
        self.inner.last_error()
    }

    pub fn GetErrorString(&self, code: &str) -> String {
        self.inner.error_string(code)
    }

    pub fn GetDiagnostic(&self, _code: &str) -> String {
        self.inner.diagnostic()
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
