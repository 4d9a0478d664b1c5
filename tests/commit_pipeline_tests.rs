//! End-to-end commit pipeline tests: validation, idempotency, completion,
//! and enrollment aggregation through the commit handler.

use scormtrack::engine::{CommitHandler, CommitRequest, InMemoryContentPackages};
use scormtrack::store::TrackingStore;
use scormtrack::{ContentId, EnrollmentStatus, LearnerId, ScormVersion, TrackError};
use std::collections::BTreeMap;
use std::sync::Arc;

fn handler_with(content: &str, version: ScormVersion) -> CommitHandler {
    let mut packages = InMemoryContentPackages::new();
    packages.register(ContentId(content.into()), version, "index.html");
    CommitHandler::new(Arc::new(TrackingStore::new()), Arc::new(packages))
}

fn commit(session: &str, sequence: u64, version: &str, pairs: &[(&str, &str)]) -> CommitRequest {
    CommitRequest {
        session_id: session.to_string(),
        sequence,
        scorm_version: version.to_string(),
        cmi: pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

fn learner(id: &str) -> LearnerId {
    LearnerId(id.to_string())
}

#[tokio::test]
async fn failed_lesson_status_completes_a_12_attempt() {
    // Scenario: a learner attempted and failed a scored activity; 1.2 treats
    // that as finished.
    let handler = handler_with("c1", ScormVersion::V1_2);
    let learner = learner("u1");
    let content = ContentId("c1".into());

    let response = handler
        .commit(
            &learner,
            &content,
            commit("s1", 1, "1.2", &[("cmi.core.lesson_status", "failed")]),
        )
        .await
        .unwrap();

    assert!(response.accepted);
    assert!(response.attempt_complete);
    assert_eq!(response.enrollment_status, EnrollmentStatus::Completed);
}

#[tokio::test]
async fn success_status_alone_completes_a_2004_attempt() {
    let handler = handler_with("c1", ScormVersion::V2004);
    let learner = learner("u1");
    let content = ContentId("c1".into());

    let response = handler
        .commit(
            &learner,
            &content,
            commit(
                "s1",
                1,
                "2004",
                &[
                    ("cmi.completion_status", "incomplete"),
                    ("cmi.success_status", "passed"),
                ],
            ),
        )
        .await
        .unwrap();

    assert!(response.attempt_complete);
    assert_eq!(response.enrollment_status, EnrollmentStatus::Completed);
}

#[tokio::test]
async fn retried_commit_is_flagged_duplicate_and_mutates_nothing() {
    let handler = handler_with("c1", ScormVersion::V1_2);
    let learner = learner("u1");
    let content = ContentId("c1".into());

    let request = commit(
        "s1",
        5,
        "1.2",
        &[
            ("cmi.core.session_time", "0000:05:00.00"),
            ("cmi.core.score.raw", "70"),
        ],
    );
    let first = handler
        .commit(&learner, &content, request.clone())
        .await
        .unwrap();
    assert!(!first.duplicate);

    let summary_before = handler.summary(&learner, &content).await.unwrap();

    // Simulated network retry: identical session and sequence.
    let second = handler.commit(&learner, &content, request).await.unwrap();
    assert!(second.accepted);
    assert!(second.duplicate);

    let summary_after = handler.summary(&learner, &content).await.unwrap();
    assert_eq!(
        summary_before.cumulative_time_seconds,
        summary_after.cumulative_time_seconds
    );
    assert_eq!(summary_after.cumulative_time_seconds, 300);
}

#[tokio::test]
async fn applying_a_commit_twice_equals_applying_it_once() {
    let handler = handler_with("c1", ScormVersion::V2004);
    let learner = learner("u1");
    let content = ContentId("c1".into());

    let request = commit(
        "s1",
        1,
        "2004",
        &[
            ("cmi.completion_status", "completed"),
            ("cmi.score.raw", "88"),
            ("cmi.session_time", "PT10M"),
        ],
    );
    handler
        .commit(&learner, &content, request.clone())
        .await
        .unwrap();
    let once = handler.summary(&learner, &content).await.unwrap();

    handler.commit(&learner, &content, request).await.unwrap();
    let twice = handler.summary(&learner, &content).await.unwrap();

    assert_eq!(once.status, twice.status);
    assert_eq!(once.best_score, twice.best_score);
    assert_eq!(once.cumulative_time_seconds, twice.cumulative_time_seconds);
    assert_eq!(once.total_attempts, twice.total_attempts);
}

#[tokio::test]
async fn completion_never_reverts_on_a_later_commit() {
    let handler = handler_with("c1", ScormVersion::V1_2);
    let learner = learner("u1");
    let content = ContentId("c1".into());

    handler
        .commit(
            &learner,
            &content,
            commit("s1", 1, "1.2", &[("cmi.core.lesson_status", "completed")]),
        )
        .await
        .unwrap();

    // A stale in-flight commit arrives afterwards with a higher sequence.
    let response = handler
        .commit(
            &learner,
            &content,
            commit("s1", 2, "1.2", &[("cmi.core.lesson_status", "incomplete")]),
        )
        .await
        .unwrap();

    assert!(response.attempt_complete);
    assert_eq!(response.enrollment_status, EnrollmentStatus::Completed);
}

#[tokio::test]
async fn cumulative_time_sums_across_attempts() {
    // Scenario: attempt 1 totals 300s, attempt 2 totals 180s -> 480s.
    let handler = handler_with("c1", ScormVersion::V1_2);
    let learner = learner("u1");
    let content = ContentId("c1".into());

    handler
        .commit(
            &learner,
            &content,
            commit("s1", 1, "1.2", &[("cmi.core.session_time", "0000:05:00.00")]),
        )
        .await
        .unwrap();
    handler.terminate(&learner, &content, "s1").await.unwrap();

    handler
        .commit(
            &learner,
            &content,
            commit("s2", 1, "1.2", &[("cmi.core.session_time", "0000:03:00.00")]),
        )
        .await
        .unwrap();

    let summary = handler.summary(&learner, &content).await.unwrap();
    assert_eq!(summary.cumulative_time_seconds, 480);
    assert_eq!(summary.total_attempts, 2);
}

#[tokio::test]
async fn best_score_keeps_the_higher_value_across_attempts() {
    let handler = handler_with("c1", ScormVersion::V1_2);
    let learner = learner("u1");
    let content = ContentId("c1".into());

    handler
        .commit(
            &learner,
            &content,
            commit(
                "s1",
                1,
                "1.2",
                &[("cmi.core.lesson_status", "passed"), ("cmi.core.score.raw", "90")],
            ),
        )
        .await
        .unwrap();
    handler.terminate(&learner, &content, "s1").await.unwrap();

    handler
        .commit(
            &learner,
            &content,
            commit(
                "s2",
                1,
                "1.2",
                &[("cmi.core.lesson_status", "passed"), ("cmi.core.score.raw", "60")],
            ),
        )
        .await
        .unwrap();

    let summary = handler.summary(&learner, &content).await.unwrap();
    assert_eq!(summary.best_score, Some(90.0));
}

#[tokio::test]
async fn invalid_elements_warn_but_do_not_fail_the_commit() {
    let handler = handler_with("c1", ScormVersion::V1_2);
    let learner = learner("u1");
    let content = ContentId("c1".into());

    let response = handler
        .commit(
            &learner,
            &content,
            commit(
                "s1",
                1,
                "1.2",
                &[
                    ("cmi.core.lesson_status", "nonsense"),
                    ("cmi.core.score.raw", "85"),
                    ("cmi.vendor.extension", "kept-raw-only"),
                ],
            ),
        )
        .await
        .unwrap();

    assert!(response.accepted);
    assert!(!response.attempt_complete);
    assert_eq!(response.warnings.len(), 1);
    assert_eq!(response.warnings[0].element, "cmi.core.lesson_status");
}

#[tokio::test]
async fn raw_snapshot_retains_everything_for_audit() {
    let handler = handler_with("c1", ScormVersion::V1_2);
    let learner = learner("u1");
    let content = ContentId("c1".into());

    handler
        .commit(
            &learner,
            &content,
            commit(
                "s1",
                1,
                "1.2",
                &[
                    ("cmi.core.lesson_status", "nonsense"),
                    ("cmi.vendor.extension", "v"),
                ],
            ),
        )
        .await
        .unwrap();

    let store = handler.store();
    let enrollment = store.find_enrollment(&learner, &content).await.unwrap();
    let attempt = store.latest_open_attempt(enrollment.id).await.unwrap();
    assert_eq!(attempt.cmi_snapshot["cmi.core.lesson_status"], "nonsense");
    assert_eq!(attempt.cmi_snapshot["cmi.vendor.extension"], "v");
    assert_eq!(attempt.lesson_status, None);
}

#[tokio::test]
async fn interactions_accumulate_across_commits() {
    let handler = handler_with("c1", ScormVersion::V2004);
    let learner = learner("u1");
    let content = ContentId("c1".into());

    handler
        .commit(
            &learner,
            &content,
            commit("s1", 1, "2004", &[("cmi.interactions.0.id", "q1")]),
        )
        .await
        .unwrap();
    handler
        .commit(
            &learner,
            &content,
            commit(
                "s1",
                2,
                "2004",
                &[
                    ("cmi.interactions.0.result", "correct"),
                    ("cmi.interactions.1.id", "q2"),
                ],
            ),
        )
        .await
        .unwrap();

    let store = handler.store();
    let enrollment = store.find_enrollment(&learner, &content).await.unwrap();
    let attempt = store.latest_open_attempt(enrollment.id).await.unwrap();
    assert_eq!(attempt.interactions[&0]["id"], "q1");
    assert_eq!(attempt.interactions[&0]["result"], "correct");
    assert_eq!(attempt.interactions[&1]["id"], "q2");
}

#[tokio::test]
async fn protocol_errors_reject_the_whole_request() {
    let handler = handler_with("c1", ScormVersion::V1_2);
    let learner = learner("u1");
    let content = ContentId("c1".into());

    let err = handler
        .commit(&learner, &content, commit("", 1, "1.2", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackError::Protocol(_)));

    let err = handler
        .commit(&learner, &content, commit("s1", 0, "1.2", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackError::Protocol(_)));

    let err = handler
        .commit(&learner, &content, commit("s1", 1, "1.3", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackError::Protocol(_)));

    // No state was created by any of the rejected requests.
    assert!(handler.store().find_enrollment(&learner, &content).await.is_none());
}

#[tokio::test]
async fn unknown_content_is_rejected() {
    let handler = handler_with("c1", ScormVersion::V1_2);
    let err = handler
        .commit(
            &learner("u1"),
            &ContentId("missing".into()),
            commit("s1", 1, "1.2", &[]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TrackError::UnknownContent(_)));
}

#[tokio::test]
async fn terminate_records_the_committed_exit_mode() {
    let handler = handler_with("c1", ScormVersion::V2004);
    let learner = learner("u1");
    let content = ContentId("c1".into());

    handler
        .commit(
            &learner,
            &content,
            commit("s1", 1, "2004", &[("cmi.exit", "suspend")]),
        )
        .await
        .unwrap();
    handler.terminate(&learner, &content, "s1").await.unwrap();

    let store = handler.store();
    let enrollment = store.find_enrollment(&learner, &content).await.unwrap();
    let attempts = store.attempts_of(enrollment.id).await;
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].terminated);
    assert_eq!(attempts[0].exit_mode, Some(scormtrack::ExitMode::Suspend));
}

#[tokio::test]
async fn growing_session_time_raises_cumulative_time() {
    let handler = handler_with("c1", ScormVersion::V1_2);
    let learner = learner("u1");
    let content = ContentId("c1".into());

    handler
        .commit(
            &learner,
            &content,
            commit("s1", 1, "1.2", &[("cmi.core.session_time", "0000:05:00.00")]),
        )
        .await
        .unwrap();
    handler
        .commit(
            &learner,
            &content,
            commit("s1", 2, "1.2", &[("cmi.core.session_time", "0000:10:00.00")]),
        )
        .await
        .unwrap();

    let summary = handler.summary(&learner, &content).await.unwrap();
    assert_eq!(summary.cumulative_time_seconds, 600);
}

#[tokio::test]
async fn stale_session_terminate_leaves_the_new_attempt_open() {
    let handler = handler_with("c1", ScormVersion::V1_2);
    let learner = learner("u1");
    let content = ContentId("c1".into());

    let first = handler.launch(&learner, &content).await.unwrap();
    handler
        .terminate(&learner, &content, &first.session_id)
        .await
        .unwrap();
    let second = handler.launch(&learner, &content).await.unwrap();
    assert_ne!(second.session_id, first.session_id);

    // A dead tab's unload handler fires late with the old session id.
    let response = handler
        .terminate(&learner, &content, &first.session_id)
        .await
        .unwrap();
    assert!(response.terminated);

    let store = handler.store();
    let enrollment = store.find_enrollment(&learner, &content).await.unwrap();
    let open = store.latest_open_attempt(enrollment.id).await;
    assert_eq!(open.map(|a| a.session.0), Some(second.session_id));
}
