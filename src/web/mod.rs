//! HTTP boundary for the tracking engine.
//!
//! Routes are scoped per content package, mirroring the shim's wire
//! protocol:
//!
//! - `POST /{content_id}/launch`    -> entry mode + bookmark + session id
//! - `POST /{content_id}/progress`  -> batched CMI commit
//! - `POST /{content_id}/terminate` -> close the session's attempt
//! - `GET  /{content_id}/summary`   -> gradebook read surface
//!
//! The acting learner comes from the `X-Learner-Id` header supplied by the
//! platform's identity layer.

use crate::core::{ContentId, LearnerId, TrackError};
use crate::engine::{CommitHandler, CommitRequest};
use axum::async_trait;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub const LEARNER_HEADER: &str = "x-learner-id";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub retryable: bool,
}

#[derive(Debug)]
pub struct WebError(pub TrackError);

impl From<TrackError> for WebError {
    fn from(err: TrackError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let retryable = self.0.is_retryable();
        let (status, code) = match &self.0 {
            TrackError::Protocol(_) => (StatusCode::BAD_REQUEST, "protocol_error"),
            TrackError::UnknownContent(_) => (StatusCode::NOT_FOUND, "not_found"),
            TrackError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            TrackError::Storage(_) | TrackError::SnapshotIo(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable")
            }
            TrackError::SnapshotCodec(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            code: code.to_string(),
            retryable,
        });
        (status, body).into_response()
    }
}

type WebResult<T> = std::result::Result<T, WebError>;

/// Learner identity extractor. The surrounding platform authenticates the
/// request and forwards the learner id in a header; a missing header is a
/// protocol error, not an auth failure we can diagnose here.
pub struct Learner(pub LearnerId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Learner {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(LEARNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                WebError(TrackError::Protocol(format!("missing {LEARNER_HEADER} header")))
            })?;
        Ok(Self(LearnerId(value.to_string())))
    }
}

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<CommitHandler>,
}

/// Build the engine's router.
pub fn router(handler: Arc<CommitHandler>) -> Router {
    Router::new()
        .route("/:content_id/launch", post(launch))
        .route("/:content_id/progress", post(progress))
        .route("/:content_id/terminate", post(terminate))
        .route("/:content_id/summary", get(summary))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { handler })
}

async fn launch(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
    Learner(learner): Learner,
) -> WebResult<Response> {
    let response = state
        .handler
        .launch(&learner, &ContentId(content_id))
        .await?;
    Ok(Json(response).into_response())
}

async fn progress(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
    Learner(learner): Learner,
    Json(request): Json<CommitRequest>,
) -> WebResult<Response> {
    let response = state
        .handler
        .commit(&learner, &ContentId(content_id), request)
        .await?;
    Ok(Json(response).into_response())
}

#[derive(Debug, Deserialize)]
struct TerminateBody {
    session_id: String,
}

async fn terminate(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
    Learner(learner): Learner,
    Json(body): Json<TerminateBody>,
) -> WebResult<Response> {
    let response = state
        .handler
        .terminate(&learner, &ContentId(content_id), &body.session_id)
        .await?;
    Ok(Json(response).into_response())
}

async fn summary(
    State(state): State<AppState>,
    Path(content_id): Path<String>,
    Learner(learner): Learner,
) -> WebResult<Response> {
    let response = state
        .handler
        .summary(&learner, &ContentId(content_id))
        .await?;
    Ok(Json(response).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_retryable_503() {
        let response = WebError(TrackError::Storage("down".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn protocol_errors_are_400() {
        let response = WebError(TrackError::Protocol("missing session_id".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unknown_content_is_404() {
        let response = WebError(TrackError::UnknownContent("c9".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
