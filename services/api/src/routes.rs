use crate::infra::{AppState, UploadRejection};
use axum::extract::{DefaultBodyLimit, Multipart};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use career_intake::intake::StagedResumeRef;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

/// Upload size cap for a single resume.
pub(crate) const MAX_RESUME_BYTES: usize = 5 * 1024 * 1024;

const RESUME_FIELD: &str = "resume";

#[derive(Debug, Serialize)]
pub(crate) struct ResumeUploadResponse {
    pub(crate) resume_ref: StagedResumeRef,
}

/// Health, readiness, metrics, and the resume upload shared by every track.
pub(crate) fn with_operational_routes(router: Router) -> Router {
    router
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route(
            "/api/v1/careers/resumes",
            post(upload_resume).layer(DefaultBodyLimit::max(MAX_RESUME_BYTES)),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn bad_request(reason: impl Into<String>) -> Response {
    let payload = json!({ "status": "error", "reason": reason.into() });
    (StatusCode::BAD_REQUEST, Json(payload)).into_response()
}

/// Stage an uploaded PDF and hand back the ref to submit with the application.
pub(crate) async fn upload_resume(
    Extension(state): Extension<AppState>,
    mut multipart: Multipart,
) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return bad_request(format!("missing '{RESUME_FIELD}' file field")),
            Err(err) => return bad_request(format!("invalid multipart request: {err}")),
        };
        if field.name() != Some(RESUME_FIELD) {
            continue;
        }

        let Some(file_name) = field.file_name().map(str::to_string) else {
            return bad_request("resume field has no file name");
        };
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => return bad_request(format!("could not read resume: {err}")),
        };

        return match state.resumes.stage_upload(&file_name, &bytes) {
            Ok(resume_ref) => {
                (StatusCode::CREATED, Json(ResumeUploadResponse { resume_ref })).into_response()
            }
            Err(err) => {
                if matches!(err, UploadRejection::Storage(_)) {
                    warn!(error = %err, "resume upload could not be stored");
                }
                let payload = json!({ "status": "error", "reason": err.to_string() });
                (err.status_code(), Json(payload)).into_response()
            }
        };
    }
}
