use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{ApplicationPayload, StagedResumeRef};
use super::repository::{ApplicationRepository, Notifier, ResumeStore};
use super::service::{ApplicationWorkflow, FlowState, VerifyReceipt};

/// Submission body: the applicant email, the staged upload, and the track's fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest<P> {
    pub email: String,
    pub resume_ref: StagedResumeRef,
    #[serde(flatten)]
    pub application: P,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowStateView {
    pub email: String,
    pub state: FlowState,
}

/// Routes for one track under `/api/v1/careers/{track}`.
pub fn application_router<P, R, S, N>(workflow: Arc<ApplicationWorkflow<P, R, S, N>>) -> Router
where
    P: ApplicationPayload,
    R: ApplicationRepository<P> + 'static,
    S: ResumeStore + 'static,
    N: Notifier + 'static,
{
    let base = format!("/api/v1/careers/{}", P::TRACK.path_segment());
    Router::new()
        .route(&format!("{base}/apply"), post(submit_handler::<P, R, S, N>))
        .route(&format!("{base}/verify"), post(verify_handler::<P, R, S, N>))
        .route(
            &format!("{base}/applications/:email"),
            get(state_handler::<P, R, S, N>),
        )
        .with_state(workflow)
}

pub(crate) async fn submit_handler<P, R, S, N>(
    State(workflow): State<Arc<ApplicationWorkflow<P, R, S, N>>>,
    Json(request): Json<SubmitRequest<P>>,
) -> Response
where
    P: ApplicationPayload,
    R: ApplicationRepository<P> + 'static,
    S: ResumeStore + 'static,
    N: Notifier + 'static,
{
    let SubmitRequest {
        email,
        resume_ref,
        application,
    } = request;

    match workflow.submit(&email, application, resume_ref) {
        Ok(receipt) => (StatusCode::ACCEPTED, Json(receipt)).into_response(),
        Err(err) => {
            let payload = json!({
                "status": "error",
                "kind": err.kind(),
                "reason": err.to_string(),
            });
            (err.status_code(), Json(payload)).into_response()
        }
    }
}

pub(crate) async fn verify_handler<P, R, S, N>(
    State(workflow): State<Arc<ApplicationWorkflow<P, R, S, N>>>,
    Json(request): Json<VerifyRequest>,
) -> Response
where
    P: ApplicationPayload,
    R: ApplicationRepository<P> + 'static,
    S: ResumeStore + 'static,
    N: Notifier + 'static,
{
    match workflow.verify(&request.email, &request.code) {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(err) => (err.status_code(), Json(VerifyReceipt::from(&err))).into_response(),
    }
}

pub(crate) async fn state_handler<P, R, S, N>(
    State(workflow): State<Arc<ApplicationWorkflow<P, R, S, N>>>,
    Path(email): Path<String>,
) -> Response
where
    P: ApplicationPayload,
    R: ApplicationRepository<P> + 'static,
    S: ResumeStore + 'static,
    N: Notifier + 'static,
{
    match workflow.state(&email) {
        Ok(state) => (StatusCode::OK, Json(FlowStateView { email, state })).into_response(),
        Err(err) => {
            let payload = json!({
                "status": "error",
                "kind": err.kind(),
                "reason": err.reason(),
            });
            (err.status_code(), Json(payload)).into_response()
        }
    }
}
