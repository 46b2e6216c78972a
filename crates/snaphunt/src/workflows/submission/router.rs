use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::domain::{HuntId, SubmissionOutcome, UserId};
use super::ledger::{CompletionLedger, HuntCatalog};
use super::oracle::ValidationOracle;
use super::service::{PhotoSubmissionService, SubmissionError, ValidationView};
use super::storage::ObjectStore;

/// Header carrying the externally-authenticated actor identity.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Router builder exposing the submission workflow over HTTP.
pub fn submission_router<C, S, O, L>(
    service: Arc<PhotoSubmissionService<C, S, O, L>>,
) -> Router
where
    C: HuntCatalog + 'static,
    S: ObjectStore + 'static,
    O: ValidationOracle + 'static,
    L: CompletionLedger + 'static,
{
    Router::new()
        .route(
            "/api/v1/hunts/:hunt_id/submissions",
            post(submit_handler::<C, S, O, L>),
        )
        .route(
            "/api/v1/hunts/:hunt_id/completion",
            get(completion_handler::<C, S, O, L>),
        )
        .with_state(service)
}

pub(crate) async fn submit_handler<C, S, O, L>(
    State(service): State<Arc<PhotoSubmissionService<C, S, O, L>>>,
    Path(hunt_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    C: HuntCatalog + 'static,
    S: ObjectStore + 'static,
    O: ValidationOracle + 'static,
    L: CompletionLedger + 'static,
{
    let Some(user_id) = user_from_headers(&headers) else {
        return unauthorized_response();
    };
    let hunt_id = HuntId(hunt_id);

    // The oracle leg can block for seconds; keep it off the async runtime.
    let worker = service.clone();
    let result = tokio::task::spawn_blocking(move || {
        worker.submit(&user_id, &hunt_id, &body).map(|outcome| {
            let payload = match &outcome {
                SubmissionOutcome::Committed {
                    completion,
                    validation,
                } => json!({
                    "outcome": outcome.label(),
                    "completion": worker.completion_view(completion),
                    "validation": ValidationView::from_record(validation),
                }),
                SubmissionOutcome::Rejected { validation } => json!({
                    "outcome": outcome.label(),
                    "validation": ValidationView::from_record(validation),
                }),
            };
            let status = match outcome {
                SubmissionOutcome::Committed { .. } => StatusCode::CREATED,
                SubmissionOutcome::Rejected { .. } => StatusCode::OK,
            };
            (status, payload)
        })
    })
    .await;

    match result {
        Ok(Ok((status, payload))) => (status, axum::Json(payload)).into_response(),
        Ok(Err(err)) => submission_error_response(err),
        Err(join) => internal_error_response(&join.to_string()),
    }
}

pub(crate) async fn completion_handler<C, S, O, L>(
    State(service): State<Arc<PhotoSubmissionService<C, S, O, L>>>,
    Path(hunt_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    C: HuntCatalog + 'static,
    S: ObjectStore + 'static,
    O: ValidationOracle + 'static,
    L: CompletionLedger + 'static,
{
    let Some(user_id) = user_from_headers(&headers) else {
        return unauthorized_response();
    };
    let hunt_id = HuntId(hunt_id);

    let worker = service.clone();
    let result = tokio::task::spawn_blocking(move || {
        worker
            .completion(&user_id, &hunt_id)
            .map(|found| found.map(|completion| worker.completion_view(&completion)))
    })
    .await;

    match result {
        Ok(Ok(Some(view))) => (StatusCode::OK, axum::Json(view)).into_response(),
        Ok(Ok(None)) => {
            let payload = json!({
                "error": "no completion recorded for this hunt",
                "kind": "completion_not_found",
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Ok(Err(err)) => submission_error_response(err),
        Err(join) => internal_error_response(&join.to_string()),
    }
}

fn user_from_headers(headers: &HeaderMap) -> Option<UserId> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| UserId(value.to_string()))
}

fn submission_error_response(err: SubmissionError) -> Response {
    let (status, kind) = match &err {
        SubmissionError::HuntNotFound => (StatusCode::NOT_FOUND, "hunt_not_found"),
        SubmissionError::UnsupportedImage => {
            (StatusCode::UNPROCESSABLE_ENTITY, "unsupported_image")
        }
        SubmissionError::ValidationUnavailable(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "validation_unavailable")
        }
        SubmissionError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_failure"),
        SubmissionError::Ledger(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ledger_failure"),
    };

    let payload = json!({
        "error": err.to_string(),
        "kind": kind,
    });
    (status, axum::Json(payload)).into_response()
}

fn unauthorized_response() -> Response {
    let payload = json!({
        "error": format!("missing or empty {USER_ID_HEADER} header"),
        "kind": "unauthorized",
    });
    (StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response()
}

fn internal_error_response(message: &str) -> Response {
    let payload = json!({
        "error": message,
        "kind": "internal",
    });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
}
