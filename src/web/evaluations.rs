use crate::domain::models::{EvaluationDraft, EvaluationFilters};
use crate::error::AppError;
use crate::services::evaluations::{EvaluationListing, SubmissionReceipt};
use crate::state::SharedState;
use crate::web::session::AuthSession;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_evaluations).post(submit_evaluation))
        .with_state(state)
}

async fn submit_evaluation(
    State(state): State<SharedState>,
    AuthSession(session): AuthSession,
    payload: Result<Json<EvaluationDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmissionReceipt>), AppError> {
    // Score range and gender errors surface from serde; report them like other validation failures.
    let Json(draft) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let receipt = state.evaluations.submit(draft).await?;
    tracing::debug!(
        "Session {} submitted evaluation {}",
        session.id,
        receipt.evaluation.id
    );
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn list_evaluations(
    State(state): State<SharedState>,
    AuthSession(_): AuthSession,
    Query(filters): Query<EvaluationFilters>,
) -> Json<EvaluationListing> {
    Json(state.evaluations.list(&filters).await)
}
