use crate::domain::models::EvaluationFilters;
use crate::domain::nps::DateWindow;
use crate::error::AppError;
use crate::services::export::{self, ExportFormat};
use crate::state::SharedState;
use crate::time_utils;
use crate::web::session::AdminSession;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub format: Option<ExportFormat>,
    #[serde(default)]
    pub window: DateWindow,
    pub company_id: Option<Uuid>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(download))
        .with_state(state)
}

async fn download(
    State(state): State<SharedState>,
    AdminSession(session): AdminSession,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let format = query.format.unwrap_or(ExportFormat::Csv);
    let now = Utc::now();
    let tz = state.evaluations.timezone();

    let companies = state.evaluations.companies().await?;
    let company = match query.company_id {
        Some(id) => Some(
            companies
                .iter()
                .find(|c| c.id == id)
                .ok_or_else(|| AppError::NotFound(format!("company {id}")))?,
        ),
        None => None,
    };

    let filters = query.window.apply(
        EvaluationFilters {
            company_id: query.company_id,
            ..Default::default()
        },
        now,
        tz,
    );
    let listing = state.evaluations.list(&filters).await;

    let body = match format {
        ExportFormat::Csv => export::to_csv(&listing.evaluations, &companies, tz),
        ExportFormat::Json => export::to_json(&listing.evaluations)
            .map_err(|e| AppError::Internal(e.into()))?,
    };
    let file_name = export::file_name(company, time_utils::local_date(tz, now), format);

    tracing::info!(
        "Session {} exported {} evaluations as {}",
        session.id,
        listing.evaluations.len(),
        file_name
    );

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(format.content_type()),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{file_name}\"")
            .parse()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid file name header: {e}")))?,
    );
    Ok((headers, body))
}
