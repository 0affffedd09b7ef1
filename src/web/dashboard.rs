use crate::domain::models::EvaluationFilters;
use crate::domain::nps::DateWindow;
use crate::error::AppError;
use crate::services::evaluations::{CompanyNps, NpsOverview, TodayStats};
use crate::state::SharedState;
use crate::web::session::{AdminSession, AuthSession};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub window: DateWindow,
    pub company_id: Option<Uuid>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/today", get(today))
        .route("/overview", get(overview))
        .route("/rankings", get(rankings))
        .with_state(state)
}

/// Counter shown on the home screen after each submission.
async fn today(State(state): State<SharedState>, AuthSession(_): AuthSession) -> Json<TodayStats> {
    Json(state.evaluations.today_stats(Utc::now()).await)
}

async fn overview(
    State(state): State<SharedState>,
    AdminSession(_): AdminSession,
    Query(query): Query<DashboardQuery>,
) -> Json<NpsOverview> {
    let filters = EvaluationFilters {
        company_id: query.company_id,
        ..Default::default()
    };
    Json(
        state
            .evaluations
            .overview(filters, query.window, Utc::now())
            .await,
    )
}

async fn rankings(
    State(state): State<SharedState>,
    AdminSession(_): AdminSession,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<Vec<CompanyNps>>, AppError> {
    Ok(Json(
        state
            .evaluations
            .company_rankings(query.window, Utc::now())
            .await?,
    ))
}
