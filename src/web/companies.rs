use crate::domain::models::Company;
use crate::error::AppError;
use crate::state::SharedState;
use crate::web::session::AuthSession;
use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct SelectCompanyRequest {
    pub company_id: Uuid,
}

#[derive(Serialize)]
pub struct SelectedCompany {
    pub company: Option<Company>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_companies))
        .route("/selected", get(selected_company).put(select_company))
        .with_state(state)
}

async fn list_companies(
    State(state): State<SharedState>,
    AuthSession(_): AuthSession,
) -> Result<Json<Vec<Company>>, AppError> {
    Ok(Json(state.evaluations.companies().await?))
}

async fn selected_company(
    State(state): State<SharedState>,
    AuthSession(_): AuthSession,
) -> Result<Json<SelectedCompany>, AppError> {
    let companies = state.evaluations.companies().await?;
    Ok(Json(SelectedCompany {
        company: state.evaluations.selected_company(&companies).await,
    }))
}

async fn select_company(
    State(state): State<SharedState>,
    AuthSession(_): AuthSession,
    Json(payload): Json<SelectCompanyRequest>,
) -> Result<Json<SelectedCompany>, AppError> {
    let companies = state.evaluations.companies().await?;
    let company = companies
        .into_iter()
        .find(|c| c.id == payload.company_id)
        .ok_or_else(|| AppError::NotFound(format!("company {}", payload.company_id)))?;
    state.evaluations.remember_company(company.id).await?;
    Ok(Json(SelectedCompany {
        company: Some(company),
    }))
}
