use crate::error::AppError;
use crate::services::evaluations::ClearReport;
use crate::state::SharedState;
use crate::web::session::{require_admin, AdminSession, AuthSession};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

const CONFIRMATION_TTL: Duration = Duration::from_secs(120);

/// Risk acknowledgements awaiting the password step of a bulk clear, one per session.
#[derive(Default)]
pub struct ClearConfirmations {
    pending: RwLock<HashMap<Uuid, (Uuid, Instant)>>,
}

impl ClearConfirmations {
    pub async fn issue(&self, session_id: Uuid) -> Uuid {
        let ticket = Uuid::new_v4();
        self.pending
            .write()
            .await
            .insert(session_id, (ticket, Instant::now()));
        ticket
    }

    /// Single use: the pending acknowledgement is consumed whether or not it matches.
    pub async fn redeem(&self, session_id: Uuid, ticket: Uuid) -> bool {
        match self.pending.write().await.remove(&session_id) {
            Some((issued, at)) => issued == ticket && at.elapsed() < CONFIRMATION_TTL,
            None => false,
        }
    }
}

#[derive(Deserialize)]
pub struct UnlockRequest {
    pub password: String,
}

#[derive(Serialize)]
pub struct GateStatus {
    pub open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_secs: Option<u64>,
}

#[derive(Deserialize)]
pub struct AcknowledgeRequest {
    pub acknowledge_irreversible: bool,
}

#[derive(Serialize)]
pub struct ClearTicket {
    pub confirmation: Uuid,
    pub expires_in_secs: u64,
}

#[derive(Deserialize)]
pub struct ClearRequest {
    pub confirmation: Uuid,
    pub password: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/unlock", post(unlock))
        .route("/lock", post(lock))
        .route("/status", get(status))
        .route("/clear/acknowledge", post(acknowledge_clear))
        .route("/clear", post(clear_all))
        .with_state(state)
}

/// Password re-entry in the rate limiter's per-session bucket.
async fn reenter_password(
    state: &SharedState,
    session: &crate::web::session::Session,
    password: &str,
) -> Result<(), AppError> {
    let bucket = format!("reauth:{}", session.id);
    if !state.login_limiter.check(&bucket).await {
        tracing::warn!("Password re-entry rate limit exceeded for session {}", session.id);
        return Err(AppError::RateLimited);
    }
    state
        .sessions
        .confirm_password(session, password)
        .await
        .map_err(|e| {
            tracing::warn!("Password re-entry refused for session {}", session.id);
            e
        })?;
    state.login_limiter.reset(&bucket).await;
    Ok(())
}

async fn unlock(
    State(state): State<SharedState>,
    AuthSession(session): AuthSession,
    Json(payload): Json<UnlockRequest>,
) -> Result<Json<GateStatus>, AppError> {
    require_admin(&session)?;
    reenter_password(&state, &session, &payload.password).await?;
    state
        .admin_gate
        .grant(&session.id.to_string(), Utc::now().timestamp_millis())
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok(Json(GateStatus {
        open: true,
        expires_in_secs: Some(state.admin_gate.window().as_secs()),
    }))
}

async fn lock(
    State(state): State<SharedState>,
    AuthSession(session): AuthSession,
) -> Result<StatusCode, AppError> {
    state
        .admin_gate
        .revoke(&session.id.to_string())
        .await
        .map_err(|e| AppError::Internal(e.into()))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn status(
    State(state): State<SharedState>,
    AuthSession(session): AuthSession,
) -> Json<GateStatus> {
    let scope = session.id.to_string();
    let now_ms = Utc::now().timestamp_millis();
    let open = state.admin_gate.is_open(&scope, now_ms).await;
    let expires_in_secs = if open {
        state.admin_gate.remaining(&scope, now_ms).await.map(|d| d.as_secs())
    } else {
        None
    };
    Json(GateStatus {
        open,
        expires_in_secs,
    })
}

/// First phase of a bulk clear: the caller states they understand it cannot be undone.
async fn acknowledge_clear(
    State(state): State<SharedState>,
    AdminSession(session): AdminSession,
    Json(payload): Json<AcknowledgeRequest>,
) -> Result<Json<ClearTicket>, AppError> {
    if !payload.acknowledge_irreversible {
        return Err(AppError::BadRequest(
            "clearing all evaluations must be acknowledged as irreversible".to_string(),
        ));
    }
    let confirmation = state.clear_confirmations.issue(session.id).await;
    tracing::warn!("Session {} acknowledged bulk clear", session.id);
    Ok(Json(ClearTicket {
        confirmation,
        expires_in_secs: CONFIRMATION_TTL.as_secs(),
    }))
}

/// Second phase: password re-entry, then exactly one clear attempt. Failures are reported
/// as-is; the client decides whether to start over.
async fn clear_all(
    State(state): State<SharedState>,
    AdminSession(session): AdminSession,
    Json(payload): Json<ClearRequest>,
) -> Result<Json<ClearReport>, AppError> {
    if !state
        .clear_confirmations
        .redeem(session.id, payload.confirmation)
        .await
    {
        return Err(AppError::BadRequest(
            "missing or expired clear acknowledgement".to_string(),
        ));
    }
    reenter_password(&state, &session, &payload.password).await?;

    tracing::warn!("Session {} is clearing all evaluations", session.id);
    Ok(Json(state.evaluations.clear_all().await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_confirmation_is_single_use() {
        let confirmations = ClearConfirmations::default();
        let session = Uuid::new_v4();
        let ticket = confirmations.issue(session).await;

        assert!(!confirmations.redeem(Uuid::new_v4(), ticket).await);
        assert!(confirmations.redeem(session, ticket).await);
        assert!(!confirmations.redeem(session, ticket).await);
    }

    #[tokio::test]
    async fn test_wrong_ticket_burns_acknowledgement() {
        let confirmations = ClearConfirmations::default();
        let session = Uuid::new_v4();
        let ticket = confirmations.issue(session).await;

        assert!(!confirmations.redeem(session, Uuid::new_v4()).await);
        assert!(!confirmations.redeem(session, ticket).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_expires() {
        let confirmations = ClearConfirmations::default();
        let session = Uuid::new_v4();
        let ticket = confirmations.issue(session).await;

        tokio::time::advance(CONFIRMATION_TTL).await;
        assert!(!confirmations.redeem(session, ticket).await);
    }
}
