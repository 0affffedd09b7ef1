use crate::db::Credentials;
use crate::domain::models::UserRole;
use crate::error::AppError;
use crate::state::SharedState;
use crate::web::session::{self, AuthSession, SessionStatus};
use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub token: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<session::Session>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer: Option<SessionStatus>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(session_status))
        .route("/activity", post(activity))
        .with_state(state)
}

fn session_cookie(value: &str, max_age: Option<u64>, secure: bool) -> Result<HeaderValue, AppError> {
    let secure_flag = if secure { "; Secure" } else { "" };
    let max_age = max_age.map_or(String::new(), |secs| format!("; Max-Age={secs}"));
    format!("session={value}; HttpOnly; SameSite=Lax; Path=/{max_age}{secure_flag}")
        .parse()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid cookie header: {e}")))
}

async fn login(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    // Requests without peer info (tests, unix sockets) share one bucket.
    let ip = connect_info.map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.ip().to_string());
    if !state.login_limiter.check(&ip).await {
        tracing::warn!("Login rate limit exceeded for IP: {}", ip);
        return Err(AppError::RateLimited);
    }

    let credentials = Credentials {
        email: payload.email,
        password: payload.password,
    };
    let (token, session) = state.sessions.sign_in(&credentials).await.map_err(|e| {
        if matches!(e, AppError::Unauthorized) {
            tracing::warn!("Failed login for {}", credentials.email);
        }
        e
    })?;
    state.login_limiter.reset(&ip).await;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&token, None, state.secure_cookies)?,
    );
    let resp = LoginResponse {
        session_id: session.id,
        user_id: session.user_id,
        email: session.email,
        role: session.role,
        token,
    };
    Ok((headers, Json(resp)))
}

async fn logout(
    State(state): State<SharedState>,
    AuthSession(session): AuthSession,
) -> Result<impl IntoResponse, AppError> {
    state.sessions.sign_out(session.id).await;
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie("", Some(0), state.secure_cookies)?,
    );
    Ok((headers, StatusCode::NO_CONTENT))
}

/// Polled by the client countdown, so it reads the token itself instead of counting as activity.
async fn session_status(State(state): State<SharedState>, headers: HeaderMap) -> Json<SessionResponse> {
    let current = match session::extract_token(&headers) {
        Some(token) => state.sessions.current_session(&token).await,
        None => None,
    };
    let Some(current) = current else {
        return Json(SessionResponse {
            authenticated: false,
            session: None,
            timer: None,
        });
    };
    let timer = state.sessions.status(current.id).await;
    Json(SessionResponse {
        authenticated: timer.is_some(),
        session: Some(current),
        timer,
    })
}

/// Heartbeat for client-side activity (pointer, keys, scroll). The extractor does the touch.
async fn activity(
    State(state): State<SharedState>,
    AuthSession(session): AuthSession,
) -> Result<Json<SessionStatus>, AppError> {
    state
        .sessions
        .status(session.id)
        .await
        .map(Json)
        .ok_or(AppError::Unauthorized)
}
