use crate::db::{Credentials, SharedGateway};
use crate::domain::models::UserRole;
use crate::domain::timeout::{TimeoutPolicy, TimerState};
use crate::error::AppError;
use crate::services::admin_gate::AdminGate;
use crate::services::inactivity::{InactivityTimer, TimeoutHooks};
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct SessionClaims {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub role: UserRole,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid token format")]
    Invalid,
    #[error("signature mismatch")]
    Signature,
    #[error("expired")]
    Expired,
    #[error("bad role")]
    Role,
}

pub fn sign_session(
    session_id: Uuid,
    user_id: Uuid,
    role: UserRole,
    key: &[u8],
) -> Result<String, SessionError> {
    let exp = Utc::now() + ChronoDuration::hours(24);
    let payload = format!(
        "{}|{}|{}|{}",
        session_id,
        user_id,
        role_string(role),
        exp.timestamp()
    );
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(payload.as_bytes());
    let sig = mac.finalize().into_bytes();
    Ok(format!(
        "{}.{}",
        general_purpose::STANDARD.encode(payload.as_bytes()),
        general_purpose::STANDARD.encode(sig)
    ))
}

pub fn verify_session(token: &str, key: &[u8]) -> Result<SessionClaims, SessionError> {
    let (payload_b64, sig_b64) = token.split_once('.').ok_or(SessionError::Invalid)?;
    let payload_bytes = general_purpose::STANDARD
        .decode(payload_b64)
        .map_err(|_| SessionError::Invalid)?;
    let sig_bytes = general_purpose::STANDARD
        .decode(sig_b64)
        .map_err(|_| SessionError::Invalid)?;

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(&payload_bytes);
    mac.verify_slice(&sig_bytes)
        .map_err(|_| SessionError::Signature)?;

    let payload = String::from_utf8(payload_bytes).map_err(|_| SessionError::Invalid)?;
    let pieces: Vec<&str> = payload.split('|').collect();
    let [session_id, user_id, role, exp] = pieces.as_slice() else {
        return Err(SessionError::Invalid);
    };
    let session_id = Uuid::parse_str(session_id).map_err(|_| SessionError::Invalid)?;
    let user_id = Uuid::parse_str(user_id).map_err(|_| SessionError::Invalid)?;
    let role = parse_role(role)?;
    let exp: i64 = exp.parse().map_err(|_| SessionError::Invalid)?;
    if Utc::now().timestamp() > exp {
        return Err(SessionError::Expired);
    }
    Ok(SessionClaims {
        session_id,
        user_id,
        role,
    })
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(val) = auth.to_str() {
            if let Some(bearer) = val.strip_prefix("Bearer ") {
                return Some(bearer.trim().to_string());
            }
        }
    }
    if let Some(cookie) = headers.get(axum::http::header::COOKIE) {
        if let Ok(val) = cookie.to_str() {
            for pair in val.split(';') {
                if let Some(rest) = pair.trim().strip_prefix("session=") {
                    return Some(rest.to_string());
                }
            }
        }
    }
    None
}

fn role_string(role: UserRole) -> &'static str {
    match role {
        UserRole::Admin => "ADMIN",
        UserRole::Operator => "OPERATOR",
    }
}

fn parse_role(raw: &str) -> Result<UserRole, SessionError> {
    match raw {
        "ADMIN" => Ok(UserRole::Admin),
        "OPERATOR" => Ok(UserRole::Operator),
        _ => Err(SessionError::Role),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub signed_in_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: TimerState,
    pub remaining_secs: u64,
    pub timeout_secs: u64,
    pub warning_lead_secs: u64,
}

struct LiveSession {
    session: Session,
    timer: InactivityTimer,
}

type SessionMap = RwLock<HashMap<Uuid, LiveSession>>;

/// Signed-in sessions, each with its own inactivity countdown.
///
/// A session leaves the map on explicit sign-out or when its countdown expires;
/// either way its admin grant is revoked with it.
pub struct SessionManager {
    key: Vec<u8>,
    policy: TimeoutPolicy,
    gateway: SharedGateway,
    admin_gate: AdminGate,
    live: Arc<SessionMap>,
}

struct SessionHooks {
    session_id: Uuid,
    live: Weak<SessionMap>,
    admin_gate: AdminGate,
}

#[async_trait]
impl TimeoutHooks for SessionHooks {
    async fn on_warning(&self, remaining: Duration) {
        tracing::info!(
            "Session {} idle, signing out in {}s",
            self.session_id,
            remaining.as_secs()
        );
    }

    async fn on_expired(&self) {
        tracing::info!("Session {} expired after inactivity", self.session_id);
    }

    async fn sign_out(&self) {
        let Some(live) = self.live.upgrade() else {
            return;
        };
        let removed = live.write().await.remove(&self.session_id);
        if removed.is_some() {
            revoke_gate(&self.admin_gate, self.session_id).await;
            tracing::info!("Session {} signed out for inactivity", self.session_id);
        }
    }
}

async fn revoke_gate(gate: &AdminGate, session_id: Uuid) {
    if let Err(e) = gate.revoke(&session_id.to_string()).await {
        tracing::warn!("Failed to revoke admin grant for {}: {}", session_id, e);
    }
}

impl SessionManager {
    pub fn new(
        key: Vec<u8>,
        policy: TimeoutPolicy,
        gateway: SharedGateway,
        admin_gate: AdminGate,
    ) -> Self {
        Self {
            key,
            policy,
            gateway,
            admin_gate,
            live: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Checks credentials against the gateway and starts a session with a fresh countdown.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<(String, Session), AppError> {
        let user = self
            .gateway
            .authenticate(credentials)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let session = Session {
            id: Uuid::new_v4(),
            user_id: user.id,
            email: user.email,
            role: user.role,
            signed_in_at: Utc::now(),
        };
        let token = sign_session(session.id, session.user_id, session.role, &self.key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("signing session: {e}")))?;

        let hooks = Arc::new(SessionHooks {
            session_id: session.id,
            live: Arc::downgrade(&self.live),
            admin_gate: self.admin_gate.clone(),
        });
        let timer = InactivityTimer::start(self.policy, hooks);
        self.live.write().await.insert(
            session.id,
            LiveSession {
                session: session.clone(),
                timer,
            },
        );

        tracing::info!("User {} signed in (session {})", session.user_id, session.id);
        Ok((token, session))
    }

    /// Resolves a token to a live, unexpired session without counting as activity.
    pub async fn current_session(&self, token: &str) -> Option<Session> {
        let claims = match verify_session(token, &self.key) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!("Session verification failed: {}", e);
                return None;
            }
        };
        let live = self.live.read().await;
        let entry = live.get(&claims.session_id)?;
        if entry.session.user_id != claims.user_id
            || entry.session.role != claims.role
            || entry.timer.state() == TimerState::Expired
        {
            return None;
        }
        Some(entry.session.clone())
    }

    /// False only when the gateway reports the account gone. An unreachable gateway keeps
    /// the session so offline capture still works.
    pub async fn account_exists(&self, user_id: Uuid) -> bool {
        match self.gateway.find_user(user_id).await {
            Ok(user) => user.is_some(),
            Err(e) => {
                tracing::warn!("User lookup failed, keeping session: {:#}", e);
                true
            }
        }
    }

    pub async fn touch(&self, session_id: Uuid) {
        if let Some(entry) = self.live.read().await.get(&session_id) {
            entry.timer.touch();
        }
    }

    pub async fn status(&self, session_id: Uuid) -> Option<SessionStatus> {
        let live = self.live.read().await;
        let timer = &live.get(&session_id)?.timer;
        Some(SessionStatus {
            state: timer.state(),
            remaining_secs: timer.remaining().as_secs(),
            timeout_secs: self.policy.timeout.as_secs(),
            warning_lead_secs: self.policy.warning_lead.as_secs(),
        })
    }

    /// Re-checks the session owner's password, for gates that need credential re-entry.
    pub async fn confirm_password(&self, session: &Session, password: &str) -> Result<(), AppError> {
        let credentials = Credentials {
            email: session.email.clone(),
            password: password.to_string(),
        };
        match self.gateway.authenticate(&credentials).await? {
            Some(user) if user.id == session.user_id => Ok(()),
            _ => Err(AppError::Unauthorized),
        }
    }

    pub async fn sign_out(&self, session_id: Uuid) -> bool {
        let removed = self.live.write().await.remove(&session_id);
        match removed {
            Some(entry) => {
                entry.timer.stop();
                revoke_gate(&self.admin_gate, session_id).await;
                tracing::info!("Session {} signed out", session_id);
                true
            }
            None => false,
        }
    }

    /// Stops every countdown; used on shutdown.
    pub async fn shutdown(&self) {
        let mut live = self.live.write().await;
        for (_, entry) in live.drain() {
            entry.timer.stop();
        }
    }

    pub async fn active_count(&self) -> usize {
        self.live.read().await.len()
    }
}

/// Extractor for signed-in requests. Each extraction counts as user activity.
pub struct AuthSession(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
    crate::state::SharedState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared_state = crate::state::SharedState::from_ref(state);

        let token = extract_token(&parts.headers).ok_or(AppError::Unauthorized)?;
        let session = shared_state
            .sessions
            .current_session(&token)
            .await
            .ok_or(AppError::Unauthorized)?;

        if !shared_state.sessions.account_exists(session.user_id).await {
            tracing::warn!("Account {} no longer exists, ending session", session.user_id);
            shared_state.sessions.sign_out(session.id).await;
            return Err(AppError::Unauthorized);
        }
        shared_state.sessions.touch(session.id).await;

        Ok(AuthSession(session))
    }
}

/// Operators can use the app but never the admin area, whatever the gate says.
pub fn require_admin(session: &Session) -> Result<(), AppError> {
    if session.role != UserRole::Admin {
        tracing::warn!("Session {} with role {:?} refused admin access", session.id, session.role);
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Signed-in admin request whose session also holds a live admin grant.
pub struct AdminSession(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
    crate::state::SharedState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthSession(session) = AuthSession::from_request_parts(parts, state).await?;
        require_admin(&session)?;
        let shared_state = crate::state::SharedState::from_ref(state);

        let now_ms = Utc::now().timestamp_millis();
        if !shared_state
            .admin_gate
            .is_open(&session.id.to_string(), now_ms)
            .await
        {
            tracing::warn!("Admin area refused for session {}", session.id);
            return Err(AppError::AdminGateClosed);
        }
        Ok(AdminSession(session))
    }
}
