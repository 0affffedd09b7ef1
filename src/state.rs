use crate::config::Config;
use crate::db::SharedGateway;
use crate::local_store::LocalStore;
use crate::middleware::RateLimiter;
use crate::services::admin_gate::AdminGate;
use crate::services::evaluations::EvaluationService;
use crate::web::admin::ClearConfirmations;
use crate::web::session::SessionManager;
use std::sync::Arc;

pub struct AppState {
    pub evaluations: EvaluationService,
    pub sessions: SessionManager,
    pub admin_gate: AdminGate,
    pub login_limiter: RateLimiter,
    pub clear_confirmations: ClearConfirmations,
    pub secure_cookies: bool,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: &Config, gateway: SharedGateway, store: LocalStore) -> SharedState {
        let admin_gate = AdminGate::new(store.clone(), config.admin_gate);
        Arc::new(AppState {
            evaluations: EvaluationService::new(gateway.clone(), store, config.timezone.clone()),
            sessions: SessionManager::new(
                config.session_key.clone(),
                config.auto_logout,
                gateway,
                admin_gate.clone(),
            ),
            admin_gate,
            // 5 password attempts per minute per client
            login_limiter: RateLimiter::new(5, 60),
            clear_confirmations: ClearConfirmations::default(),
            secure_cookies: config.secure_cookies,
        })
    }
}
