//! In-memory sliding-window limiter for password attempts.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Clone)]
pub struct RateLimiter {
    attempts: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    max_attempts: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_attempts: usize, window_secs: u64) -> Self {
        Self {
            attempts: Arc::new(RwLock::new(HashMap::new())),
            max_attempts,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Records an attempt for `identifier` (IP, session id) and reports whether it is allowed.
    pub async fn check(&self, identifier: &str) -> bool {
        let now = Instant::now();
        let mut attempts = self.attempts.write().await;

        let history = attempts.entry(identifier.to_string()).or_default();
        history.retain(|&at| now.duration_since(at) < self.window);

        if history.len() < self.max_attempts {
            history.push(now);
            true
        } else {
            false
        }
    }

    /// Forgets `identifier` after a successful attempt.
    pub async fn reset(&self, identifier: &str) {
        self.attempts.write().await.remove(identifier);
    }

    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut attempts = self.attempts.write().await;
        attempts.retain(|_, history| {
            history.retain(|&at| now.duration_since(at) < self.window);
            !history.is_empty()
        });
        tracing::debug!("Rate limiter cleanup: {} active identifiers", attempts.len());
    }
}
