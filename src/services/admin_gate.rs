use crate::domain::timeout::TimeoutPolicy;
use crate::local_store::{keys, LocalStore, StoreError};
use std::time::Duration;

/// Re-authentication gate for the admin area.
///
/// A grant is a flag plus an epoch-ms timestamp in the local store, evaluated lazily on
/// entry. Anything missing or unparseable reads as closed.
#[derive(Clone)]
pub struct AdminGate {
    store: LocalStore,
    policy: TimeoutPolicy,
}

impl AdminGate {
    pub fn new(store: LocalStore, policy: TimeoutPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn grant(&self, scope: &str, now_ms: i64) -> Result<(), StoreError> {
        self.store.set(&keys::admin_auth(scope), "true").await?;
        self.store
            .set(&keys::admin_auth_time(scope), now_ms.to_string())
            .await?;
        tracing::info!("Admin access granted for session {}", scope);
        Ok(())
    }

    pub async fn is_open(&self, scope: &str, now_ms: i64) -> bool {
        let flag = self.store.get(&keys::admin_auth(scope)).await;
        let granted_at = self.store.get(&keys::admin_auth_time(scope)).await;

        let live = match (flag.as_deref(), granted_at) {
            (Some("true"), Some(raw)) => match raw.trim().parse::<i64>() {
                Ok(ts) => self.policy.grant_is_live(ts, now_ms),
                Err(_) => {
                    tracing::warn!("Admin grant timestamp for {} is unparseable", scope);
                    false
                }
            },
            _ => false,
        };

        if !live && flag.is_some() {
            if let Err(e) = self.revoke(scope).await {
                tracing::warn!("Failed to drop stale admin grant for {}: {}", scope, e);
            }
        }
        live
    }

    pub fn window(&self) -> Duration {
        self.policy.timeout
    }

    /// Time left on a grant that is open right now.
    pub async fn remaining(&self, scope: &str, now_ms: i64) -> Option<Duration> {
        if !self.is_open(scope, now_ms).await {
            return None;
        }
        let granted_at: i64 = self
            .store
            .get(&keys::admin_auth_time(scope))
            .await?
            .trim()
            .parse()
            .ok()?;
        let elapsed = Duration::from_millis(u64::try_from(now_ms - granted_at).ok()?);
        Some(self.policy.remaining(elapsed))
    }

    pub async fn revoke(&self, scope: &str) -> Result<(), StoreError> {
        self.store.remove(&keys::admin_auth(scope)).await?;
        self.store.remove(&keys::admin_auth_time(scope)).await?;
        Ok(())
    }

    /// Drops every grant that would no longer open the gate. Returns how many went away.
    pub async fn purge_expired(&self, now_ms: i64) -> Result<usize, StoreError> {
        let mut purged = 0;
        for key in self.store.keys_with_prefix(keys::ADMIN_AUTH_PREFIX).await {
            let scope = &key[keys::ADMIN_AUTH_PREFIX.len()..];
            if !self.is_open(scope, now_ms).await {
                purged += 1;
            }
        }
        // Orphaned timestamps without a flag.
        for key in self.store.keys_with_prefix(keys::ADMIN_AUTH_TIME_PREFIX).await {
            let scope = &key[keys::ADMIN_AUTH_TIME_PREFIX.len()..];
            if self.store.get(&keys::admin_auth(scope)).await.is_none() {
                self.store.remove(&key).await?;
            }
        }
        Ok(purged)
    }
}
