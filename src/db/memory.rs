//! In-memory gateway for tests, with a switch that makes every call fail.

use super::{password_matches, Credentials, PersistenceGateway, UserAccount};
use crate::domain::models::{Company, Evaluation, EvaluationDraft, EvaluationFilters, UserRole};
use crate::domain::nps::matches_filters;
use anyhow::{bail, Result};
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryGateway {
    evaluations: RwLock<Vec<Evaluation>>,
    companies: RwLock<Vec<Company>>,
    users: RwLock<Vec<UserAccount>>,
    offline: AtomicBool,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn add_company(&self, name: &str) -> Company {
        let now = Utc::now();
        let company = Company {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug: super::seed::slugify(name),
            created_at: now,
            updated_at: now,
        };
        self.companies.write().await.push(company.clone());
        company
    }

    pub async fn add_user(&self, email: &str, password: &str, role: UserRole) -> UserAccount {
        let salt = SaltString::generate(rand_core::OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .unwrap_or_default();
        let user = UserAccount {
            id: Uuid::new_v4(),
            email: email.to_string(),
            hash,
            full_name: None,
            role,
            created_at: Utc::now(),
        };
        self.users.write().await.push(user.clone());
        user
    }

    pub async fn insert_evaluation(&self, evaluation: Evaluation) {
        self.evaluations.write().await.push(evaluation);
    }

    pub async fn evaluation_count(&self) -> usize {
        self.evaluations.read().await.len()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            bail!("remote store unreachable");
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn list_evaluations(&self, filters: &EvaluationFilters) -> Result<Vec<Evaluation>> {
        self.check_online()?;
        let mut rows: Vec<Evaluation> = self
            .evaluations
            .read()
            .await
            .iter()
            .filter(|e| matches_filters(e, filters))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn create_evaluation(&self, draft: EvaluationDraft) -> Result<Evaluation> {
        self.check_online()?;
        let evaluation = draft.into_evaluation(Utc::now());
        self.evaluations.write().await.push(evaluation.clone());
        Ok(evaluation)
    }

    async fn clear_all_evaluations(&self) -> Result<u64> {
        self.check_online()?;
        let mut rows = self.evaluations.write().await;
        let removed = rows.len() as u64;
        rows.clear();
        Ok(removed)
    }

    async fn list_companies(&self) -> Result<Vec<Company>> {
        self.check_online()?;
        let mut companies = self.companies.read().await.clone();
        companies.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(companies)
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Option<UserAccount>> {
        self.check_online()?;
        Ok(self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(credentials.email.trim()))
            .filter(|u| password_matches(&u.hash, &credentials.password))
            .cloned())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserAccount>> {
        self.check_online()?;
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }
}
