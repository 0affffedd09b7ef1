pub mod seed;

#[cfg(test)]
pub mod memory;

use crate::domain::models::{
    Company, Evaluation, EvaluationDraft, EvaluationFilters, UserRole,
};
use anyhow::Result;
use argon2::{password_hash::PasswordHash, Argon2, PasswordVerifier};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserAccount {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub hash: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// The remote persistence/auth service, seen only through these operations.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Newest first.
    async fn list_evaluations(&self, filters: &EvaluationFilters) -> Result<Vec<Evaluation>>;
    async fn create_evaluation(&self, draft: EvaluationDraft) -> Result<Evaluation>;
    /// Deletes every evaluation, returning how many rows went away.
    async fn clear_all_evaluations(&self) -> Result<u64>;
    /// Ordered by name.
    async fn list_companies(&self) -> Result<Vec<Company>>;
    async fn authenticate(&self, credentials: &Credentials) -> Result<Option<UserAccount>>;
    async fn find_user(&self, id: Uuid) -> Result<Option<UserAccount>>;
}

pub type SharedGateway = Arc<dyn PersistenceGateway>;

pub fn password_matches(hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        tracing::warn!("Stored password hash is malformed");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[derive(Clone)]
pub struct PgGateway {
    pool: PgPool,
}

impl PgGateway {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>> {
        let user = sqlx::query_as::<_, UserAccount>(
            r#"
            SELECT id, email, hash, full_name, role, created_at
            FROM users
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Postgres>, filters: &EvaluationFilters) {
    query.push(" WHERE TRUE");
    if let Some(company_id) = filters.company_id {
        query.push(" AND company_id = ").push_bind(company_id);
    }
    if let Some(from) = filters.date_from {
        query.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filters.date_to {
        query.push(" AND created_at <= ").push_bind(to);
    }
    if let Some(min) = filters.min_score {
        query.push(" AND score >= ").push_bind(min as i16);
    }
    if let Some(max) = filters.max_score {
        query.push(" AND score <= ").push_bind(max as i16);
    }
    if let Some(gender) = filters.gender {
        query.push(" AND gender = ").push_bind(gender);
    }
    if let Some(from) = filters.age_from {
        query.push(" AND age >= ").push_bind(from);
    }
    if let Some(to) = filters.age_to {
        query.push(" AND age <= ").push_bind(to);
    }
}

#[async_trait]
impl PersistenceGateway for PgGateway {
    async fn list_evaluations(&self, filters: &EvaluationFilters) -> Result<Vec<Evaluation>> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT id, company_id, score, gender, age, comment, created_at FROM evaluations",
        );
        push_filters(&mut query, filters);
        query.push(" ORDER BY created_at DESC");

        let rows = query
            .build_query_as::<Evaluation>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn create_evaluation(&self, draft: EvaluationDraft) -> Result<Evaluation> {
        let evaluation = draft.into_evaluation(Utc::now());
        sqlx::query(
            r#"
            INSERT INTO evaluations (id, company_id, score, gender, age, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(evaluation.id)
        .bind(evaluation.company_id)
        .bind(evaluation.score.value() as i16)
        .bind(evaluation.gender)
        .bind(evaluation.age)
        .bind(&evaluation.comment)
        .bind(evaluation.created_at)
        .execute(&self.pool)
        .await?;
        Ok(evaluation)
    }

    async fn clear_all_evaluations(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM evaluations")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_companies(&self) -> Result<Vec<Company>> {
        let companies = sqlx::query_as::<_, Company>(
            "SELECT id, name, slug, created_at, updated_at FROM companies ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(companies)
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Option<UserAccount>> {
        let Some(user) = self.find_user_by_email(&credentials.email).await? else {
            return Ok(None);
        };
        if password_matches(&user.hash, &credentials.password) {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserAccount>> {
        let user = sqlx::query_as::<_, UserAccount>(
            "SELECT id, email, hash, full_name, role, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Gender;

    #[test]
    fn test_filters_render_only_present_predicates() {
        let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM evaluations");
        push_filters(
            &mut query,
            &EvaluationFilters {
                min_score: Some(7),
                gender: Some(Gender::Male),
                ..Default::default()
            },
        );
        assert_eq!(
            query.sql(),
            "SELECT * FROM evaluations WHERE TRUE AND score >= $1 AND gender = $2"
        );
    }

    #[test]
    fn test_password_matches_rejects_malformed_hash() {
        assert!(!password_matches("not-a-phc-string", "secret"));
    }
}
