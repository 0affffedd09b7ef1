use crate::config::Config;
use crate::domain::models::UserRole;
use anyhow::Result;
use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use sqlx::PgPool;
use uuid::Uuid;

pub async fn seed_all(pool: &PgPool, config: &Config) -> Result<()> {
    seed_companies(pool, &config.seed_companies).await?;
    if let Some((email, password)) = &config.admin_seed {
        seed_admin(pool, email, password).await?;
    }
    Ok(())
}

async fn seed_admin(pool: &PgPool, email: &str, password: &str) -> Result<()> {
    let salt = SaltString::generate(rand_core::OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    let inserted = sqlx::query(
        r#"
        INSERT INTO users (id, email, hash, full_name, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(hash)
    .bind("Score Hub Admin")
    .bind(UserRole::Admin)
    .execute(pool)
    .await?
    .rows_affected();

    if inserted > 0 {
        tracing::info!("Seeded admin account {}", email);
    }
    Ok(())
}

async fn seed_companies(pool: &PgPool, names: &[String]) -> Result<()> {
    let mut inserted = 0;
    for name in names {
        let slug = slugify(name);
        if slug.is_empty() {
            continue;
        }
        inserted += sqlx::query(
            r#"
            INSERT INTO companies (id, name, slug)
            VALUES ($1, $2, $3)
            ON CONFLICT (slug) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name.trim())
        .bind(&slug)
        .execute(pool)
        .await?
        .rows_affected();
    }
    if inserted > 0 {
        tracing::info!("Seeded {} companies", inserted);
    }
    Ok(())
}

/// Lowercase ASCII words joined by single dashes.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Innovation Hub"), "innovation-hub");
        assert_eq!(slugify("  North / South  Branch "), "north-south-branch");
        assert_eq!(slugify("---"), "");
    }
}
