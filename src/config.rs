use crate::domain::timeout::TimeoutPolicy;
use crate::time_utils;
use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub session_key: Vec<u8>,
    pub bind_addr: String,
    pub local_store_path: String,
    pub timezone: String,
    pub auto_logout: TimeoutPolicy,
    pub admin_gate: TimeoutPolicy,
    pub secure_cookies: bool,
    pub seed_companies: Vec<String>,
    pub admin_seed: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let session_key_b64 = require_env("SESSION_KEY")?;
        let session_key = general_purpose::STANDARD
            .decode(session_key_b64.trim())
            .context("SESSION_KEY must be base64")?;
        if session_key.len() < 32 {
            bail!("SESSION_KEY must decode to at least 32 bytes");
        }

        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| {
            let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
            format!("0.0.0.0:{}", port)
        });

        let raw_tz = std::env::var("APP_TIMEZONE").unwrap_or_else(|_| "UTC".to_string());
        let timezone = time_utils::normalize_timezone(&raw_tz)
            .with_context(|| format!("APP_TIMEZONE '{raw_tz}' is not a known timezone"))?;

        let defaults = TimeoutPolicy::auto_logout();
        let auto_logout = TimeoutPolicy::new(
            secs_env("AUTO_LOGOUT_SECS", defaults.timeout)?,
            secs_env("AUTO_LOGOUT_WARNING_SECS", defaults.warning_lead)?,
            defaults.display_delay,
        );
        if auto_logout.warning_lead >= auto_logout.timeout {
            bail!("AUTO_LOGOUT_WARNING_SECS must be shorter than AUTO_LOGOUT_SECS");
        }

        let gate_defaults = TimeoutPolicy::admin_gate();
        let admin_gate = TimeoutPolicy::new(
            secs_env("ADMIN_GATE_SECS", gate_defaults.timeout)?,
            Duration::ZERO,
            Duration::ZERO,
        );

        let secure_cookies = ["RAILWAY_ENVIRONMENT", "RENDER", "FLY_APP_NAME", "PRODUCTION"]
            .iter()
            .any(|key| std::env::var(key).is_ok());

        let seed_companies = std::env::var("SEED_COMPANIES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let admin_seed = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.trim().is_empty() && !password.is_empty() => {
                Some((email.trim().to_string(), password))
            }
            _ => None,
        };

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            session_key,
            bind_addr,
            local_store_path: std::env::var("LOCAL_STORE_PATH")
                .unwrap_or_else(|_| "scorehub-local.json".to_string()),
            timezone,
            auto_logout,
            admin_gate,
            secure_cookies,
            seed_companies,
            admin_seed,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn secs_env(key: &str, default: Duration) -> Result<Duration> {
    match std::env::var(key) {
        Ok(raw) => {
            let secs = raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{key} must be a whole number of seconds"))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(default),
    }
}
