use anyhow::{Context, Result};

use crate::provider::ProviderCredentials;
use crate::scoring::orchestrator::ScoringOptions;

/// Application configuration loaded from environment variables.
///
/// Provider keys are optional at startup: a key is only required once a
/// task selects that provider, and a missing key fails that task rather
/// than the whole service.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
    pub task_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            openai_api_key: optional_env("OPENAI_API_KEY"),
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            batch_size: parse_env("SCORING_BATCH_SIZE", 10)?,
            max_concurrent_batches: parse_env("SCORING_MAX_CONCURRENT_BATCHES", 3)?,
            task_ttl_secs: parse_env("TASK_TTL_SECS", 3600)?,
        })
    }

    pub fn credentials(&self) -> ProviderCredentials {
        ProviderCredentials {
            openai_api_key: self.openai_api_key.clone(),
            gemini_api_key: self.gemini_api_key.clone(),
        }
    }

    pub fn scoring_options(&self) -> ScoringOptions {
        ScoringOptions {
            batch_size: self.batch_size,
            max_concurrent_batches: self.max_concurrent_batches,
            ..ScoringOptions::default()
        }
    }
}

/// Returns None for unset OR empty variables, so a blank key in .env does
/// not masquerade as a configured credential.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value")),
        Err(_) => Ok(default),
    }
}
