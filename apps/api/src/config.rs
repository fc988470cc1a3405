use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::llm_client::prompts::DEFAULT_PLAN_SYSTEM;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub model: ModelConfig,
    pub downloads_dir: PathBuf,
    pub port: u16,
    pub rust_log: String,
}

/// Everything the model client needs. Passed in at construction.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: String,
    pub api_key: String,
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            model: ModelConfig {
                model: env_or("AI_MODEL", "gpt-3.5-turbo"),
                max_tokens: parse_env("AI_MAX_TOKENS", 4000)?,
                temperature: parse_env("AI_TEMPERATURE", 0.7)?,
                system_prompt: env_or("AI_SYSTEM_PROMPT", DEFAULT_PLAN_SYSTEM),
                api_key: require_env("OPENAI_API_KEY")?,
                base_url: env_or("AI_BASE_URL", "https://api.openai.com/v1"),
                request_timeout_secs: parse_env("AI_REQUEST_TIMEOUT_SECS", 60)?,
            },
            downloads_dir: PathBuf::from(env_or("DOWNLOADS_DIR", "downloads")),
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}
