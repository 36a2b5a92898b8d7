use std::time::Duration;

use anyhow::{Context, Result};

pub const GOOGLE_API_KEY_VAR: &str = "GOOGLE_API_KEY";

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_CHROMA_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_CHROMA_COLLECTION: &str = "career_docs";

/// Application configuration loaded from environment variables.
///
/// The LLM credential is optional here: a missing key must not stop the
/// server from starting, it only keeps the chatbot readiness gate closed.
#[derive(Debug, Clone)]
pub struct Config {
    pub google_api_key: Option<String>,
    pub gemini_base_url: String,
    pub chroma_url: String,
    pub chroma_collection: String,
    pub retrieval_top_k: u32,
    pub llm_timeout: Duration,
    pub retrieval_timeout: Duration,
    pub init_timeout: Duration,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            google_api_key: read_api_key(),
            gemini_base_url: env_or("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
            chroma_url: env_or("CHROMA_URL", DEFAULT_CHROMA_URL),
            chroma_collection: env_or("CHROMA_COLLECTION", DEFAULT_CHROMA_COLLECTION),
            retrieval_top_k: parse_env("RETRIEVAL_TOP_K", 3)
                .context("RETRIEVAL_TOP_K must be a positive integer")?,
            llm_timeout: Duration::from_secs(
                parse_env("LLM_TIMEOUT_SECS", 8).context("LLM_TIMEOUT_SECS must be a number")?,
            ),
            retrieval_timeout: Duration::from_secs(
                parse_env("RETRIEVAL_TIMEOUT_SECS", 5)
                    .context("RETRIEVAL_TIMEOUT_SECS must be a number")?,
            ),
            init_timeout: Duration::from_secs(
                parse_env("INIT_TIMEOUT_SECS", 5).context("INIT_TIMEOUT_SECS must be a number")?,
            ),
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }
}

/// Reads the LLM credential, treating an empty value as absent.
pub fn read_api_key() -> Option<String> {
    std::env::var(GOOGLE_API_KEY_VAR)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Invalid value '{raw}' for '{key}'")),
        Err(_) => Ok(default),
    }
}
