// src/config.rs

use dotenvy::dotenv;
use std::env;

/// Maximum communities returned by a search query.
pub const SEARCH_COMMUNITY_LIMIT: usize = 10;
/// Maximum posts returned by a search query.
pub const SEARCH_POST_LIMIT: usize = 20;
/// Maximum users returned by a user search query.
pub const SEARCH_USER_LIMIT: usize = 10;
/// Sentences kept by the local extractive summarizer.
pub const SUMMARY_MAX_SENTENCES: usize = 3;
/// Post bodies may carry base64 image payloads, so the JSON limit is generous.
pub const MAX_JSON_BODY_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds. Defaults to 7 days.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub port: u16,
    /// API key for the generative-text service. When unset, summarization
    /// falls back to the local extractive heuristic.
    pub gemini_api_key: Option<String>,
    /// Override for the generateContent endpoint (used by tests).
    pub gemini_api_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(7 * 24 * 60 * 60);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8000);

        let gemini_api_key = env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty());
        let gemini_api_url = env::var("GEMINI_API_URL").ok().filter(|u| !u.is_empty());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            port,
            gemini_api_key,
            gemini_api_url,
        }
    }
}
