use std::env;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://backend.overseas.ai/api/";

pub struct Config {
    pub api_base: String,
    pub api_token: Option<String>,
    pub cache_db: String,
    pub request_timeout: Duration,
    pub max_pages: usize,
}

impl Config {
    pub fn load() -> Self {
        Self {
            api_base: env::var("OVERSEAS_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            api_token: env::var("OVERSEAS_API_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            cache_db: env::var("OVERSEAS_CACHE_DB").unwrap_or_else(|_| "overseas_cache.db".to_string()),
            request_timeout: Duration::from_secs(
                env::var("REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            max_pages: env::var("MAX_PAGES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(5),
        }
    }
}
