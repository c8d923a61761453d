//! Process-wide configuration for FlipSync.
//!
//! [`FlipSyncConfig`] is a plain struct built once from environment
//! variables at process start. There is no file-parsing dependency —
//! callers who want a config file can parse it themselves and populate the
//! struct fields directly.
//!
//! # Example
//!
//! ```rust
//! use flipsync::config::FlipSyncConfig;
//!
//! std::env::set_var("OPENAI_API_KEY", "sk-test");
//! let config = FlipSyncConfig::from_env().unwrap();
//! assert_eq!(config.openai_daily_budget_usd, 2.00);
//! ```

use crate::error::{ErrorKind, FlipSyncError, Result};
use std::env;

/// Deployment environment, mirrors `FLIPSYNC_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

/// Global configuration for the FlipSync coordination fabric.
///
/// Constructed once via [`FlipSyncConfig::from_env`] and shared (usually
/// behind an `Arc`) across the LLM client, cost tracker, and cache.
#[derive(Debug)]
pub struct FlipSyncConfig {
    pub environment: Environment,
    pub openai_api_key: Option<String>,
    pub openai_project_id: Option<String>,
    pub openai_daily_budget_usd: f64,
    pub openai_max_cost_per_request_usd: f64,
    pub cache_url: Option<String>,
    pub local_llm_base_url: String,
    pub local_llm_timeout_secs: u64,
    pub perf_max_history: usize,
}

impl FlipSyncConfig {
    /// Read configuration from the process environment.
    ///
    /// Returns `Err` with [`ErrorKind::Auth`](crate::error::ErrorKind::Auth)
    /// if `FLIPSYNC_ENV=production` and `OPENAI_API_KEY` is not set — the
    /// same eager-validation the Python factory this is modeled on performs,
    /// rather than deferring to the first LLM call.
    pub fn from_env() -> Result<Self> {
        let environment = env::var("FLIPSYNC_ENV")
            .map(|v| Environment::from_str(&v))
            .unwrap_or(Environment::Development);

        let openai_api_key = env::var("OPENAI_API_KEY").ok();

        if environment == Environment::Production && openai_api_key.is_none() {
            return Err(FlipSyncError::new(
                ErrorKind::Auth,
                "OPENAI_API_KEY must be set when FLIPSYNC_ENV=production",
            ));
        }

        let local_host = env::var("LOCAL_LLM_HOST").unwrap_or_else(|_| "localhost".to_string());
        let local_port = env::var("LOCAL_LLM_PORT").unwrap_or_else(|_| "11434".to_string());
        let local_llm_base_url = env::var("LOCAL_LLM_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", local_host, local_port));

        Ok(Self {
            environment,
            openai_project_id: env::var("OPENAI_PROJECT_ID").ok(),
            openai_api_key,
            openai_daily_budget_usd: env_f64("OPENAI_DAILY_BUDGET", 2.00),
            openai_max_cost_per_request_usd: env_f64("OPENAI_MAX_COST_PER_REQUEST", 0.05),
            cache_url: env::var("CACHE_URL").ok(),
            local_llm_base_url,
            local_llm_timeout_secs: env_u64("LOCAL_LLM_TIMEOUT", 30),
            perf_max_history: env_usize("AI_PERF_MAX_HISTORY", 1000),
        })
    }
}

fn env_f64(name: &str, default: f64) -> f64 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_apply_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("FLIPSYNC_ENV");
        env::remove_var("OPENAI_API_KEY");
        env::remove_var("OPENAI_DAILY_BUDGET");
        let config = FlipSyncConfig::from_env().unwrap();
        assert_eq!(config.openai_daily_budget_usd, 2.00);
        assert_eq!(config.openai_max_cost_per_request_usd, 0.05);
        assert_eq!(config.perf_max_history, 1000);
    }

    #[test]
    fn production_without_api_key_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("FLIPSYNC_ENV", "production");
        env::remove_var("OPENAI_API_KEY");
        let err = FlipSyncConfig::from_env().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
        env::remove_var("FLIPSYNC_ENV");
    }
}
