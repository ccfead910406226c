//! Runtime configuration.
//!
//! Everything is read from the environment at startup. Secrets are required
//! and missing ones are fatal; the rest falls back to defaults.
//!
//! # Environment Variable Mapping
//!
//! - `DISCORD_BOT_TOKEN` → bot_token (required)
//! - `OPENAI_API_KEY` → openai_api_key (required)
//! - `PARLEY_PERSONA` → persona
//! - `PARLEY_MODEL` → model
//! - `PARLEY_MAX_TOKENS` → max_tokens
//! - `PARLEY_LOG_LEVEL` → log_level
//! - `PARLEY_LOG_FORMAT` → log_format ("pretty" or "json")
//! - `PARLEY_SESSION_DIR` → session_dir
//! - `PARLEY_MESSAGE_LIMIT` → limits.message_limit
//! - `PARLEY_MAX_DURATION_SECS` → limits.max_duration_secs
//! - `PARLEY_IDLE_TIMEOUT_SECS` → limits.idle_timeout_secs

use crate::session::SessionLimits;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingSecret(&'static str),
}

/// Bot runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord bot token.
    pub bot_token: String,

    /// OpenAI API key.
    pub openai_api_key: String,

    /// Name the bot speaks as. Default: "Parley"
    pub persona: String,

    /// Completion model. Default: "gpt-4o-mini"
    pub model: String,

    /// Completion token budget per reply. Default: 256
    pub max_tokens: u32,

    /// Base log level (trace, debug, info, warn, error). Default: "info"
    pub log_level: String,

    /// Log output format: "pretty" or "json". Default: "pretty"
    pub log_format: String,

    /// Directory where finished session transcripts are written.
    /// Default: "./sessions"
    pub session_dir: PathBuf,

    /// Session quota and timeout limits.
    pub limits: SessionLimits,
}

impl Config {
    /// Loads configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bot_token = std::env::var("DISCORD_BOT_TOKEN")
            .map_err(|_| ConfigError::MissingSecret("DISCORD_BOT_TOKEN"))?;
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingSecret("OPENAI_API_KEY"))?;

        let mut limits = SessionLimits::default();
        if let Ok(value) = std::env::var("PARLEY_MESSAGE_LIMIT") {
            if let Ok(n) = value.parse() {
                limits.message_limit = n;
            }
        }
        if let Ok(value) = std::env::var("PARLEY_MAX_DURATION_SECS") {
            if let Ok(n) = value.parse() {
                limits.max_duration_secs = n;
            }
        }
        if let Ok(value) = std::env::var("PARLEY_IDLE_TIMEOUT_SECS") {
            if let Ok(n) = value.parse() {
                limits.idle_timeout_secs = n;
            }
        }

        Ok(Self {
            bot_token,
            openai_api_key,
            persona: env_or("PARLEY_PERSONA", "Parley"),
            model: env_or("PARLEY_MODEL", "gpt-4o-mini"),
            max_tokens: std::env::var("PARLEY_MAX_TOKENS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(256),
            log_level: env_or("PARLEY_LOG_LEVEL", "info"),
            log_format: env_or("PARLEY_LOG_FORMAT", "pretty"),
            session_dir: PathBuf::from(env_or("PARLEY_SESSION_DIR", "./sessions")),
            limits,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
