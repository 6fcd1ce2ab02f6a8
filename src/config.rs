//! Environment configuration.

use std::env;
use std::time::Duration;

use research_api::{ResearchApiConfig, ResearchDepth};
use research_provider_mock::MOCK_PROVIDER_ID;
use thiserror::Error;

pub const HTTP_PROVIDER_ID: &str = "http";

pub const PROVIDER_ENV_VAR: &str = "RESEARCH_CHAT_PROVIDER";
pub const BASE_URL_ENV_VAR: &str = "RESEARCH_API_BASE_URL";
pub const TOKEN_ENV_VAR: &str = "RESEARCH_API_TOKEN";
pub const TIMEOUT_ENV_VAR: &str = "RESEARCH_API_TIMEOUT_SEC";
pub const DEPTH_ENV_VAR: &str = "RESEARCH_DEFAULT_DEPTH";
pub const ACADEMIC_ENV_VAR: &str = "RESEARCH_INCLUDE_ACADEMIC";
pub const LOG_JSON_ENV_VAR: &str = "RESEARCH_CHAT_LOG_JSON";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a positive number of seconds, got {value:?}")]
    InvalidTimeout { key: &'static str, value: String },

    #[error("{key} must be one of quick, standard, deep; got {value:?}")]
    InvalidDepth { key: &'static str, value: String },

    #[error("unsupported provider {0:?}; available providers: http, mock")]
    UnknownProvider(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    pub provider: String,
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
    pub request_timeout: Option<Duration>,
    pub default_depth: ResearchDepth,
    pub include_academic: bool,
    pub log_json: bool,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let provider = env_string_opt(PROVIDER_ENV_VAR)
            .map(|value| value.trim().to_ascii_lowercase())
            .unwrap_or_else(|| HTTP_PROVIDER_ID.to_string());
        if provider != HTTP_PROVIDER_ID && provider != MOCK_PROVIDER_ID {
            return Err(ConfigError::UnknownProvider(provider));
        }

        let request_timeout = match env_string_opt(TIMEOUT_ENV_VAR) {
            None => None,
            Some(value) => Some(parse_timeout(&value).ok_or(ConfigError::InvalidTimeout {
                key: TIMEOUT_ENV_VAR,
                value,
            })?),
        };

        let default_depth = match env_string_opt(DEPTH_ENV_VAR) {
            None => ResearchDepth::default(),
            Some(value) => ResearchDepth::parse(&value).ok_or(ConfigError::InvalidDepth {
                key: DEPTH_ENV_VAR,
                value,
            })?,
        };

        Ok(Self {
            provider,
            api_base_url: env_string_opt(BASE_URL_ENV_VAR),
            api_token: env_string_opt(TOKEN_ENV_VAR),
            request_timeout,
            default_depth,
            include_academic: env_flag(ACADEMIC_ENV_VAR),
            log_json: env_flag(LOG_JSON_ENV_VAR),
        })
    }

    pub fn is_mock(&self) -> bool {
        self.provider == MOCK_PROVIDER_ID
    }

    pub fn api_config(&self) -> ResearchApiConfig {
        let mut config = ResearchApiConfig::default();
        if let Some(base_url) = &self.api_base_url {
            config = config.with_base_url(base_url.trim());
        }
        if let Some(timeout) = self.request_timeout {
            config = config.with_timeout(timeout);
        }
        config
    }
}

fn parse_timeout(value: &str) -> Option<Duration> {
    let seconds = value.trim().parse::<f64>().ok()?;
    if seconds.is_finite() && seconds > 0.0 {
        Some(Duration::from_secs_f64(seconds))
    } else {
        None
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key).map(|value| value == "1").unwrap_or(false)
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
