use serde::{Deserialize, Serialize};

/// `GET /health` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// `GET /health/llm` body. `error` is set only when the provider is unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmHealth {
    pub status: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub response_preview: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Non-sensitive server configuration from `GET /config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub llm_provider: String,
    pub llm_model: String,
    pub max_sources: u32,
    pub max_search_results: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: u64,
    pub maxsize: u64,
    pub ttl_hours: f64,
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    pub hit_rate_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheCleared {
    pub status: String,
    pub entries_removed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInvalidation {
    pub status: String,
    pub topic: String,
}

impl CacheInvalidation {
    pub fn was_cached(&self) -> bool {
        self.status == "invalidated"
    }
}
