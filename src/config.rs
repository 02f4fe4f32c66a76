//! Gateway configuration.
//!
//! Loaded from YAML, then adjusted by `AI_*` environment variables:
//!
//! ```yaml
//! http_timeout_secs: 60
//! models_cache_ttl_secs: 300
//! list_models_timeout_secs: 5
//! polling:
//!   interval_ms: 1000
//!   timeout_secs: 600
//! providers:
//!   - id: openai
//!     base_url: https://api.openai.com/v1
//!     api_key_env: OPENAI_API_KEY
//!   - id: local
//!     base_url: http://localhost:11434/v1
//!     endpoints:
//!       chat: /chat/completions
//! ```

use crate::drivers::OpenAiEndpoints;
use crate::poller::PollConfig;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub providers: Vec<ProviderConfig>,
    pub http_timeout_secs: u64,
    pub models_cache_ttl_secs: u64,
    pub list_models_timeout_secs: u64,
    pub polling: PollingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            http_timeout_secs: 30,
            models_cache_ttl_secs: 300,
            list_models_timeout_secs: 5,
            polling: PollingConfig::default(),
        }
    }
}

/// One OpenAI-compatible backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Routing slug, the part before `/` in model ids.
    pub id: String,
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the key, when not `<ID>_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub endpoints: OpenAiEndpoints,
}

impl ProviderConfig {
    /// Explicit key, then the configured env variable. `None` lets the transport fall
    /// back to the keyring and `<ID>_API_KEY`.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| {
            self.api_key_env
                .as_deref()
                .and_then(|var| std::env::var(var).ok())
                .filter(|k| !k.trim().is_empty())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    /// `None` polls until terminal or the attempt cap.
    pub timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub backoff: f64,
    pub max_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            timeout_secs: Some(600),
            max_attempts: None,
            backoff: 1.0,
            max_interval_ms: 30_000,
        }
    }
}

impl PollingConfig {
    pub fn to_poll_config(&self) -> PollConfig {
        PollConfig::new(Duration::from_millis(self.interval_ms))
            .with_timeout(self.timeout_secs.map(Duration::from_secs))
            .with_max_attempts(self.max_attempts)
            .with_backoff(self.backoff, Duration::from_millis(self.max_interval_ms))
    }
}

impl GatewayConfig {
    /// Read a YAML file, apply env overrides and validate.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::configuration_with_context(
                "cannot read gateway config",
                ErrorContext::new()
                    .with_field_path(path.to_string_lossy().to_string())
                    .with_details(e.to_string()),
            )
        })?;
        let mut config = Self::from_yaml_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        debug!(path = %path.display(), providers = config.providers.len(), "loaded gateway config");
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                "invalid gateway config",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("serde_yaml"),
            )
        })
    }

    /// `AI_HTTP_TIMEOUT_SECS`, `AI_MODELS_CACHE_TTL_SECS`, `AI_LIST_MODELS_TIMEOUT_SECS`.
    /// Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        fn env_u64(name: &str) -> Option<u64> {
            std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
        }
        if let Some(v) = env_u64("AI_HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = v;
        }
        if let Some(v) = env_u64("AI_MODELS_CACHE_TTL_SECS") {
            self.models_cache_ttl_secs = v;
        }
        if let Some(v) = env_u64("AI_LIST_MODELS_TIMEOUT_SECS") {
            self.list_models_timeout_secs = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (i, p) in self.providers.iter().enumerate() {
            let id = p.id.trim().to_ascii_lowercase();
            if id.is_empty() || id.contains('/') {
                return Err(Error::configuration_with_context(
                    "provider id must be non-empty and must not contain '/'",
                    ErrorContext::new()
                        .with_field_path(format!("providers[{i}].id"))
                        .with_details(format!("got '{}'", p.id)),
                ));
            }
            if !seen.insert(id.clone()) {
                return Err(Error::configuration_with_context(
                    "duplicate provider id",
                    ErrorContext::new()
                        .with_field_path(format!("providers[{i}].id"))
                        .with_details(id),
                ));
            }
            if let Err(e) = url::Url::parse(&p.base_url) {
                return Err(Error::configuration_with_context(
                    "invalid base_url",
                    ErrorContext::new()
                        .with_field_path(format!("providers[{i}].base_url"))
                        .with_details(e.to_string()),
                ));
            }
        }
        if self.polling.interval_ms == 0 {
            return Err(Error::configuration_with_context(
                "polling interval must be positive",
                ErrorContext::new().with_field_path("polling.interval_ms"),
            ));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn models_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.models_cache_ttl_secs)
    }

    pub fn list_models_timeout(&self) -> Duration {
        Duration::from_secs(self.list_models_timeout_secs)
    }
}
