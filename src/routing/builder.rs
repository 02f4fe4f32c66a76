//! Router construction.

use super::{ModelCatalog, ProviderRegistry, Router};
use crate::config::GatewayConfig;
use crate::drivers::{OpenAiCompatibleProvider, ProviderDriver};
use crate::poller::PollConfig;
use crate::transport::HttpTransport;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Builder for [`Router`].
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use ai_gateway_rust::drivers::OpenAiCompatibleProvider;
/// # use ai_gateway_rust::RouterBuilder;
/// # fn main() -> ai_gateway_rust::Result<()> {
/// let openai = OpenAiCompatibleProvider::new("openai", "https://api.openai.com/v1", None)?;
/// let router = RouterBuilder::new()
///     .with_provider(Arc::new(openai))
///     .models_cache_ttl(std::time::Duration::from_secs(60))
///     .build();
/// # Ok(())
/// # }
/// ```
pub struct RouterBuilder {
    providers: Vec<Arc<dyn ProviderDriver>>,
    models_cache_ttl: Duration,
    list_models_timeout: Duration,
    poll_config: PollConfig,
}

impl RouterBuilder {
    pub fn new() -> Self {
        let defaults = GatewayConfig::default();
        Self {
            providers: Vec::new(),
            models_cache_ttl: defaults.models_cache_ttl(),
            list_models_timeout: defaults.list_models_timeout(),
            poll_config: defaults.polling.to_poll_config(),
        }
    }

    /// Register a backend. A later backend with the same id replaces an earlier one.
    pub fn with_provider(mut self, driver: Arc<dyn ProviderDriver>) -> Self {
        let id = driver.provider_id().to_ascii_lowercase();
        if let Some(pos) = self
            .providers
            .iter()
            .position(|p| p.provider_id().eq_ignore_ascii_case(&id))
        {
            warn!(provider = %id, "provider registered twice; keeping the later one");
            self.providers.remove(pos);
        }
        self.providers.push(driver);
        self
    }

    pub fn models_cache_ttl(mut self, ttl: Duration) -> Self {
        self.models_cache_ttl = ttl;
        self
    }

    /// Per-backend bound on a single model-listing call.
    pub fn list_models_timeout(mut self, timeout: Duration) -> Self {
        self.list_models_timeout = timeout;
        self
    }

    pub fn poll_config(mut self, config: PollConfig) -> Self {
        self.poll_config = config;
        self
    }

    /// Create one OpenAI-compatible backend per configured provider and take over the
    /// configured timeouts and polling policy.
    pub fn with_config(mut self, config: &GatewayConfig) -> Result<Self> {
        config.validate()?;
        for p in &config.providers {
            let transport = HttpTransport::new(
                p.id.trim(),
                &p.base_url,
                p.resolve_api_key(),
                Some(config.http_timeout()),
            )?;
            if !transport.has_api_key() {
                warn!(provider = %p.id, "no API key configured; requests go out unauthenticated");
            }
            let driver = OpenAiCompatibleProvider::from_transport(transport)
                .with_endpoints(p.endpoints.clone());
            self = self.with_provider(Arc::new(driver));
        }
        self.models_cache_ttl = config.models_cache_ttl();
        self.list_models_timeout = config.list_models_timeout();
        self.poll_config = config.polling.to_poll_config();
        Ok(self)
    }

    pub fn build(self) -> Router {
        let registry = Arc::new(ProviderRegistry::new());
        registry.replace_all(self.providers);
        info!(providers = ?registry.ids(), "router ready");
        Router::new(
            registry,
            ModelCatalog::new(self.models_cache_ttl, self.list_models_timeout),
            self.poll_config,
        )
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
