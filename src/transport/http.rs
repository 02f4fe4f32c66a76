use crate::transport::TransportError;
use crate::{BoxStream, Error, Result};
use bytes::Bytes;
use futures::TryStreamExt;
use keyring::Entry;
use reqwest::Proxy;
use serde::de::DeserializeOwned;
use std::env;
use std::time::Duration;
use tracing::{debug, warn};

/// Keyring service name the gateway stores API keys under.
pub const KEYRING_SERVICE: &str = "ai-gateway";

/// One provider's HTTP client: base URL, credentials and a pooled `reqwest::Client`.
///
/// The client itself only bounds connecting. Single-shot calls carry a total deadline
/// per request; streaming calls run until the body ends or the caller drops them.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    request_timeout: Duration,
    provider_id: String,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    /// Build a transport. The provider id is normalized to a lowercase slug. Without an
    /// explicit key the keyring and then `<PROVIDER>_API_KEY` are consulted.
    pub fn new(
        provider_id: &str,
        base_url: &str,
        api_key: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let provider_id = provider_id.trim().to_ascii_lowercase();
        let provider_id = provider_id.as_str();
        let api_key = api_key.or_else(|| Self::get_api_key(provider_id));

        // Minimal production-friendly defaults (env-overridable).
        let timeout = timeout.unwrap_or_else(|| {
            Duration::from_secs(
                env::var("AI_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(30),
            )
        });

        let mut builder = reqwest::Client::builder()
            .connect_timeout(timeout)
            .pool_max_idle_per_host(
                env::var("AI_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .http2_adaptive_window(true)
            .http2_keep_alive_interval(Some(Duration::from_secs(30)))
            .http2_keep_alive_timeout(Duration::from_secs(10));

        if let Ok(proxy_url) = env::var("AI_PROXY_URL") {
            match Proxy::all(&proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => warn!(proxy = %proxy_url, error = %e, "ignoring invalid AI_PROXY_URL"),
            }
        }

        let client = builder
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;

        Ok(Self {
            client,
            request_timeout: timeout,
            provider_id: provider_id.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn get_api_key(provider_id: &str) -> Option<String> {
        // 1. Try Keyring
        if let Ok(entry) = Entry::new(KEYRING_SERVICE, provider_id) {
            if let Ok(key) = entry.get_password() {
                return Some(key);
            }
        }

        // 2. Try Environment Variable (PROVIDER_API_KEY)
        let env_var = format!("{}_API_KEY", provider_id.to_uppercase().replace('-', "_"));
        env::var(env_var).ok().filter(|k| !k.trim().is_empty())
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder, path: &str) -> Result<reqwest::Response> {
        debug!(provider = %self.provider_id, path, "sending request");
        req.send()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))
    }

    fn json_request(&self, path: &str, body: &serde_json::Value) -> reqwest::RequestBuilder {
        self.authorize(self.client.post(self.url(path)).json(body))
            .timeout(self.request_timeout)
    }

    // No total deadline: a long generation must not be cut off mid-stream.
    fn stream_request(&self, path: &str, body: &serde_json::Value) -> reqwest::RequestBuilder {
        self.authorize(
            self.client
                .post(self.url(path))
                .header("accept", "text/event-stream")
                .json(body),
        )
    }

    fn get_request(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.get(self.url(path)))
            .timeout(self.request_timeout)
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        self.send(self.json_request(path, body), path).await
    }

    /// POST expecting a server-sent-event reply.
    pub async fn post_stream(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        self.send(self.stream_request(path, body), path).await
    }

    pub async fn post_multipart(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<reqwest::Response> {
        let req = self
            .authorize(self.client.post(self.url(path)).multipart(form))
            .timeout(self.request_timeout);
        self.send(req, path).await
    }

    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        self.send(self.get_request(path), path).await
    }

    /// Turn a non-success status into [`Error::Upstream`], keeping the body for diagnostics.
    pub async fn check_status(&self, resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        warn!(provider = %self.provider_id, status = status.as_u16(), "upstream returned an error status");
        Err(Error::upstream(&self.provider_id, status.as_u16(), body))
    }

    /// Status check, then decode the JSON body; a body of the wrong shape is an upstream failure.
    pub async fn read_json<T: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<T> {
        let resp = self.check_status(resp).await?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::malformed_body(&self.provider_id, status.as_u16(), e.to_string()))
    }

    /// Status check, then the raw body bytes.
    pub async fn read_bytes(&self, resp: reqwest::Response) -> Result<(Option<String>, Bytes)> {
        let resp = self.check_status(resp).await?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(';').next().unwrap_or(s).trim().to_string());
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Transport(TransportError::Http(e)))?;
        Ok((content_type, bytes))
    }

    /// Convert a response body into the unified byte stream.
    pub fn byte_stream(resp: reqwest::Response) -> BoxStream<'static, Bytes> {
        let byte_stream = resp
            .bytes_stream()
            .map_err(|e| Error::Transport(TransportError::Http(e)));
        Box::pin(byte_stream)
    }
}
