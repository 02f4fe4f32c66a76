use crate::drivers::Capability;
use crate::pipeline::PipelineError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "providers[0].base_url")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "router", "poller")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Coarse error taxonomy shared by single-shot failures and `error` output parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    ProviderNotFound,
    Unsupported,
    UpstreamFailure,
    ProtocolViolation,
    Timeout,
    Cancelled,
    Configuration,
    Validation,
    Transport,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ProviderNotFound => "provider-not-found",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::UpstreamFailure => "upstream-failure",
            ErrorKind::ProtocolViolation => "protocol-violation",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Validation => "validation",
            ErrorKind::Transport => "transport",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the gateway.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider not found: '{slug}' (registered: {})", .registered.join(", "))]
    ProviderNotFound { slug: String, registered: Vec<String> },

    #[error("Provider '{provider}' does not support capability '{capability}'")]
    Unsupported {
        provider: String,
        capability: Capability,
    },

    #[error("Upstream error from '{provider}': HTTP {status}: {message}")]
    Upstream {
        provider: String,
        status: u16,
        message: String,
        body: Option<String>,
    },

    #[error("Protocol violation: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Timed out waiting for a terminal job state after {attempts} poll(s) ({elapsed_ms} ms)")]
    Timeout { attempts: u32, elapsed_ms: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    /// An `error` part read back from an output-part stream.
    #[error("{kind}: {message}")]
    Streamed { kind: ErrorKind, message: String },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Validation error: {message}{}", format_context(.context))]
    Validation {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn unsupported(provider: impl Into<String>, capability: Capability) -> Self {
        Error::Unsupported {
            provider: provider.into(),
            capability,
        }
    }

    pub fn upstream(provider: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        Error::Upstream {
            provider: provider.into(),
            status,
            message: upstream_message(&body),
            body: Some(body),
        }
    }

    /// A 2xx reply whose body does not match the expected vendor shape.
    pub fn malformed_body(provider: impl Into<String>, status: u16, reason: impl Into<String>) -> Self {
        Error::Upstream {
            provider: provider.into(),
            status,
            message: format!("malformed response body: {}", reason.into()),
            body: None,
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Create a new validation error with structured context
    pub fn validation_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Validation {
            message: msg.into(),
            context,
        }
    }

    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ProviderNotFound { .. } => ErrorKind::ProviderNotFound,
            Error::Unsupported { .. } => ErrorKind::Unsupported,
            Error::Upstream { .. } => ErrorKind::UpstreamFailure,
            Error::Pipeline(_) => ErrorKind::ProtocolViolation,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Streamed { kind, .. } => *kind,
            Error::Configuration { .. } => ErrorKind::Configuration,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Io(_) | Error::Serialization(_) | Error::Runtime { .. } => ErrorKind::Internal,
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::Unsupported { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Transient failures a caller may reasonably retry. Routing and capability errors never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Upstream { status, .. } => *status == 429 || (500..=599).contains(status),
            Error::Transport(_) => true,
            _ => false,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. }
            | Error::Validation { context, .. }
            | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }
}

/// Pull a human-readable message out of the usual `{"error": {"message": ...}}` shapes.
fn upstream_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let from_json = parsed.as_ref().and_then(|v| {
        v.pointer("/error/message")
            .or_else(|| v.get("message"))
            .or_else(|| v.get("error"))
            .and_then(|m| m.as_str())
            .map(String::from)
    });
    match from_json {
        Some(m) => m,
        None if body.trim().is_empty() => "empty response body".to_string(),
        None => body.chars().take(512).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_message_prefers_structured_error() {
        let err = Error::upstream("openai", 400, r#"{"error":{"message":"bad model"}}"#);
        match err {
            Error::Upstream { message, status, .. } => {
                assert_eq!(message, "bad model");
                assert_eq!(status, 400);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn kinds_and_retryability() {
        assert_eq!(
            Error::unsupported("x", Capability::Rerank).kind(),
            ErrorKind::Unsupported
        );
        assert!(Error::upstream("x", 503, "").is_retryable());
        assert!(!Error::upstream("x", 400, "").is_retryable());
        assert!(!Error::Timeout {
            attempts: 3,
            elapsed_ms: 10
        }
        .is_retryable());
        assert_eq!(ErrorKind::ProtocolViolation.to_string(), "protocol-violation");
    }
}
