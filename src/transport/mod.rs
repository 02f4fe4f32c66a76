//! HTTP plumbing shared by the backends.

pub mod http;

pub use http::HttpTransport;

/// Failures below the HTTP status line: connect, TLS, timeout, body read.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}
