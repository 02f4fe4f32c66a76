//! # ai-gateway-rust
//!
//! Provider-agnostic gateway core: one request shape per capability, one unified
//! output streaming protocol, regardless of which vendor ends up serving the call.
//!
//! ## Overview
//!
//! A caller addresses a model as `"<provider>/<vendor-model>"`. The [`routing::Router`]
//! resolves the provider slug against a registry of [`drivers::ProviderDriver`]
//! implementations, hands the request (with the bare vendor model name) to the
//! backend, and returns either a unified response or a stream of
//! [`types::OutputPart`]s.
//!
//! Vendors reply in three incompatible shapes, all normalized by the [`pipeline`]:
//!
//! - chat-delta SSE (`data: {json}` lines terminated by `[DONE]`)
//! - typed SSE events (Response-API style, one `type` tag per event)
//! - asynchronous jobs, adapted through the [`poller`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_gateway_rust::routing::RouterBuilder;
//! use ai_gateway_rust::types::{ChatRequest, Message};
//! use ai_gateway_rust::CancelHandle;
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> ai_gateway_rust::Result<()> {
//!     let config = ai_gateway_rust::config::GatewayConfig::load("gateway.yaml").await?;
//!     let router = RouterBuilder::new().with_config(&config)?.build();
//!
//!     let request = ChatRequest::new("openai/gpt-4o-mini", vec![Message::user("Hello!")]);
//!     let cancel = CancelHandle::new();
//!     let mut parts = router.chat_stream(request, &cancel).await?;
//!     while let Some(part) = parts.next().await {
//!         println!("{}", serde_json::to_string(&part)?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`types`] | Unified requests, responses and the output-part protocol |
//! | [`provider_options`] | Typed, fail-soft access to per-vendor option bags |
//! | [`drivers`] | Provider capability contract and the OpenAI-compatible backend |
//! | [`routing`] | Model id parsing, provider registry, aggregate model catalog |
//! | [`pipeline`] | SSE decoding and the streaming translation state machines |
//! | [`poller`] | Submit-then-poll primitive for job-style vendor APIs |
//! | [`transport`] | HTTP transport shared by backends |
//! | [`config`] | Gateway configuration (YAML + env overrides) |

pub mod config;
pub mod drivers;
pub mod pipeline;
pub mod poller;
pub mod provider_options;
pub mod routing;
pub mod transport;
pub mod types;

pub use drivers::{Capability, ProviderDriver};
pub use pipeline::{CancelHandle, PartStream};
pub use poller::{JobState, PollConfig, Poller};
pub use routing::{ModelId, Router, RouterBuilder};
pub use types::OutputPart;

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `Result<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = Result<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, ErrorKind};
