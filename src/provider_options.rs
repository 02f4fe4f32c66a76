//! Per-vendor option bags.
//!
//! Each unified request carries a map from provider slug to an opaque JSON value. The
//! map stays untyped at the boundary; only the backend that owns a slug decodes its
//! entry, into whatever shape it expects:
//!
//! ```rust
//! use ai_gateway_rust::provider_options::extract;
//! use ai_gateway_rust::types::{ChatRequest, Message};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Default, PartialEq, Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct OpenAiKnobs {
//!     reasoning_effort: Option<String>,
//! }
//!
//! let req = ChatRequest::new("openai/o3", vec![Message::user("hi")])
//!     .provider_option("openai", serde_json::json!({"reasoningEffort": "low"}));
//! let knobs: OpenAiKnobs = extract(&req, "openai");
//! assert_eq!(knobs.reasoning_effort.as_deref(), Some("low"));
//!
//! // Absent slugs decode to the default, never an error.
//! let none: OpenAiKnobs = extract(&req, "anthropic");
//! assert_eq!(none, OpenAiKnobs::default());
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Provider slug → opaque vendor options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderOptions(BTreeMap<String, serde_json::Value>);

impl ProviderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slug: impl Into<String>, value: serde_json::Value) {
        self.0.insert(slug.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw entry for `slug`. Exact match first, then ASCII case-insensitive, mirroring
    /// how the router matches slugs. Among several case-insensitive matches the
    /// lexicographically smallest key wins.
    pub fn get(&self, slug: &str) -> Option<&serde_json::Value> {
        self.0.get(slug).or_else(|| {
            self.0
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(slug))
                .map(|(_, v)| v)
        })
    }

    /// Typed view of the entry for `slug`.
    ///
    /// Returns `T::default()` when the slug is absent, the value is `null`, or the value
    /// does not fit `T`. Vendor knob mistakes must not fail the rest of the request.
    pub fn typed<T>(&self, slug: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        let Some(value) = self.get(slug) else {
            return T::default();
        };
        if value.is_null() {
            return T::default();
        }
        match serde_json::from_value::<T>(value.clone()) {
            Ok(v) => v,
            Err(e) => {
                debug!(
                    provider = slug,
                    target = std::any::type_name::<T>(),
                    error = %e,
                    "ignoring provider options that do not match the expected shape"
                );
                T::default()
            }
        }
    }
}

impl FromIterator<(String, serde_json::Value)> for ProviderOptions {
    fn from_iter<I: IntoIterator<Item = (String, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Anything that carries a provider-options bag.
pub trait HasProviderOptions {
    fn provider_options(&self) -> &ProviderOptions;
}

/// Decode the options `request` carries for `slug`; see [`ProviderOptions::typed`].
pub fn extract<T, R>(request: &R, slug: &str) -> T
where
    T: DeserializeOwned + Default,
    R: HasProviderOptions + ?Sized,
{
    request.provider_options().typed(slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatRequest, Message};
    use serde_json::json;

    #[derive(Debug, Default, Clone, PartialEq, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Knobs {
        seed_mode: Option<String>,
        #[serde(default)]
        beams: u32,
    }

    fn request(options: serde_json::Value) -> ChatRequest {
        ChatRequest::new("acme/m", vec![Message::user("x")]).provider_option("acme", options)
    }

    #[test]
    fn decodes_matching_shape() {
        let req = request(json!({"seedMode": "fixed", "beams": 3}));
        let k: Knobs = extract(&req, "acme");
        assert_eq!(
            k,
            Knobs {
                seed_mode: Some("fixed".into()),
                beams: 3
            }
        );
    }

    #[test]
    fn absent_null_and_mismatched_fall_back_to_default() {
        let req = request(json!({"beams": "many"}));
        assert_eq!(extract::<Knobs, _>(&req, "acme"), Knobs::default());
        assert_eq!(extract::<Knobs, _>(&req, "other"), Knobs::default());

        let req = request(serde_json::Value::Null);
        assert_eq!(extract::<Knobs, _>(&req, "acme"), Knobs::default());
    }

    #[test]
    fn extraction_is_idempotent_and_case_insensitive() {
        let req = request(json!({"beams": 2}));
        let a: Knobs = extract(&req, "ACME");
        let b: Knobs = extract(&req, "ACME");
        assert_eq!(a, b);
        assert_eq!(a.beams, 2);
    }

    #[test]
    fn case_variants_resolve_the_same_way_every_time() {
        let forward: ProviderOptions = [
            ("acme".to_string(), json!({"beams": 1})),
            ("ACME".to_string(), json!({"beams": 2})),
        ]
        .into_iter()
        .collect();
        let mut backward = ProviderOptions::new();
        backward.insert("ACME", json!({"beams": 2}));
        backward.insert("acme", json!({"beams": 1}));

        for options in [&forward, &backward] {
            assert_eq!(options.typed::<Knobs>("acme").beams, 1);
            assert_eq!(options.typed::<Knobs>("ACME").beams, 2);
            assert_eq!(options.typed::<Knobs>("Acme").beams, 2);
        }
    }
}
