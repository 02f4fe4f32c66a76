//! Aggregate model catalog across every registered backend.

use crate::drivers::ProviderDriver;
use crate::types::response::ModelInfo;
use arc_swap::ArcSwapOption;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug)]
struct Snapshot {
    models: Arc<Vec<ModelInfo>>,
    fetched_at: Instant,
}

/// Cached union of every backend's model list.
///
/// Listing fans out to all backends concurrently, each bounded by its own timeout. A
/// backend that fails, times out or does not support listing contributes nothing; the
/// others are still returned. The cached list is replaced wholesale on refresh.
#[derive(Debug)]
pub struct ModelCatalog {
    ttl: Duration,
    per_provider_timeout: Duration,
    snapshot: ArcSwapOption<Snapshot>,
    refresh_lock: Mutex<()>,
}

impl ModelCatalog {
    pub fn new(ttl: Duration, per_provider_timeout: Duration) -> Self {
        Self {
            ttl,
            per_provider_timeout,
            snapshot: ArcSwapOption::empty(),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Cached list if it is younger than the TTL.
    pub fn cached(&self) -> Option<Arc<Vec<ModelInfo>>> {
        let guard = self.snapshot.load();
        let snap = guard.as_ref()?;
        if snap.fetched_at.elapsed() < self.ttl {
            Some(snap.models.clone())
        } else {
            None
        }
    }

    /// Cached list, or a fresh aggregate when the cache is empty or stale. Concurrent
    /// callers on a stale cache share one refresh.
    pub async fn list(&self, providers: &[Arc<dyn ProviderDriver>]) -> Arc<Vec<ModelInfo>> {
        if let Some(models) = self.cached() {
            return models;
        }
        let _guard = self.refresh_lock.lock().await;
        if let Some(models) = self.cached() {
            return models;
        }
        self.store(aggregate(providers, self.per_provider_timeout).await)
    }

    /// Ignore the cache and re-aggregate.
    pub async fn refresh(&self, providers: &[Arc<dyn ProviderDriver>]) -> Arc<Vec<ModelInfo>> {
        let _guard = self.refresh_lock.lock().await;
        self.store(aggregate(providers, self.per_provider_timeout).await)
    }

    pub fn invalidate(&self) {
        self.snapshot.store(None);
    }

    fn store(&self, models: Vec<ModelInfo>) -> Arc<Vec<ModelInfo>> {
        let models = Arc::new(models);
        self.snapshot.store(Some(Arc::new(Snapshot {
            models: models.clone(),
            fetched_at: Instant::now(),
        })));
        models
    }
}

/// Query every backend concurrently and merge the results, de-duplicated by full
/// identifier and sorted.
pub async fn aggregate(providers: &[Arc<dyn ProviderDriver>], timeout: Duration) -> Vec<ModelInfo> {
    let calls = providers.iter().map(|p| {
        let p = p.clone();
        async move {
            let id = p.provider_id().to_string();
            match tokio::time::timeout(timeout, p.list_models()).await {
                Ok(Ok(models)) => {
                    debug!(provider = %id, count = models.len(), "listed models");
                    models
                }
                Ok(Err(e)) if e.is_unsupported() => Vec::new(),
                Ok(Err(e)) => {
                    warn!(provider = %id, error = %e, "model listing failed");
                    Vec::new()
                }
                Err(_) => {
                    warn!(provider = %id, timeout_ms = timeout.as_millis() as u64, "model listing timed out");
                    Vec::new()
                }
            }
        }
    });

    let mut merged: BTreeMap<String, ModelInfo> = BTreeMap::new();
    for model in join_all(calls).await.into_iter().flatten() {
        merged.entry(model.id.clone()).or_insert(model);
    }
    merged.into_values().collect()
}
