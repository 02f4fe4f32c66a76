//! Provider registry: slug → driver, swapped wholesale.

use crate::drivers::ProviderDriver;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

type DriverMap = HashMap<String, Arc<dyn ProviderDriver>>;

/// Read-mostly map of registered backends. Readers take a snapshot with a single atomic
/// load; writers build a new map and swap it in, so a lookup never sees a half-updated set.
pub struct ProviderRegistry {
    providers: ArcSwap<DriverMap>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Add or replace one driver, keyed by its lowercase provider id.
    pub fn register(&self, driver: Arc<dyn ProviderDriver>) {
        let key = driver.provider_id().to_ascii_lowercase();
        self.providers.rcu(|current| {
            let mut updated: DriverMap = (**current).clone();
            updated.insert(key.clone(), driver.clone());
            updated
        });
    }

    /// Replace the whole registry at once.
    pub fn replace_all<I>(&self, drivers: I)
    where
        I: IntoIterator<Item = Arc<dyn ProviderDriver>>,
    {
        let map: DriverMap = drivers
            .into_iter()
            .map(|d| (d.provider_id().to_ascii_lowercase(), d))
            .collect();
        self.providers.store(Arc::new(map));
    }

    /// Case-insensitive lookup.
    pub fn get(&self, slug: &str) -> Option<Arc<dyn ProviderDriver>> {
        self.providers.load().get(&slug.to_ascii_lowercase()).cloned()
    }

    /// Registered slugs, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.load().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Snapshot of every driver, ordered by slug.
    pub fn all(&self) -> Vec<Arc<dyn ProviderDriver>> {
        let snapshot = self.providers.load();
        let mut entries: Vec<(&String, &Arc<dyn ProviderDriver>)> = snapshot.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries.into_iter().map(|(_, d)| d.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Named(&'static str);

    #[async_trait::async_trait]
    impl ProviderDriver for Named {
        fn provider_id(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let reg = ProviderRegistry::new();
        reg.register(Arc::new(Named("OpenAI")));
        assert!(reg.get("openai").is_some());
        assert!(reg.get("OPENAI").is_some());
        assert_eq!(reg.ids(), vec!["openai".to_string()]);
    }

    #[test]
    fn replace_all_drops_previous_entries() {
        let reg = ProviderRegistry::new();
        reg.register(Arc::new(Named("a")));
        let before = reg.get("a");
        reg.replace_all(vec![Arc::new(Named("b")) as Arc<dyn ProviderDriver>]);
        assert!(reg.get("a").is_none());
        assert_eq!(reg.ids(), vec!["b".to_string()]);
        // Snapshots taken earlier stay valid.
        assert_eq!(before.map(|d| d.provider_id().to_string()), Some("a".into()));
    }
}
