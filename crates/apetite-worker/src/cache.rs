//! Install-time precaching and activation-time eviction.
//!
//! Exactly one cache version is current. Install fills the current cache
//! from the precache list; activation deletes every other version and then
//! claims the connected page contexts, in that order.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clients::ClientRegistry;
use crate::error::Result;
use crate::fetch::NetworkFetcher;
use crate::resource::CachedResource;
use crate::storage::Storage;

/// What install accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Cache version that was filled.
    pub version: String,
    /// Number of resources cached.
    pub cached: usize,
    /// URLs that could not be precached.
    pub skipped: Vec<String>,
}

/// What activation accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    /// Names of the cache versions that were evicted.
    pub evicted: Vec<String>,
    /// Number of page contexts newly claimed.
    pub claimed: usize,
}

/// Fills and maintains the current cache version.
pub struct CacheManager {
    version: String,
    precache_urls: Vec<String>,
    fetcher: Arc<dyn NetworkFetcher>,
}

impl CacheManager {
    /// Create a manager for the given cache version and precache list.
    pub fn new(
        version: impl Into<String>,
        precache_urls: Vec<String>,
        fetcher: Arc<dyn NetworkFetcher>,
    ) -> Self {
        Self {
            version: version.into(),
            precache_urls,
            fetcher,
        }
    }

    /// The cache version this manager maintains.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Install: ensure the current cache exists and fill it from the
    /// precache list.
    ///
    /// An asset that fails to fetch, or comes back with an error status, is
    /// logged and skipped. Install itself only fails on storage errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache or a fetched resource cannot be stored.
    pub async fn install(&self, storage: &Storage) -> Result<InstallReport> {
        storage.ensure_cache(&self.version)?;

        let mut cached = 0;
        let mut skipped = Vec::new();
        for url in &self.precache_urls {
            match self.fetcher.fetch(url).await {
                Ok(response) if response.is_success() => {
                    let resource =
                        CachedResource::new(url, response.content_type, response.body);
                    storage.put_resource(&self.version, &resource)?;
                    debug!("Precached {}", url);
                    cached += 1;
                }
                Ok(response) => {
                    warn!("Skipping precache of {} (status {})", url, response.status);
                    skipped.push(url.clone());
                }
                Err(e) => {
                    warn!("Failed to precache {}: {}", url, e);
                    skipped.push(url.clone());
                }
            }
        }

        info!(
            "Installed cache {}: {} resources cached, {} skipped",
            self.version,
            cached,
            skipped.len()
        );
        Ok(InstallReport {
            version: self.version.clone(),
            cached,
            skipped,
        })
    }

    /// Activate: evict every cache version other than the current one, then
    /// claim all connected page contexts.
    ///
    /// # Errors
    ///
    /// Returns an error if eviction fails or the client registry is
    /// unavailable.
    pub async fn activate(
        &self,
        storage: &Storage,
        registry: &ClientRegistry,
    ) -> Result<ActivationReport> {
        let evicted = storage.delete_caches_except(&self.version)?;
        for name in &evicted {
            info!("Evicted stale cache {}", name);
        }

        // Claiming happens strictly after eviction so no claimed page can
        // still be served out of a stale cache
        let claimed = registry.claim_all()?;
        if claimed > 0 {
            info!("Claimed {} page contexts", claimed);
        }

        Ok(ActivationReport { evicted, claimed })
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("version", &self.version)
            .field("precache_urls", &self.precache_urls)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientKind;
    use crate::fetch::testing::StaticFetcher;

    const VERSION: &str = "meu-apetite-v1";

    fn urls(paths: &[&str]) -> Vec<String> {
        paths
            .iter()
            .map(|p| format!("https://meuapetite.app{p}"))
            .collect()
    }

    #[tokio::test]
    async fn test_install_precaches_all_assets() {
        let storage = Storage::open_in_memory().unwrap();
        let fetcher = StaticFetcher::new()
            .route("https://meuapetite.app/", Some("text/html"), b"<html>")
            .route(
                "https://meuapetite.app/static/js/main.js",
                Some("application/javascript"),
                b"void 0;",
            );
        let manager = CacheManager::new(VERSION, urls(&["/", "/static/js/main.js"]), Arc::new(fetcher));

        let report = manager.install(&storage).await.unwrap();
        assert_eq!(report.cached, 2);
        assert!(report.skipped.is_empty());
        assert_eq!(storage.resource_count(VERSION).unwrap(), 2);

        let page = storage
            .get_resource(VERSION, "https://meuapetite.app/")
            .unwrap()
            .unwrap();
        assert_eq!(page.body, b"<html>");
        assert_eq!(page.content_type.as_deref(), Some("text/html"));
    }

    #[tokio::test]
    async fn test_install_skips_failed_asset() {
        let storage = Storage::open_in_memory().unwrap();
        let fetcher = StaticFetcher::new()
            .route("https://meuapetite.app/", None, b"<html>")
            .fail("https://meuapetite.app/static/css/main.css");
        let manager = CacheManager::new(
            VERSION,
            urls(&["/", "/static/css/main.css"]),
            Arc::new(fetcher),
        );

        let report = manager.install(&storage).await.unwrap();
        assert_eq!(report.cached, 1);
        assert_eq!(
            report.skipped,
            vec!["https://meuapetite.app/static/css/main.css".to_string()]
        );
        assert_eq!(storage.resource_count(VERSION).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_install_skips_error_status() {
        let storage = Storage::open_in_memory().unwrap();
        // No route registered, so the fetcher answers 404
        let fetcher = StaticFetcher::new();
        let manager = CacheManager::new(VERSION, urls(&["/images/logo192.png"]), Arc::new(fetcher));

        let report = manager.install(&storage).await.unwrap();
        assert_eq!(report.cached, 0);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(storage.resource_count(VERSION).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_install_creates_cache_even_when_list_is_empty() {
        let storage = Storage::open_in_memory().unwrap();
        let manager = CacheManager::new(VERSION, Vec::new(), Arc::new(StaticFetcher::new()));

        let report = manager.install(&storage).await.unwrap();
        assert_eq!(report.cached, 0);
        assert!(storage.cache_exists(VERSION).unwrap());
    }

    #[tokio::test]
    async fn test_reinstall_replaces_resources() {
        let storage = Storage::open_in_memory().unwrap();
        let url = "https://meuapetite.app/";
        let fetcher = StaticFetcher::new().route(url, None, b"first");
        let manager = CacheManager::new(VERSION, vec![url.to_string()], Arc::new(fetcher));
        manager.install(&storage).await.unwrap();

        let fetcher = StaticFetcher::new().route(url, None, b"second");
        let manager = CacheManager::new(VERSION, vec![url.to_string()], Arc::new(fetcher));
        manager.install(&storage).await.unwrap();

        assert_eq!(storage.resource_count(VERSION).unwrap(), 1);
        let resource = storage.get_resource(VERSION, url).unwrap().unwrap();
        assert_eq!(resource.body, b"second");
    }

    #[tokio::test]
    async fn test_activate_evicts_stale_caches() {
        let storage = Storage::open_in_memory().unwrap();
        storage.ensure_cache("meu-apetite-v0").unwrap();
        storage
            .put_resource(
                "meu-apetite-v0",
                &CachedResource::new("https://meuapetite.app/", None, b"old".to_vec()),
            )
            .unwrap();
        storage.ensure_cache(VERSION).unwrap();

        let registry = ClientRegistry::new();
        let manager = CacheManager::new(VERSION, Vec::new(), Arc::new(StaticFetcher::new()));

        let report = manager.activate(&storage, &registry).await.unwrap();
        assert_eq!(report.evicted, vec!["meu-apetite-v0".to_string()]);

        // Only the current version survives activation
        assert_eq!(storage.cache_names().unwrap(), vec![VERSION.to_string()]);
        assert_eq!(storage.resource_count("meu-apetite-v0").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_activate_claims_clients() {
        let storage = Storage::open_in_memory().unwrap();
        storage.ensure_cache(VERSION).unwrap();

        let registry = ClientRegistry::new();
        let (_a, _rx1) = registry.connect("/", ClientKind::Window, true).unwrap();
        let (_b, _rx2) = registry.connect("/orders", ClientKind::Window, false).unwrap();

        let manager = CacheManager::new(VERSION, Vec::new(), Arc::new(StaticFetcher::new()));
        let report = manager.activate(&storage, &registry).await.unwrap();
        assert_eq!(report.claimed, 2);
        assert!(registry.clients().unwrap().iter().all(|c| c.controlled));
    }

    #[tokio::test]
    async fn test_activate_with_nothing_to_do() {
        let storage = Storage::open_in_memory().unwrap();
        storage.ensure_cache(VERSION).unwrap();

        let registry = ClientRegistry::new();
        let manager = CacheManager::new(VERSION, Vec::new(), Arc::new(StaticFetcher::new()));
        let report = manager.activate(&storage, &registry).await.unwrap();
        assert!(report.evicted.is_empty());
        assert_eq!(report.claimed, 0);
    }
}
