//! Fetch hook: cache first, network on miss, fallback document when offline.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::OfflineCache;
use crate::Error;
use crate::cache::CacheStorage;
use crate::net::Network;
use crate::request::{AssetRequest, CapturedResponse};

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ResponseSource {
    /// Served from the current store without touching the network.
    Cache,
    /// Served from the network; `populating` when a copy is being stored.
    Network { populating: bool },
    /// Network failed; served the fallback document from the store.
    Fallback,
}

/// The answer to one intercepted request.
#[derive(Debug)]
pub struct Intercepted {
    pub response: CapturedResponse,
    pub source: ResponseSource,
    /// Background store write, when one was started.
    ///
    /// The response never waits on it. Dropping the handle detaches the
    /// write; awaiting it observes completion.
    pub population: Option<JoinHandle<()>>,
}

impl Intercepted {
    pub fn network(response: CapturedResponse) -> Self {
        Self { response, source: ResponseSource::Network { populating: false }, population: None }
    }
}

impl<S, N> OfflineCache<S, N>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    pub(super) async fn run_fetch(&self, request: AssetRequest) -> Result<Intercepted, Error> {
        let generation = &self.settings.generation;

        match self.storage.match_request(generation, &request).await {
            Ok(Some(response)) => {
                tracing::debug!(method = %request.method, url = %request.url, "cache hit");
                return Ok(Intercepted { response, source: ResponseSource::Cache, population: None });
            }
            Ok(None) => tracing::debug!(method = %request.method, url = %request.url, "cache miss"),
            Err(err) => {
                tracing::warn!(url = %request.url, error = %err, "store lookup failed; going to network")
            }
        }

        match self.network.fetch(&request).await {
            Ok(response) => {
                if !(request.is_get() && response.is_cacheable()) {
                    tracing::debug!(
                        url = %request.url,
                        status = response.status,
                        response_type = %response.response_type,
                        "not cacheable"
                    );
                    return Ok(Intercepted::network(response));
                }

                let population = self.populate(request, response.clone());
                Ok(Intercepted {
                    response,
                    source: ResponseSource::Network { populating: true },
                    population: Some(population),
                })
            }
            Err(err) => self.serve_fallback(&request, err).await,
        }
    }

    /// Store `copy` for future hits without blocking the caller.
    fn populate(&self, request: AssetRequest, copy: CapturedResponse) -> JoinHandle<()> {
        let storage = Arc::clone(&self.storage);
        let generation = self.settings.generation.clone();
        tokio::spawn(async move {
            match storage.put(&generation, &request, &copy).await {
                Ok(()) => tracing::debug!(store = %generation, url = %request.url, "populated store"),
                Err(err) => {
                    tracing::warn!(store = %generation, url = %request.url, error = %err, "failed to populate store")
                }
            }
        })
    }

    /// Substitute the fallback document for a failed network request.
    ///
    /// If the fallback is not stored either, the original error is returned.
    async fn serve_fallback(&self, request: &AssetRequest, err: Error) -> Result<Intercepted, Error> {
        let fallback = AssetRequest::get(self.settings.fallback.clone());

        match self.storage.match_request(&self.settings.generation, &fallback).await {
            Ok(Some(response)) => {
                tracing::info!(url = %request.url, error = %err, fallback = %fallback.url, "offline; serving fallback");
                Ok(Intercepted { response, source: ResponseSource::Fallback, population: None })
            }
            Ok(None) => {
                tracing::warn!(url = %request.url, error = %err, fallback = %fallback.url, "offline and fallback not cached");
                Err(err)
            }
            Err(lookup) => {
                tracing::warn!(url = %request.url, error = %err, lookup_error = %lookup, "offline and fallback lookup failed");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheDb;
    use crate::policy::CachePolicy;
    use crate::testing::{ScriptedNetwork, settings, url};

    async fn installed(manifest: &[&str], network: ScriptedNetwork) -> (CacheDb, Arc<ScriptedNetwork>, impl CachePolicy) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(network);
        let cache = OfflineCache::new(settings("v1", manifest), Arc::new(db.clone()), Arc::clone(&network));
        cache.install().await.unwrap();
        (db, network, cache)
    }

    #[tokio::test]
    async fn test_hit_makes_no_network_call() {
        let (_db, network, cache) = installed(&["/"], ScriptedNetwork::new().page("/", "<html>home</html>")).await;
        let before = network.calls();

        let result = cache.fetch(AssetRequest::get(url("/"))).await.unwrap();
        assert_eq!(result.source, ResponseSource::Cache);
        assert_eq!(&result.response.body[..], b"<html>home</html>");
        assert_eq!(network.calls(), before);
    }

    #[tokio::test]
    async fn test_hit_is_not_revalidated() {
        let (_db, network, cache) = installed(&["/"], ScriptedNetwork::new().page("/", "old")).await;
        network.replace("/", "new");

        let result = cache.fetch(AssetRequest::get(url("/"))).await.unwrap();
        assert_eq!(result.response.body_text(), "old");
    }

    #[tokio::test]
    async fn test_hit_after_miss() {
        let network = ScriptedNetwork::new()
            .page("/", "<html>home</html>")
            .page("/static/js/booking.js", "book()");
        let (_db, network, cache) = installed(&["/"], network).await;

        let first = cache.fetch(AssetRequest::get(url("/static/js/booking.js"))).await.unwrap();
        assert_eq!(first.source, ResponseSource::Network { populating: true });
        assert_eq!(first.response.body_text(), "book()");
        first.population.unwrap().await.unwrap();

        let calls = network.calls();
        let second = cache.fetch(AssetRequest::get(url("/static/js/booking.js"))).await.unwrap();
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(second.response.body_text(), "book()");
        assert_eq!(network.calls(), calls);
    }

    #[tokio::test]
    async fn test_concurrent_misses_leave_one_entry() {
        let network = ScriptedNetwork::new()
            .page("/", "<html>home</html>")
            .page("/static/js/script.js", "init()");
        let (db, _network, cache) = installed(&["/"], network).await;
        let request = AssetRequest::get(url("/static/js/script.js"));

        let (first, second) = tokio::join!(cache.fetch(request.clone()), cache.fetch(request.clone()));
        for result in [first.unwrap(), second.unwrap()] {
            assert_eq!(result.response.body_text(), "init()");
            if let Some(population) = result.population {
                population.await.unwrap();
            }
        }

        let scripts: Vec<_> = db
            .list_entries("v1")
            .await
            .unwrap()
            .into_iter()
            .filter(|entry| entry.url == "http://app.test/static/js/script.js")
            .collect();
        assert_eq!(scripts.len(), 1);
        let hit = cache.fetch(request).await.unwrap();
        assert_eq!(hit.source, ResponseSource::Cache);
    }

    #[tokio::test]
    async fn test_non_2xx_is_not_stored() {
        let network = ScriptedNetwork::new()
            .page("/", "<html>home</html>")
            .status("/api/slots", 503, "busy");
        let (db, _network, cache) = installed(&["/"], network).await;

        let result = cache.fetch(AssetRequest::get(url("/api/slots"))).await.unwrap();
        assert_eq!(result.response.status, 503);
        assert_eq!(result.source, ResponseSource::Network { populating: false });
        assert!(result.population.is_none());
        assert!(db.match_entry("v1", &AssetRequest::get(url("/api/slots"))).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_opaque_is_not_stored() {
        let tile = "https://tiles.test/voyager/13/5/7.png";
        let network = ScriptedNetwork::new().page("/", "<html>home</html>").opaque(tile, "png");
        let (db, _network, cache) = installed(&["/"], network).await;
        let request = AssetRequest::get(crate::origin::canonicalize(tile).unwrap());

        let result = cache.fetch(request.clone()).await.unwrap();
        assert_eq!(result.response.body_text(), "png");
        assert!(result.population.is_none());
        assert!(db.match_entry("v1", &request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cors_is_not_stored_at_runtime() {
        let lib = "https://cdn.test/leaflet.css";
        let network = ScriptedNetwork::new().page("/", "<html>home</html>").cors(lib, ".leaflet{}");
        let (db, _network, cache) = installed(&["/"], network).await;
        let request = AssetRequest::get(crate::origin::canonicalize(lib).unwrap());

        let result = cache.fetch(request.clone()).await.unwrap();
        assert!(result.population.is_none());
        assert!(db.match_entry("v1", &request).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_post_is_not_stored() {
        let network = ScriptedNetwork::new()
            .page("/", "<html>home</html>")
            .page("/book", "{\"ok\":true}");
        let (_db, network, cache) = installed(&["/"], network).await;
        let mut post = AssetRequest::get(url("/book"));
        post.method = "POST".into();

        let first = cache.fetch(post.clone()).await.unwrap();
        assert!(first.population.is_none());
        let calls = network.calls();
        cache.fetch(post).await.unwrap();
        assert_eq!(network.calls(), calls + 1);
    }

    #[tokio::test]
    async fn test_offline_miss_serves_fallback() {
        let network = ScriptedNetwork::new()
            .page("/", "<html>home</html>")
            .page("/static/css/style.css", "body{}");
        let (_db, network, cache) = installed(&["/", "/static/css/style.css"], network).await;
        network.set_offline(true);

        let result = cache.fetch(AssetRequest::get(url("/unknown.js"))).await.unwrap();
        assert_eq!(result.source, ResponseSource::Fallback);
        assert_eq!(result.response.status, 200);
        assert_eq!(result.response.body_text(), "<html>home</html>");
    }

    #[tokio::test]
    async fn test_offline_hit_still_served_from_store() {
        let network = ScriptedNetwork::new()
            .page("/", "<html>home</html>")
            .page("/static/css/style.css", "body{}");
        let (_db, network, cache) = installed(&["/", "/static/css/style.css"], network).await;
        network.set_offline(true);

        let result = cache.fetch(AssetRequest::get(url("/static/css/style.css"))).await.unwrap();
        assert_eq!(result.source, ResponseSource::Cache);
        assert_eq!(result.response.body_text(), "body{}");
    }

    #[tokio::test]
    async fn test_offline_without_fallback_surfaces_error() {
        let network = ScriptedNetwork::new()
            .page("/", "<html>home</html>")
            .page("/static/css/style.css", "body{}");
        let (_db, network, cache) = installed(&["/static/css/style.css"], network).await;
        network.set_offline(true);

        let result = cache.fetch(AssetRequest::get(url("/unknown.js"))).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_lookup_failure_falls_through_to_network() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let storage = crate::testing::FlakyStorage::new(db).fail_match();
        let network = ScriptedNetwork::new().page("/", "<html>home</html>");
        let cache = OfflineCache::new(settings("v1", &["/"]), Arc::new(storage), Arc::new(network));

        let result = cache.fetch(AssetRequest::get(url("/"))).await.unwrap();
        assert_eq!(result.response.body_text(), "<html>home</html>");
        assert!(matches!(result.source, ResponseSource::Network { .. }));
    }
}
