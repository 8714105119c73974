//! Activate hook: drop every store that is not the current generation.

use futures_util::future::join_all;

use super::{ActivateReport, OfflineCache};
use crate::Error;
use crate::cache::CacheStorage;
use crate::net::Network;

impl<S, N> OfflineCache<S, N>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    /// Deletions run as independent operations and are all awaited; one
    /// failing deletion does not stop the others.
    pub(super) async fn run_activate(&self) -> Result<ActivateReport, Error> {
        let generation = self.settings.generation.clone();
        tracing::info!(generation = %generation, "activating");

        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| *name != generation)
            .collect();

        let outcomes = join_all(stale.iter().map(|name| self.storage.delete(name))).await;

        let mut report = ActivateReport { generation, deleted: Vec::new(), failed: Vec::new() };
        for (name, outcome) in stale.into_iter().zip(outcomes) {
            match outcome {
                Ok(_) => {
                    tracing::info!(store = %name, "cleared stale store");
                    report.deleted.push(name);
                }
                Err(err) => {
                    tracing::warn!(store = %name, error = %err, "failed to clear stale store");
                    report.failed.push(name);
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheDb;
    use crate::policy::{CachePolicy, OfflineCache};
    use crate::testing::{FlakyStorage, ScriptedNetwork, settings};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_activate_keeps_only_current_store() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for name in ["firstaid-v0", "v1", "v2"] {
            db.create_store(name).await.unwrap();
        }
        let cache = OfflineCache::new(settings("v2", &["/"]), Arc::new(db.clone()), Arc::new(ScriptedNetwork::new()));

        let report = cache.activate().await.unwrap();
        assert_eq!(report.deleted, vec!["firstaid-v0", "v1"]);
        assert!(report.failed.is_empty());
        assert_eq!(db.store_names().await.unwrap(), vec!["v2"]);
    }

    #[tokio::test]
    async fn test_activate_without_stale_stores() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.create_store("v1").await.unwrap();
        let cache = OfflineCache::new(settings("v1", &["/"]), Arc::new(db.clone()), Arc::new(ScriptedNetwork::new()));

        let report = cache.activate().await.unwrap();
        assert!(report.deleted.is_empty());
        assert_eq!(db.store_names().await.unwrap(), vec!["v1"]);
    }

    #[tokio::test]
    async fn test_failed_deletion_is_not_fatal() {
        let db = CacheDb::open_in_memory().await.unwrap();
        for name in ["v0", "v1", "v2"] {
            db.create_store(name).await.unwrap();
        }
        let storage = FlakyStorage::new(db.clone()).fail_delete("v0");
        let cache = OfflineCache::new(settings("v2", &["/"]), Arc::new(storage), Arc::new(ScriptedNetwork::new()));

        let report = cache.activate().await.unwrap();
        assert_eq!(report.deleted, vec!["v1"]);
        assert_eq!(report.failed, vec!["v0"]);
        assert_eq!(db.store_names().await.unwrap(), vec!["v0", "v2"]);
    }
}
