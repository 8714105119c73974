//! The storage seam the cache policy is written against.
//!
//! `CacheDb` is the production implementation; tests substitute their own
//! to simulate failing deletions or writes.

use async_trait::async_trait;

use super::connection::CacheDb;
use super::entries::EntrySummary;
use crate::Error;
use crate::request::{AssetRequest, CapturedResponse};

/// Named stores of request→response pairs.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open the named store, creating it if absent.
    async fn open(&self, name: &str) -> Result<(), Error>;

    /// Names of every existing store.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Delete the named store; false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Look up `request` in the named store.
    async fn match_request(&self, name: &str, request: &AssetRequest) -> Result<Option<CapturedResponse>, Error>;

    /// Store one pair in an existing store.
    async fn put(&self, name: &str, request: &AssetRequest, response: &CapturedResponse) -> Result<(), Error>;

    /// Store a batch atomically in an existing store.
    async fn put_all(&self, name: &str, batch: &[(AssetRequest, CapturedResponse)]) -> Result<usize, Error>;

    /// Entries of the named store.
    async fn entries(&self, name: &str) -> Result<Vec<EntrySummary>, Error>;
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<(), Error> {
        if self.create_store(name).await? {
            tracing::debug!(store = name, "created store");
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.store_names().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.delete_store(name).await
    }

    async fn match_request(&self, name: &str, request: &AssetRequest) -> Result<Option<CapturedResponse>, Error> {
        self.match_entry(name, request).await
    }

    async fn put(&self, name: &str, request: &AssetRequest, response: &CapturedResponse) -> Result<(), Error> {
        self.put_entry(name, request, response).await
    }

    async fn put_all(&self, name: &str, batch: &[(AssetRequest, CapturedResponse)]) -> Result<usize, Error> {
        self.put_entries(name, batch).await
    }

    async fn entries(&self, name: &str) -> Result<Vec<EntrySummary>, Error> {
        self.list_entries(name).await
    }
}
