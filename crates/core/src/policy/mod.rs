//! The offline cache policy: install, activate and fetch hooks.
//!
//! A policy instance is bound to one generation. Its settings are injected
//! at construction, and it reaches the store and the network only through
//! the [`CacheStorage`] and [`Network`] seams, so a generation can be
//! exercised against an in-memory database and a scripted network.

mod activate;
mod fetch;
mod install;

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::cache::CacheStorage;
use crate::net::Network;
use crate::request::AssetRequest;

pub use fetch::{Intercepted, ResponseSource};

/// What install does when the manifest cannot be fully cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum InstallPolicy {
    /// Log the failure and let the generation activate without precached assets.
    #[default]
    Tolerant,
    /// Fail the install; the generation never activates.
    Strict,
}

/// Everything a generation is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Name of this generation's store.
    pub generation: String,
    /// Absolute URLs precached on install, in order.
    pub manifest: Vec<Url>,
    /// Entry served when both store and network miss.
    pub fallback: Url,
    pub install_policy: InstallPolicy,
}

/// Outcome of an install.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InstallReport {
    pub generation: String,
    /// Manifest entries written to the store.
    pub cached: usize,
    /// Why precaching failed, when the tolerant policy swallowed it.
    pub failure: Option<String>,
}

/// Outcome of an activation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ActivateReport {
    pub generation: String,
    /// Stale stores removed.
    pub deleted: Vec<String>,
    /// Stale stores whose deletion failed.
    pub failed: Vec<String>,
}

/// Lifecycle hooks, invoked by a dispatcher the policy does not control.
#[async_trait]
pub trait CachePolicy: Send + Sync {
    /// The generation tag this policy serves.
    fn generation(&self) -> &str;

    /// Populate this generation's store from the manifest.
    async fn install(&self) -> Result<InstallReport, Error>;

    /// Remove every store that is not this generation's.
    async fn activate(&self) -> Result<ActivateReport, Error>;

    /// Answer one intercepted request.
    async fn fetch(&self, request: AssetRequest) -> Result<Intercepted, Error>;
}

/// Cache-first policy with network fallback, runtime population and an
/// offline fallback document.
pub struct OfflineCache<S, N> {
    settings: CacheSettings,
    storage: Arc<S>,
    network: Arc<N>,
}

impl<S, N> OfflineCache<S, N>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    pub fn new(settings: CacheSettings, storage: Arc<S>, network: Arc<N>) -> Self {
        Self { settings, storage, network }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }
}

#[async_trait]
impl<S, N> CachePolicy for OfflineCache<S, N>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    fn generation(&self) -> &str {
        &self.settings.generation
    }

    async fn install(&self) -> Result<InstallReport, Error> {
        self.run_install().await
    }

    async fn activate(&self) -> Result<ActivateReport, Error> {
        self.run_activate().await
    }

    async fn fetch(&self, request: AssetRequest) -> Result<Intercepted, Error> {
        self.run_fetch(request).await
    }
}
