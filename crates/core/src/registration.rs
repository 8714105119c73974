//! Registration: the lifecycle driver around cache policies.
//!
//! Plays the host platform's part. It installs a new generation, activates
//! it only after install completed, then swaps it in as the policy that
//! answers fetches. Updates are serialized; fetches keep going to the
//! previously active generation until the swap.

use std::fmt;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::Error;
use crate::cache::CacheStorage;
use crate::net::Network;
use crate::policy::{ActivateReport, CachePolicy, CacheSettings, InstallReport, Intercepted, OfflineCache};
use crate::request::AssetRequest;

/// Lifecycle state of one generation's worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Failed to install, or replaced by a newer generation.
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Result of one `register` call.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdateReport {
    pub generation: String,
    pub state: WorkerState,
    pub install: InstallReport,
    /// Absent when the activate hook itself failed; the generation still activates.
    pub activate: Option<ActivateReport>,
}

/// Snapshot of the registration for status queries.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RegistrationStatus {
    /// Generation currently answering fetches.
    pub active: Option<String>,
    /// Most recently registered generation and where it got to.
    pub latest: Option<(String, WorkerState)>,
    /// Every store that exists right now.
    pub stores: Vec<String>,
}

/// Owns the storage and network handles and the active policy.
pub struct Registration<S, N> {
    storage: Arc<S>,
    network: Arc<N>,
    active: RwLock<Option<Arc<dyn CachePolicy>>>,
    latest: RwLock<Option<(String, WorkerState)>>,
    updating: Mutex<()>,
}

impl<S, N> Registration<S, N>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    pub fn new(storage: Arc<S>, network: Arc<N>) -> Self {
        Self {
            storage,
            network,
            active: RwLock::new(None),
            latest: RwLock::new(None),
            updating: Mutex::new(()),
        }
    }

    /// Build, install and activate a generation from `settings`.
    pub async fn register(&self, settings: CacheSettings) -> Result<UpdateReport, Error> {
        let policy = OfflineCache::new(settings, Arc::clone(&self.storage), Arc::clone(&self.network));
        self.register_policy(Arc::new(policy)).await
    }

    /// Install and activate an already-built policy.
    ///
    /// On install failure the policy becomes redundant and the previous
    /// generation stays active.
    pub async fn register_policy(&self, policy: Arc<dyn CachePolicy>) -> Result<UpdateReport, Error> {
        let _guard = self.updating.lock().await;
        let generation = policy.generation().to_string();

        self.transition(&generation, WorkerState::Parsed).await;
        self.transition(&generation, WorkerState::Installing).await;
        let install = match policy.install().await {
            Ok(report) => report,
            Err(err) => {
                self.transition(&generation, WorkerState::Redundant).await;
                return Err(err);
            }
        };
        self.transition(&generation, WorkerState::Installed).await;

        self.transition(&generation, WorkerState::Activating).await;
        let activate = match policy.activate().await {
            Ok(report) => Some(report),
            Err(err) => {
                tracing::warn!(generation = %generation, error = %err, "activate hook failed; activating anyway");
                None
            }
        };

        let previous = self.active.write().await.replace(policy);
        if let Some(previous) = previous
            && previous.generation() != generation
        {
            tracing::info!(generation = %previous.generation(), "worker redundant");
        }
        self.transition(&generation, WorkerState::Activated).await;

        Ok(UpdateReport { generation, state: WorkerState::Activated, install, activate })
    }

    /// Route one request through the active generation.
    ///
    /// With nothing active the page is uncontrolled and the request goes
    /// straight to the network.
    pub async fn fetch(&self, request: AssetRequest) -> Result<Intercepted, Error> {
        let active = self.active.read().await.clone();
        match active {
            Some(policy) => policy.fetch(request).await,
            None => {
                tracing::debug!(url = %request.url, "no active generation; uncontrolled fetch");
                self.network.fetch(&request).await.map(Intercepted::network)
            }
        }
    }

    /// Generation currently answering fetches.
    pub async fn active_generation(&self) -> Option<String> {
        self.active
            .read()
            .await
            .as_ref()
            .map(|policy| policy.generation().to_string())
    }

    pub async fn status(&self) -> Result<RegistrationStatus, Error> {
        Ok(RegistrationStatus {
            active: self.active_generation().await,
            latest: self.latest.read().await.clone(),
            stores: self.storage.keys().await?,
        })
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    async fn transition(&self, generation: &str, state: WorkerState) {
        tracing::info!(generation, %state, "worker state");
        *self.latest.write().await = Some((generation.to_string(), state));
    }
}
