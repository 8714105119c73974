//! Install hook: precache the manifest into a fresh store.

use futures_util::future::try_join_all;

use super::{InstallPolicy, InstallReport, OfflineCache};
use crate::Error;
use crate::cache::CacheStorage;
use crate::net::Network;
use crate::request::{AssetRequest, ResponseType};

impl<S, N> OfflineCache<S, N>
where
    S: CacheStorage + 'static,
    N: Network + 'static,
{
    pub(super) async fn run_install(&self) -> Result<InstallReport, Error> {
        let generation = self.settings.generation.clone();
        tracing::info!(generation = %generation, assets = self.settings.manifest.len(), "installing");

        match self.precache().await {
            Ok(cached) => {
                tracing::info!(generation = %generation, cached, "precached manifest");
                Ok(InstallReport { generation, cached, failure: None })
            }
            Err(err) => match self.settings.install_policy {
                InstallPolicy::Tolerant => {
                    tracing::warn!(
                        generation = %generation,
                        error = %err,
                        "precache failed; installing without offline assets"
                    );
                    Ok(InstallReport { generation, cached: 0, failure: Some(err.to_string()) })
                }
                InstallPolicy::Strict => {
                    tracing::error!(generation = %generation, error = %err, "precache failed; aborting install");
                    Err(Error::InstallFailed(err.to_string()))
                }
            },
        }
    }

    /// Open the store and add every manifest asset, all or nothing.
    ///
    /// Every asset is fetched before anything is written; one failed fetch,
    /// non-2xx status or opaque response fails the whole batch.
    async fn precache(&self) -> Result<usize, Error> {
        let generation = &self.settings.generation;
        self.storage.open(generation).await?;

        let requests: Vec<AssetRequest> = self.settings.manifest.iter().cloned().map(AssetRequest::get).collect();
        let responses = try_join_all(requests.iter().map(|request| self.network.fetch(request))).await?;

        let mut batch = Vec::with_capacity(requests.len());
        for (request, response) in requests.into_iter().zip(responses) {
            // Opaque responses report status 0 to the page.
            if response.response_type == ResponseType::Opaque {
                return Err(Error::BadStatus { url: request.url.to_string(), status: 0 });
            }
            if !response.ok() {
                return Err(Error::BadStatus { url: request.url.to_string(), status: response.status });
            }
            batch.push((request, response));
        }

        self.storage.put_all(generation, &batch).await
    }
}
