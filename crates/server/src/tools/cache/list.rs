//! cache_list tool implementation.
//!
//! Reports the registration state and the entries held by one store.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{CacheDb, CacheStorage, EntrySummary, Network, Registration, RegistrationStatus};

use crate::tools::json_result;

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {
    /// Store to list (default: the active generation).
    #[serde(default)]
    pub store: Option<String>,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    #[serde(flatten)]
    pub status: RegistrationStatus,
    /// Store whose entries are listed, if any.
    pub store: Option<String>,
    pub entries: Vec<EntrySummary>,
}

/// Implementation of the cache_list tool.
pub async fn list_impl<N>(
    registration: &Registration<CacheDb, N>, params: CacheListParams,
) -> Result<CallToolResult, McpError>
where
    N: Network + 'static,
{
    let status = registration.status().await?;
    let store = params.store.or_else(|| status.active.clone());

    let entries = match &store {
        Some(name) => registration.storage().entries(name).await?,
        None => Vec::new(),
    };

    json_result(&CacheListOutput { status, store, entries })
}
