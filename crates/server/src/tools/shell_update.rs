//! shell_update tool implementation.
//!
//! Re-reads configuration and registers the resulting generation. The
//! previous generation keeps answering fetches until the new one activates.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{AppConfig, CacheDb, ConfigError, Network, Registration};
use url::Url;

use super::json_result;
use crate::error::ToolError;

/// Input parameters for shell_update tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ShellUpdateParams {
    /// Generation tag to install instead of the configured one.
    #[serde(default)]
    pub generation: Option<String>,
}

/// Implementation of the shell_update tool.
///
/// `config` is the freshly loaded configuration; the origin must match the
/// one the server started with.
pub async fn update_impl<N>(
    registration: &Registration<CacheDb, N>, origin: &Url, mut config: AppConfig, params: ShellUpdateParams,
) -> Result<CallToolResult, McpError>
where
    N: Network + 'static,
{
    if let Some(generation) = params.generation {
        config.generation = generation;
    }
    config.validate().map_err(ToolError::from)?;

    let reloaded = config.origin_url().map_err(ToolError::from)?;
    if &reloaded != origin {
        let err = ConfigError::Invalid {
            field: "origin".into(),
            reason: format!("cannot change from {origin} to {reloaded} without a restart"),
        };
        return Err(ToolError::from(err).into());
    }

    let settings = config.settings().map_err(ToolError::from)?;
    let report = registration.register(settings).await?;

    tracing::info!(
        generation = %report.generation,
        cached = report.install.cached,
        "generation updated"
    );

    json_result(&report)
}
