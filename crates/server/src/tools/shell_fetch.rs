//! shell_fetch tool implementation.
//!
//! Routes one page request through the active generation's interceptor.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{AssetRequest, CacheDb, Headers, Network, Registration, ResponseSource, ResponseType};
use url::Url;

use super::json_result;
use crate::error::ToolError;

/// Input parameters for shell_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellFetchParams {
    /// URL to request; paths resolve against the app origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests are served from or stored in the cache.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for shell_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ShellFetchOutput {
    /// The URL requested, after resolution.
    pub url: String,
    /// The URL the response was captured from.
    pub final_url: String,
    pub status: u16,
    /// Cache, network or fallback.
    pub source: ResponseSource,
    pub response_type: ResponseType,
    pub headers: Headers,
    /// Body as text (lossy for binary content).
    pub body: String,
    pub body_bytes: usize,
}

/// Implementation of the shell_fetch tool.
pub async fn fetch_impl<N>(
    registration: &Registration<CacheDb, N>, origin: &Url, params: ShellFetchParams,
) -> Result<CallToolResult, McpError>
where
    N: Network + 'static,
{
    if params.url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url cannot be empty".into()).into());
    }

    let request = AssetRequest::from_parts(origin, &params.method, &params.url, params.headers)?;
    let url = request.url.to_string();

    let intercepted = registration.fetch(request).await?;
    let response = intercepted.response;

    let output = ShellFetchOutput {
        url,
        final_url: response.url.to_string(),
        status: response.status,
        source: intercepted.source,
        response_type: response.response_type,
        body: response.body_text(),
        body_bytes: response.body.len(),
        headers: response.headers,
    };

    json_result(&output)
}
