//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::cache::{CacheListParams, list_impl};
use crate::tools::shell_fetch::{ShellFetchParams, fetch_impl};
use crate::tools::shell_update::{ShellUpdateParams, update_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use shellcache_client::FetchClient;
use shellcache_core::{AppConfig, CacheDb, Registration};
use url::Url;

use crate::error::ToolError;

/// State shared by every tool call.
pub struct AppState {
    pub registration: Registration<CacheDb, FetchClient>,
    /// Origin fixed at startup; updates may not move it.
    pub origin: Url,
}

/// The main MCP server handler for shellcache.
#[derive(Clone)]
pub struct ShellCacheServer {
    tool_router: ToolRouter<Self>,
    state: Arc<AppState>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ShellCacheServer {
    /// Create a new server handler.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { tool_router: Self::tool_router(), state }
    }

    /// Fetch a URL the way a controlled page would.
    ///
    /// Cache first, then network; falls back to the shell document when offline.
    #[tool(
        description = "Fetch a URL through the offline cache. Serves the active generation's store first, then the network, then the fallback document when offline."
    )]
    async fn shell_fetch(&self, params: Parameters<ShellFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.state.registration, &self.state.origin, params.0).await
    }

    /// Reload configuration and install a new generation.
    #[tool(
        description = "Reload configuration and install a new cache generation. Precaches the manifest, then deletes every other generation's store."
    )]
    async fn shell_update(&self, params: Parameters<ShellUpdateParams>) -> Result<CallToolResult, McpError> {
        let config = AppConfig::load().map_err(ToolError::from)?;
        update_impl(&self.state.registration, &self.state.origin, config, params.0).await
    }

    /// List stores and the entries held by one of them.
    #[tool(description = "Show the active generation, all stores, and the entries of one store (default: active).")]
    async fn cache_list(&self, params: Parameters<CacheListParams>) -> Result<CallToolResult, McpError> {
        list_impl(&self.state.registration, params.0).await
    }
}

impl ServerHandler for ShellCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shellcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
