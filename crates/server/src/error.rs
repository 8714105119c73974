//! Structured errors for the shellcache server.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use shellcache_core::ConfigError;

/// Errors raised by the tool layer itself, before the cache is involved.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid input parameters (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Configuration could not be reloaded.
    #[error("CONFIG_ERROR: {0}")]
    Config(#[from] ConfigError),

    /// Tool output could not be serialized.
    #[error("SERIALIZE_FAILED: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let code = match &err {
            ToolError::InvalidInput(_) | ToolError::Config(_) => -32602,
            ToolError::Serialize(_) => -32603,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
