//! The network seam.

use async_trait::async_trait;

use crate::Error;
use crate::request::{AssetRequest, CapturedResponse};

/// Issues real requests on behalf of the cache.
///
/// Implementations return `Ok` for any response the server produced,
/// whatever its status, and a network-class [`Error`] when no response
/// arrived at all.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &AssetRequest) -> Result<CapturedResponse, Error>;
}
