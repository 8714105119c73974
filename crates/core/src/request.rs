//! Request descriptors and captured responses.
//!
//! These are the key and value types of a store. Header names are kept
//! lower-case so that `Vary` matching and lookups are case-insensitive.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::origin::{self, UrlError};

/// Headers as an ordered, lower-cased name → value map.
pub type Headers = BTreeMap<String, String>;

/// An outgoing request issued by the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub method: String,
    pub url: Url,
    pub headers: Headers,
}

impl AssetRequest {
    /// A plain `GET` with no headers.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".into(), url, headers: Headers::new() }
    }

    /// Build a request from page-supplied parts, resolving `url` against `origin`.
    pub fn from_parts(origin: &Url, method: &str, url: &str, headers: Headers) -> Result<Self, Error> {
        let method = method.trim().to_ascii_uppercase();
        if method.is_empty() {
            return Err(Error::InvalidInput("method cannot be empty".into()));
        }

        let url = origin::resolve(origin, url).map_err(|e: UrlError| Error::InvalidUrl(e.to_string()))?;
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();

        Ok(Self { method, url, headers })
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Only `GET` requests take part in matching and storage.
    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// How a response relates to the app origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response with no cross-origin hop.
    Basic,
    /// Cross-origin response the server opted into sharing.
    Cors,
    /// Cross-origin response without opt-in; status and body cannot be trusted.
    Opaque,
    /// Synthesized network error.
    Error,
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Opaque => "opaque",
            ResponseType::Error => "error",
        };
        f.write_str(s)
    }
}

impl FromStr for ResponseType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(ResponseType::Basic),
            "cors" => Ok(ResponseType::Cors),
            "opaque" => Ok(ResponseType::Opaque),
            "error" => Ok(ResponseType::Error),
            other => Err(Error::CorruptEntry(format!("unknown response type: {other}"))),
        }
    }
}

/// A response as received from the network or read back from a store.
///
/// The body is a [`Bytes`] handle, so cloning shares the buffer; the fetch
/// interceptor clones once for the store and hands the original back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedResponse {
    /// Final URL after redirects.
    pub url: Url,
    pub status: u16,
    pub response_type: ResponseType,
    pub headers: Headers,
    pub body: Bytes,
}

impl CapturedResponse {
    /// Status in the 2xx range.
    pub fn ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Eligible for runtime population: basic and successful.
    ///
    /// Partial content is excluded because range requests are never stored.
    pub fn is_cacheable(&self) -> bool {
        self.response_type == ResponseType::Basic && self.ok() && self.status != 206
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Lower-cased header names listed in `Vary`.
    pub fn vary_names(&self) -> Vec<String> {
        self.header("vary")
            .map(|v| {
                v.split(',')
                    .map(|name| name.trim().to_ascii_lowercase())
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}
