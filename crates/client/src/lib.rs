//! Network client for shellcache.
//!
//! This crate provides the reqwest-backed [`FetchClient`], the real
//! [`shellcache_core::Network`] behind the offline cache, and the response
//! classification it applies.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, classify, flatten_headers};
