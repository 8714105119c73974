//! Core types and policy for shellcache, an offline cache for an
//! application shell.
//!
//! This crate provides:
//! - Request/response model and request keys
//! - SQLite-backed named stores, one per generation
//! - The install / activate / fetch cache policy and its registration
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod net;
pub mod origin;
pub mod policy;
pub mod registration;
pub mod request;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheDb, CacheStorage, EntrySummary};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use net::Network;
pub use policy::{CachePolicy, CacheSettings, InstallPolicy, Intercepted, OfflineCache, ResponseSource};
pub use registration::{Registration, RegistrationStatus, UpdateReport, WorkerState};
pub use request::{AssetRequest, CapturedResponse, Headers, ResponseType};
