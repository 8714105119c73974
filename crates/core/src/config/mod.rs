//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELLCACHE_*)
//! 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The generation tag, manifest and fallback document live here rather than
//! in code: changing `generation` is the only supported way to invalidate
//! everything cached so far.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::origin;
use crate::policy::{CacheSettings, InstallPolicy};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELLCACHE_*)
/// 2. TOML config file (if SHELLCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tag naming the current store.
    ///
    /// Set via SHELLCACHE_GENERATION environment variable.
    #[serde(default = "default_generation")]
    pub generation: String,

    /// Origin of the application shell.
    ///
    /// Relative manifest entries resolve against it, and only responses from
    /// it count as basic.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Assets fetched into the store on install, in order.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Document served when both the store and the network miss.
    #[serde(default = "default_fallback")]
    pub fallback: String,

    /// What install does when a manifest asset cannot be fetched.
    #[serde(default)]
    pub install_policy: InstallPolicy,

    /// Path to the SQLite store database.
    ///
    /// Set via SHELLCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_generation() -> String {
    "shell-v1".into()
}

fn default_origin() -> String {
    "http://127.0.0.1:5000".into()
}

fn default_manifest() -> Vec<String> {
    vec!["/".into()]
}

fn default_fallback() -> String {
    "/".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shellcache.sqlite")
}

fn default_user_agent() -> String {
    "shellcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            generation: default_generation(),
            origin: default_origin(),
            manifest: default_manifest(),
            fallback: default_fallback(),
            install_policy: InstallPolicy::default(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed, or
    /// validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SHELLCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELLCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// The parsed app origin.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        origin::parse_origin(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Resolve manifest and fallback into the settings a generation is built from.
    pub fn settings(&self) -> Result<CacheSettings, ConfigError> {
        let origin = self.origin_url()?;

        let manifest = self
            .manifest
            .iter()
            .map(|entry| {
                origin::resolve(&origin, entry).map_err(|e| ConfigError::Invalid {
                    field: "manifest".into(),
                    reason: format!("{entry:?}: {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let fallback = origin::resolve(&origin, &self.fallback)
            .map_err(|e| ConfigError::Invalid { field: "fallback".into(), reason: e.to_string() })?;

        Ok(CacheSettings {
            generation: self.generation.clone(),
            manifest,
            fallback,
            install_policy: self.install_policy,
        })
    }
}
