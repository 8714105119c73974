//! SQLite-backed store of captured responses, one named store per generation.
//!
//! This module provides persistent request→response storage using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Named stores that are created on install and dropped on activation
//! - Request keys from SHA-256 over method and canonical URL
//! - `Vary`-aware matching
//! - Automatic schema migrations
//! - WAL mode so concurrent interceptions do not block each other

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod storage;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::EntrySummary;
pub use storage::CacheStorage;
