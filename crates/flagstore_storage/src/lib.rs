//! # flagstore Storage
//!
//! Connection capability for flagstore backends.
//!
//! This crate provides the lowest-level abstraction flagstore talks to:
//! a pool of connections to a key-value server that offers strings, hashes,
//! sets, and an optimistic *watch / conditional commit* primitive.
//! Connections are **opaque command channels** - they know nothing about
//! flags, versions, or the key layout built on top of them.
//!
//! ## Design Principles
//!
//! - No native compare-and-swap is assumed; only watch + atomic batch commit
//! - Missing keys are values (`None` / empty), never errors
//! - Connections are released by dropping them
//! - Pools must be `Send + Sync` so they can be shared by several stores
//!
//! ## Available Backends
//!
//! - [`InMemoryPool`] / [`InMemoryServer`] - For testing and simulations of several instances
//! - `RedisPool` (feature `redis`) - For a real Redis server
//!
//! ## Example
//!
//! ```rust
//! use flagstore_storage::{CommitOutcome, Connection, ConnectionPool, InMemoryPool, Transaction};
//!
//! let pool = InMemoryPool::standalone();
//! let mut conn = pool.acquire().unwrap();
//!
//! conn.watch("app:features").unwrap();
//! let mut tx = Transaction::new();
//! tx.hset("app:features", "flag-a", b"{\"version\":1}".to_vec());
//! assert_eq!(conn.exec(tx).unwrap(), CommitOutcome::Committed);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod connection;
mod error;
mod memory;
#[cfg(feature = "redis")]
mod redis_pool;
mod transaction;

pub use connection::{Connection, ConnectionPool};
pub use error::{StorageError, StorageResult};
pub use memory::{InMemoryConnection, InMemoryPool, InMemoryServer, InMemoryStats};
#[cfg(feature = "redis")]
pub use redis_pool::{PoolOptions, RedisPool};
pub use transaction::{Command, CommitOutcome, Transaction};
