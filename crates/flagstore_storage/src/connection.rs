//! Connection and pool trait definitions.

use std::sync::Arc;

use crate::error::StorageResult;
use crate::transaction::{CommitOutcome, Transaction};

/// A single checked-out connection to the backing key-value store.
///
/// Connections are **opaque command channels**. They know about strings,
/// hashes and sets, and about the watch/commit primitive, but nothing about
/// flag data, versions or key layout. flagstore owns all of that.
///
/// # Optimistic transactions
///
/// A connection offers conditional commits without a native compare-and-swap:
///
/// 1. [`watch`](Connection::watch) registers interest in a key.
/// 2. A [`Transaction`] batch is built locally (nothing is sent yet).
/// 3. [`exec`](Connection::exec) applies the batch atomically, but only if no
///    watched key was modified since it was watched. Otherwise the batch is
///    discarded and [`CommitOutcome::Aborted`] is returned.
///
/// `exec` always clears the connection's watches, whatever the outcome.
/// A caller that decides not to commit after watching must call
/// [`unwatch`](Connection::unwatch) before releasing the connection, or the
/// watch leaks into the next user of a pooled connection.
///
/// # Invariants
///
/// - Reads of missing keys return `Ok(None)` / empty collections, never an error
/// - Any `Err` is a transport-level failure
/// - Dropping a connection returns it to its pool
pub trait Connection: Send {
    /// Reads a string value.
    fn get(&mut self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Returns true if the key exists, whatever its type.
    fn exists(&mut self, key: &str) -> StorageResult<bool>;

    /// Reads one field of a hash.
    fn hget(&mut self, key: &str, field: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Reads every field of a hash. A missing hash yields an empty vector.
    fn hgetall(&mut self, key: &str) -> StorageResult<Vec<(String, Vec<u8>)>>;

    /// Reads every member of a set. A missing set yields an empty vector.
    fn smembers(&mut self, key: &str) -> StorageResult<Vec<String>>;

    /// Round-trips a trivial command to check the connection is alive.
    fn ping(&mut self) -> StorageResult<()>;

    /// Marks a key as watched for the next [`exec`](Connection::exec).
    fn watch(&mut self, key: &str) -> StorageResult<()>;

    /// Cancels every watch registered on this connection.
    fn unwatch(&mut self) -> StorageResult<()>;

    /// Applies a transaction, conditional on all watched keys being unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error only for transport failures. A watch conflict is the
    /// `Ok(CommitOutcome::Aborted)` result, not an error.
    fn exec(&mut self, transaction: Transaction) -> StorageResult<CommitOutcome>;
}

/// A source of [`Connection`]s.
///
/// # Implementors
///
/// - [`super::InMemoryPool`] - For testing and single-process use
/// - `RedisPool` (feature `redis`) - For a real Redis server
pub trait ConnectionPool: Send + Sync {
    /// Checks a connection out of the pool.
    ///
    /// The connection goes back to the pool when it is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Closed`](crate::StorageError::Closed) after
    /// [`close`](ConnectionPool::close), or a connection error if a new
    /// connection cannot be established.
    fn acquire(&self) -> StorageResult<Box<dyn Connection>>;

    /// Releases every pooled connection. Idempotent.
    fn close(&self);

    /// Returns true once [`close`](ConnectionPool::close) has been called.
    fn is_closed(&self) -> bool;
}

impl<P: ConnectionPool + ?Sized> ConnectionPool for Arc<P> {
    fn acquire(&self) -> StorageResult<Box<dyn Connection>> {
        (**self).acquire()
    }

    fn close(&self) {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}
