//! In-memory backend for testing.
//!
//! [`InMemoryServer`] plays the role of a shared key-value server and
//! [`InMemoryPool`] the role of one process's connection pool. Several pools
//! attached to the same server behave like independent instances sharing one
//! database, which is how concurrent writers are simulated in tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::connection::{Connection, ConnectionPool};
use crate::error::{StorageError, StorageResult};
use crate::transaction::{Command, CommitOutcome, Transaction};

#[derive(Debug, Clone)]
enum Value {
    Str(Vec<u8>),
    Hash(HashMap<String, Vec<u8>>),
    Set(BTreeSet<String>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Hash(_) => "hash",
            Value::Set(_) => "set",
        }
    }
}

/// Keys plus the revision counters that back WATCH.
///
/// A key's revision is bumped on every write or removal. Removed keys keep
/// their last revision so a watcher still sees the removal as a change.
#[derive(Debug, Default)]
struct Keyspace {
    values: HashMap<String, Value>,
    revisions: HashMap<String, u64>,
    next_revision: u64,
}

impl Keyspace {
    fn revision(&self, key: &str) -> u64 {
        self.revisions.get(key).copied().unwrap_or(0)
    }

    fn touch(&mut self, key: &str) {
        self.next_revision += 1;
        self.revisions.insert(key.to_string(), self.next_revision);
    }

    fn check_type(&self, key: &str, expected: &'static str) -> StorageResult<()> {
        match self.values.get(key) {
            Some(value) if value.type_name() != expected => Err(StorageError::unexpected_reply(
                format!("WRONGTYPE key {} holds a {}, not a {}", key, value.type_name(), expected),
            )),
            _ => Ok(()),
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Del { key } => {
                if self.values.remove(&key).is_some() {
                    self.touch(&key);
                }
            }
            Command::HSet { key, field, value } => {
                let entry = self
                    .values
                    .entry(key.clone())
                    .or_insert_with(|| Value::Hash(HashMap::new()));
                if let Value::Hash(hash) = entry {
                    hash.insert(field, value);
                }
                self.touch(&key);
            }
            Command::Set { key, value } => {
                self.values.insert(key.clone(), Value::Str(value));
                self.touch(&key);
            }
        }
    }
}

/// Counters exposed for resource-leak assertions in tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InMemoryStats {
    /// Connections currently checked out of any pool on this server.
    pub connections_in_use: usize,
    /// Connections that were released while still holding a watch.
    pub leaked_watches: usize,
    /// Transactions that were applied.
    pub commits: u64,
    /// Transactions discarded because a watched key changed.
    pub aborts: u64,
}

/// A shared in-memory key-value server.
///
/// # Thread Safety
///
/// The server is thread-safe and is normally shared behind an [`Arc`] by
/// every pool that connects to it.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use flagstore_storage::{Connection, ConnectionPool, InMemoryPool, InMemoryServer};
///
/// let server = Arc::new(InMemoryServer::new());
/// server.sadd("app:members", "a");
///
/// let pool = InMemoryPool::new(Arc::clone(&server));
/// let mut conn = pool.acquire().unwrap();
/// assert_eq!(conn.smembers("app:members").unwrap(), vec!["a".to_string()]);
/// ```
#[derive(Debug)]
pub struct InMemoryServer {
    keyspace: RwLock<Keyspace>,
    available: AtomicBool,
    connections_in_use: AtomicUsize,
    leaked_watches: AtomicUsize,
    commits: AtomicU64,
    aborts: AtomicU64,
}

impl Default for InMemoryServer {
    fn default() -> Self {
        Self {
            keyspace: RwLock::new(Keyspace::default()),
            available: AtomicBool::new(true),
            connections_in_use: AtomicUsize::new(0),
            leaked_watches: AtomicUsize::new(0),
            commits: AtomicU64::new(0),
            aborts: AtomicU64::new(0),
        }
    }
}

impl InMemoryServer {
    /// Creates an empty, reachable server.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent command succeed (`true`) or fail with a
    /// connection error (`false`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns true if the server currently accepts commands.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Returns a snapshot of the accounting counters.
    pub fn stats(&self) -> InMemoryStats {
        InMemoryStats {
            connections_in_use: self.connections_in_use.load(Ordering::SeqCst),
            leaked_watches: self.leaked_watches.load(Ordering::SeqCst),
            commits: self.commits.load(Ordering::SeqCst),
            aborts: self.aborts.load(Ordering::SeqCst),
        }
    }

    /// Sets a string value directly, bypassing any connection.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.keyspace.write().apply(Command::Set {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Sets a hash field directly, replacing the key if it is not a hash.
    pub fn hset(&self, key: impl Into<String>, field: impl Into<String>, value: impl Into<Vec<u8>>) {
        let key = key.into();
        let mut keyspace = self.keyspace.write();
        if keyspace.check_type(&key, "hash").is_err() {
            keyspace.values.remove(&key);
        }
        keyspace.apply(Command::HSet {
            key,
            field: field.into(),
            value: value.into(),
        });
    }

    /// Reads a hash field directly.
    pub fn hget(&self, key: &str, field: &str) -> Option<Vec<u8>> {
        match self.keyspace.read().values.get(key) {
            Some(Value::Hash(hash)) => hash.get(field).cloned(),
            _ => None,
        }
    }

    /// Adds a member to a set directly, replacing the key if it is not a set.
    pub fn sadd(&self, key: impl Into<String>, member: impl Into<String>) {
        let key = key.into();
        let mut keyspace = self.keyspace.write();
        let entry = keyspace
            .values
            .entry(key.clone())
            .or_insert_with(|| Value::Set(BTreeSet::new()));
        if !matches!(entry, Value::Set(_)) {
            *entry = Value::Set(BTreeSet::new());
        }
        if let Value::Set(set) = entry {
            set.insert(member.into());
        }
        keyspace.touch(&key);
    }

    /// Removes a key directly.
    pub fn del(&self, key: &str) {
        self.keyspace.write().apply(Command::Del {
            key: key.to_string(),
        });
    }

    /// Removes every key that starts with `prefix` followed by a colon.
    ///
    /// Returns the number of keys removed.
    pub fn clear_prefix(&self, prefix: &str) -> usize {
        let pattern = format!("{}:", prefix);
        let mut keyspace = self.keyspace.write();
        let doomed: Vec<String> = keyspace
            .values
            .keys()
            .filter(|k| k.starts_with(&pattern))
            .cloned()
            .collect();
        for key in &doomed {
            keyspace.apply(Command::Del { key: key.clone() });
        }
        doomed.len()
    }

    /// Returns every key currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.keyspace.read().values.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn ensure_available(&self) -> StorageResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(StorageError::connection("in-memory server is unavailable"))
        }
    }
}

/// A connection pool attached to an [`InMemoryServer`].
///
/// # Example
///
/// ```rust
/// use flagstore_storage::{ConnectionPool, InMemoryPool};
///
/// let pool = InMemoryPool::standalone();
/// pool.close();
/// pool.close();
/// assert!(pool.acquire().is_err());
/// ```
#[derive(Debug)]
pub struct InMemoryPool {
    server: Arc<InMemoryServer>,
    closed: AtomicBool,
}

impl InMemoryPool {
    /// Creates a pool connected to a shared server.
    #[must_use]
    pub fn new(server: Arc<InMemoryServer>) -> Self {
        Self {
            server,
            closed: AtomicBool::new(false),
        }
    }

    /// Creates a pool with its own private server.
    #[must_use]
    pub fn standalone() -> Self {
        Self::new(Arc::new(InMemoryServer::new()))
    }

    /// Returns the server this pool connects to.
    pub fn server(&self) -> &Arc<InMemoryServer> {
        &self.server
    }
}

impl ConnectionPool for InMemoryPool {
    fn acquire(&self) -> StorageResult<Box<dyn Connection>> {
        if self.is_closed() {
            return Err(StorageError::Closed);
        }
        self.server.ensure_available()?;
        self.server.connections_in_use.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryConnection {
            server: Arc::clone(&self.server),
            watched: Vec::new(),
        }))
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A connection checked out of an [`InMemoryPool`].
#[derive(Debug)]
pub struct InMemoryConnection {
    server: Arc<InMemoryServer>,
    /// Watched keys with the revision observed at watch time.
    watched: Vec<(String, u64)>,
}

impl InMemoryConnection {
    /// Returns the number of keys currently watched by this connection.
    pub fn watch_count(&self) -> usize {
        self.watched.len()
    }
}

impl Connection for InMemoryConnection {
    fn get(&mut self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.server.ensure_available()?;
        let keyspace = self.server.keyspace.read();
        keyspace.check_type(key, "string")?;
        match keyspace.values.get(key) {
            Some(Value::Str(bytes)) => Ok(Some(bytes.clone())),
            _ => Ok(None),
        }
    }

    fn exists(&mut self, key: &str) -> StorageResult<bool> {
        self.server.ensure_available()?;
        Ok(self.server.keyspace.read().values.contains_key(key))
    }

    fn hget(&mut self, key: &str, field: &str) -> StorageResult<Option<Vec<u8>>> {
        self.server.ensure_available()?;
        let keyspace = self.server.keyspace.read();
        keyspace.check_type(key, "hash")?;
        match keyspace.values.get(key) {
            Some(Value::Hash(hash)) => Ok(hash.get(field).cloned()),
            _ => Ok(None),
        }
    }

    fn hgetall(&mut self, key: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        self.server.ensure_available()?;
        let keyspace = self.server.keyspace.read();
        keyspace.check_type(key, "hash")?;
        match keyspace.values.get(key) {
            Some(Value::Hash(hash)) => Ok(hash
                .iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    fn smembers(&mut self, key: &str) -> StorageResult<Vec<String>> {
        self.server.ensure_available()?;
        let keyspace = self.server.keyspace.read();
        keyspace.check_type(key, "set")?;
        match keyspace.values.get(key) {
            Some(Value::Set(set)) => Ok(set.iter().cloned().collect()),
            _ => Ok(Vec::new()),
        }
    }

    fn ping(&mut self) -> StorageResult<()> {
        self.server.ensure_available()
    }

    fn watch(&mut self, key: &str) -> StorageResult<()> {
        self.server.ensure_available()?;
        let revision = self.server.keyspace.read().revision(key);
        self.watched.push((key.to_string(), revision));
        Ok(())
    }

    fn unwatch(&mut self) -> StorageResult<()> {
        // Cleared before the availability check: a dead server holds no watch
        // state, so the connection must not report one either.
        self.watched.clear();
        self.server.ensure_available()
    }

    fn exec(&mut self, transaction: Transaction) -> StorageResult<CommitOutcome> {
        let watched = std::mem::take(&mut self.watched);
        self.server.ensure_available()?;

        let mut keyspace = self.server.keyspace.write();
        let conflict = watched
            .iter()
            .any(|(key, revision)| keyspace.revision(key) != *revision);
        if conflict {
            self.server.aborts.fetch_add(1, Ordering::SeqCst);
            return Ok(CommitOutcome::Aborted);
        }

        // Type errors are detected up front so a bad batch applies nothing.
        let mut pending_types: HashMap<&str, &'static str> = HashMap::new();
        for command in transaction.commands() {
            match command {
                Command::Del { key } => {
                    pending_types.insert(key.as_str(), "none");
                }
                Command::HSet { key, .. } => {
                    let current = pending_types.get(key.as_str()).copied();
                    match current {
                        Some("none") | Some("hash") => {}
                        Some(other) => {
                            return Err(StorageError::unexpected_reply(format!(
                                "WRONGTYPE key {} holds a {}, not a hash",
                                key, other
                            )))
                        }
                        None => keyspace.check_type(key, "hash")?,
                    }
                    pending_types.insert(key.as_str(), "hash");
                }
                Command::Set { key, .. } => {
                    pending_types.insert(key.as_str(), "string");
                }
            }
        }

        for command in transaction.into_commands() {
            keyspace.apply(command);
        }
        self.server.commits.fetch_add(1, Ordering::SeqCst);
        Ok(CommitOutcome::Committed)
    }
}

impl Drop for InMemoryConnection {
    fn drop(&mut self) {
        if !self.watched.is_empty() {
            self.server.leaked_watches.fetch_add(1, Ordering::SeqCst);
        }
        self.server.connections_in_use.fetch_sub(1, Ordering::SeqCst);
    }
}
