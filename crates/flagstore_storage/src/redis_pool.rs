//! Redis-backed connection pool.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::connection::{Connection, ConnectionPool};
use crate::error::{StorageError, StorageResult};
use crate::transaction::{Command, CommitOutcome, Transaction};

/// Sizing and lifetime limits for a [`RedisPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum number of idle connections kept for reuse.
    pub max_idle: usize,
    /// Maximum number of open connections (0 = unlimited). Callers block
    /// when the limit is reached until a connection is released.
    pub max_active: usize,
    /// Idle connections older than this are closed instead of reused.
    pub idle_timeout: Duration,
    /// Limit on establishing a new connection (`None` = OS default).
    pub connect_timeout: Option<Duration>,
    /// Limit on waiting for a reply (`None` = wait forever).
    pub read_timeout: Option<Duration>,
    /// Limit on sending a command (`None` = wait forever).
    pub write_timeout: Option<Duration>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_idle: 20,
            max_active: 16,
            idle_timeout: Duration::from_secs(300),
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

struct IdleConnection {
    conn: redis::Connection,
    since: Instant,
}

struct PoolState {
    idle: Vec<IdleConnection>,
    /// Idle plus checked-out connections.
    open: usize,
}

struct Shared {
    client: redis::Client,
    options: PoolOptions,
    state: Mutex<PoolState>,
    released: Condvar,
    closed: AtomicBool,
}

impl Shared {
    fn release(&self, conn: redis::Connection) {
        let mut state = self.state.lock();
        if self.closed.load(Ordering::SeqCst) || state.idle.len() >= self.options.max_idle {
            state.open -= 1;
            drop(conn);
        } else {
            state.idle.push(IdleConnection {
                conn,
                since: Instant::now(),
            });
        }
        self.released.notify_one();
    }

    fn forget(&self) {
        let mut state = self.state.lock();
        state.open -= 1;
        self.released.notify_one();
    }
}

/// A blocking connection pool for a Redis server.
///
/// Every borrowed idle connection is checked with `PING` before it is handed
/// out; connections that fail the check are discarded and replaced.
pub struct RedisPool {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPool")
            .field("options", &self.shared.options)
            .field("closed", &self.shared.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl RedisPool {
    /// Creates a pool for the given `redis://` or `rediss://` URL.
    ///
    /// `rediss://` requires the `tls` feature; without it such URLs are
    /// rejected here.
    ///
    /// No connection is opened until the first [`acquire`](ConnectionPool::acquire).
    ///
    /// # Errors
    ///
    /// Returns a connection error if the URL cannot be parsed.
    pub fn open(url: &str, options: PoolOptions) -> StorageResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| StorageError::connection(format!("invalid Redis URL: {}", e)))?;
        Ok(Self {
            shared: Arc::new(Shared {
                client,
                options,
                state: Mutex::new(PoolState {
                    idle: Vec::new(),
                    open: 0,
                }),
                released: Condvar::new(),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Returns the pool's limits.
    pub fn options(&self) -> PoolOptions {
        self.shared.options
    }

    fn dial(&self) -> redis::RedisResult<redis::Connection> {
        let options = &self.shared.options;
        let conn = match options.connect_timeout {
            Some(timeout) => self.shared.client.get_connection_with_timeout(timeout)?,
            None => self.shared.client.get_connection()?,
        };
        conn.set_read_timeout(options.read_timeout)?;
        conn.set_write_timeout(options.write_timeout)?;
        Ok(conn)
    }

    fn checkout(&self) -> StorageResult<redis::Connection> {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        loop {
            if shared.closed.load(Ordering::SeqCst) {
                return Err(StorageError::Closed);
            }

            if let Some(idle) = state.idle.pop() {
                let IdleConnection { mut conn, since } = idle;
                if since.elapsed() > shared.options.idle_timeout {
                    state.open -= 1;
                    continue;
                }
                drop(state);
                if redis::cmd("PING").query::<String>(&mut conn).is_ok() {
                    return Ok(conn);
                }
                debug!("discarding pooled Redis connection that failed PING");
                state = shared.state.lock();
                state.open -= 1;
                continue;
            }

            if shared.options.max_active == 0 || state.open < shared.options.max_active {
                state.open += 1;
                drop(state);
                return match self.dial() {
                    Ok(conn) => Ok(conn),
                    Err(err) => {
                        shared.forget();
                        Err(err.into())
                    }
                };
            }

            shared.released.wait(&mut state);
        }
    }
}

impl ConnectionPool for RedisPool {
    fn acquire(&self) -> StorageResult<Box<dyn Connection>> {
        let conn = self.checkout()?;
        Ok(Box::new(RedisConnection {
            conn: Some(conn),
            shared: Arc::clone(&self.shared),
            watching: false,
        }))
    }

    fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut state = self.shared.state.lock();
        let drained = state.idle.len();
        state.idle.clear();
        state.open -= drained;
        self.shared.released.notify_all();
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

/// A connection checked out of a [`RedisPool`].
struct RedisConnection {
    conn: Option<redis::Connection>,
    shared: Arc<Shared>,
    watching: bool,
}

impl RedisConnection {
    fn conn(&mut self) -> StorageResult<&mut redis::Connection> {
        self.conn.as_mut().ok_or(StorageError::Closed)
    }
}

impl Connection for RedisConnection {
    fn get(&mut self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(redis::cmd("GET").arg(key).query(self.conn()?)?)
    }

    fn exists(&mut self, key: &str) -> StorageResult<bool> {
        Ok(redis::cmd("EXISTS").arg(key).query(self.conn()?)?)
    }

    fn hget(&mut self, key: &str, field: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(redis::cmd("HGET").arg(key).arg(field).query(self.conn()?)?)
    }

    fn hgetall(&mut self, key: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        let fields: HashMap<String, Vec<u8>> =
            redis::cmd("HGETALL").arg(key).query(self.conn()?)?;
        Ok(fields.into_iter().collect())
    }

    fn smembers(&mut self, key: &str) -> StorageResult<Vec<String>> {
        Ok(redis::cmd("SMEMBERS").arg(key).query(self.conn()?)?)
    }

    fn ping(&mut self) -> StorageResult<()> {
        let _: String = redis::cmd("PING").query(self.conn()?)?;
        Ok(())
    }

    fn watch(&mut self, key: &str) -> StorageResult<()> {
        redis::cmd("WATCH").arg(key).query::<()>(self.conn()?)?;
        self.watching = true;
        Ok(())
    }

    fn unwatch(&mut self) -> StorageResult<()> {
        self.watching = false;
        redis::cmd("UNWATCH").query::<()>(self.conn()?)?;
        Ok(())
    }

    fn exec(&mut self, transaction: Transaction) -> StorageResult<CommitOutcome> {
        // EXEC discards watches whether or not it succeeds.
        self.watching = false;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in transaction.into_commands() {
            match command {
                Command::Del { key } => {
                    pipe.cmd("DEL").arg(key).ignore();
                }
                Command::HSet { key, field, value } => {
                    pipe.cmd("HSET").arg(key).arg(field).arg(value).ignore();
                }
                Command::Set { key, value } => {
                    pipe.cmd("SET").arg(key).arg(value).ignore();
                }
            }
        }

        // A nil EXEC reply means a watched key changed.
        let reply: Option<()> = pipe.query(self.conn()?)?;
        Ok(match reply {
            Some(()) => CommitOutcome::Committed,
            None => CommitOutcome::Aborted,
        })
    }
}

impl Drop for RedisConnection {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        if self.watching && redis::cmd("UNWATCH").query::<()>(&mut conn).is_err() {
            self.shared.forget();
            return;
        }
        self.shared.release(conn);
    }
}
