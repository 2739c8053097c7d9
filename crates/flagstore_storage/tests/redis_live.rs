//! Tests against a running Redis server.
//!
//! Ignored by default. Run with
//! `FLAGSTORE_REDIS_URL=redis://localhost:6379 cargo test --features redis -- --ignored`.

#![cfg(feature = "redis")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use flagstore_storage::{CommitOutcome, Connection, ConnectionPool, PoolOptions, RedisPool, Transaction};

fn server_url() -> String {
    std::env::var("FLAGSTORE_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

fn pool(options: PoolOptions) -> RedisPool {
    RedisPool::open(&server_url(), options).unwrap()
}

/// A key no other run will touch.
fn unique_key(name: &str) -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    format!(
        "flagstore_live_{}_{}_{}:{}",
        std::process::id(),
        nanos,
        COUNTER.fetch_add(1, Ordering::Relaxed),
        name
    )
}

fn delete(pool: &RedisPool, key: &str) {
    let mut conn = pool.acquire().unwrap();
    let mut tx = Transaction::new();
    tx.del(key);
    conn.exec(tx).unwrap();
}

#[test]
#[ignore]
fn write_between_watch_and_exec_aborts() {
    let a = pool(PoolOptions::default());
    let b = pool(PoolOptions::default());
    let key = unique_key("hash");

    let mut watcher = a.acquire().unwrap();
    watcher.watch(&key).unwrap();
    assert_eq!(watcher.hget(&key, "f").unwrap(), None);

    let mut other = b.acquire().unwrap();
    let mut tx = Transaction::new();
    tx.hset(key.as_str(), "f", b"other".to_vec());
    assert_eq!(other.exec(tx).unwrap(), CommitOutcome::Committed);

    let mut tx = Transaction::new();
    tx.hset(key.as_str(), "f", b"mine".to_vec());
    assert_eq!(watcher.exec(tx).unwrap(), CommitOutcome::Aborted);
    assert_eq!(watcher.hget(&key, "f").unwrap(), Some(b"other".to_vec()));

    drop(watcher);
    drop(other);
    delete(&a, &key);
}

#[test]
#[ignore]
fn connection_dropped_while_watching_comes_back_clean() {
    // One connection per pool, so the second acquire reuses the first socket.
    let options = PoolOptions {
        max_active: 1,
        max_idle: 1,
        ..PoolOptions::default()
    };
    let a = pool(options);
    let b = pool(PoolOptions::default());
    let key = unique_key("hash");

    let mut conn = a.acquire().unwrap();
    conn.watch(&key).unwrap();
    drop(conn);

    let mut other = b.acquire().unwrap();
    let mut tx = Transaction::new();
    tx.hset(key.as_str(), "f", b"other".to_vec());
    assert!(other.exec(tx).unwrap().is_committed());

    // A lingering watch would abort this commit.
    let mut reused = a.acquire().unwrap();
    let mut tx = Transaction::new();
    tx.hset(key.as_str(), "f", b"mine".to_vec());
    assert_eq!(reused.exec(tx).unwrap(), CommitOutcome::Committed);
    assert_eq!(reused.hget(&key, "f").unwrap(), Some(b"mine".to_vec()));

    drop(reused);
    drop(other);
    delete(&a, &key);
}

#[test]
#[ignore]
fn idle_connections_are_reused_and_expired() {
    let options = PoolOptions {
        max_active: 1,
        max_idle: 1,
        idle_timeout: Duration::from_millis(50),
        ..PoolOptions::default()
    };
    let pool = pool(options);

    let mut conn = pool.acquire().unwrap();
    conn.ping().unwrap();
    drop(conn);

    // Passes the borrow-time PING and is handed out again.
    let mut conn = pool.acquire().unwrap();
    conn.ping().unwrap();
    drop(conn);

    // Past the idle timeout the old socket is closed and a new one dialed.
    thread::sleep(Duration::from_millis(120));
    let mut conn = pool.acquire().unwrap();
    conn.ping().unwrap();
}

#[test]
#[ignore]
fn full_pool_blocks_until_release() {
    let options = PoolOptions {
        max_active: 1,
        ..PoolOptions::default()
    };
    let pool = std::sync::Arc::new(pool(options));
    let held = pool.acquire().unwrap();

    let waiter = {
        let pool = std::sync::Arc::clone(&pool);
        thread::spawn(move || pool.acquire().and_then(|mut conn| conn.ping()).is_ok())
    };
    thread::sleep(Duration::from_millis(50));
    assert!(!waiter.is_finished());

    drop(held);
    assert!(waiter.join().unwrap());
}
