//! Big-segment store: sync metadata and per-context membership.
//!
//! Everything under these keys is written by an external synchronizer; this
//! module only reads.

use flagstore_storage::ConnectionPool;
use tracing::debug;

use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::keyspace::Keyspace;
use crate::membership::{resolve, Membership};
use crate::types::BigSegmentMetadata;

/// Read-only view of the big-segment data for one prefix.
pub struct BigSegmentStore<P: ConnectionPool> {
    keyspace: Keyspace,
    pool: P,
}

impl<P: ConnectionPool> std::fmt::Debug for BigSegmentStore<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigSegmentStore")
            .field("prefix", &self.keyspace.prefix())
            .finish()
    }
}

impl<P: ConnectionPool> BigSegmentStore<P> {
    /// Creates a store over an existing pool.
    pub fn with_pool(config: &StoreConfig, pool: P) -> Self {
        Self {
            keyspace: Keyspace::new(config.prefix.clone()),
            pool,
        }
    }

    /// Returns the keyspace this store reads from.
    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// Reads the time of the last completed synchronization.
    ///
    /// Returns `Ok(None)` if no synchronization has ever run for this prefix,
    /// so "never synced" stays distinct from "synced at time 0".
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreUnavailable`] on transport failure and
    /// [`CoreError::MalformedData`] if the stored value is not a decimal
    /// millisecond timestamp.
    pub fn get_metadata(&self) -> CoreResult<Option<BigSegmentMetadata>> {
        let key = self.keyspace.sync_time_key();
        let mut conn = self.pool.acquire()?;
        let Some(raw) = conn.get(&key)? else {
            debug!("No synchronization time recorded at {}", key);
            return Ok(None);
        };

        let text = std::str::from_utf8(&raw)
            .map_err(|e| CoreError::malformed_data(key.as_str(), e.to_string()))?;
        // Plain decimal digits only: no whitespace, no sign.
        if !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::malformed_data(
                key.as_str(),
                format!("{:?} is not a decimal timestamp", text),
            ));
        }
        let last_up_to_date = text
            .parse::<u64>()
            .map_err(|e| CoreError::malformed_data(key.as_str(), format!("{:?}: {}", text, e)))?;
        Ok(Some(BigSegmentMetadata { last_up_to_date }))
    }

    /// Reads the include and exclude sets for one hashed context key and
    /// resolves them. Inclusion wins when a reference is in both.
    ///
    /// A context with no records yields an empty [`Membership`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreUnavailable`] on transport failure.
    pub fn get_membership(&self, context_hash_key: &str) -> CoreResult<Membership> {
        let mut conn = self.pool.acquire()?;
        let included = conn.smembers(&self.keyspace.include_key(context_hash_key))?;
        let excluded = conn.smembers(&self.keyspace.exclude_key(context_hash_key))?;
        Ok(resolve(included, excluded))
    }

    /// Releases every pooled connection. Idempotent.
    pub fn close(&self) {
        self.pool.close();
    }
}

#[cfg(feature = "redis")]
impl BigSegmentStore<flagstore_storage::RedisPool> {
    /// Opens a store with its own Redis pool built from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URL cannot be parsed.
    pub fn open(config: &StoreConfig) -> CoreResult<Self> {
        let pool = crate::config::open_redis_pool(config)?;
        Ok(Self::with_pool(config, pool))
    }
}
