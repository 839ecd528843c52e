//! Token replay protection
//!
//! A token id accepted once must not be accepted again while the token could
//! still be presented. Backends implement [`TokenReplayCache`]; the response
//! processor only ever calls [`TokenReplayCache::insert_if_absent`], which
//! must be a single atomic operation against the backing store (Redis
//! `SET NX PX`, a SQL insert on a unique key, a map entry lock, ...).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::ReplayCacheError;

/// Accepted inserts between automatic purges of a [`MemoryReplayCache`]
pub const DEFAULT_PURGE_INTERVAL: u64 = 1024;

/// Trait for replay cache backends
///
/// Implementations must be safe to share across request threads.
pub trait TokenReplayCache: Send + Sync + std::fmt::Debug {
    /// Whether `id` is currently recorded
    ///
    /// # Errors
    ///
    /// Returns [`ReplayCacheError`] when the backend cannot be queried.
    fn contains_id(&self, id: &str) -> Result<bool, ReplayCacheError>;

    /// Record `id`, replacing any existing entry
    ///
    /// `ttl` of `None` keeps the entry forever.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayCacheError::InvalidId`] for an empty id, or another
    /// [`ReplayCacheError`] when the backend write fails.
    fn insert_id(&self, id: &str, ttl: Option<Duration>) -> Result<(), ReplayCacheError>;

    /// Atomically record `id` unless it is already present
    ///
    /// # Returns
    /// * `Ok(true)` - id was not present and is now recorded (first use)
    /// * `Ok(false)` - id already present (replay)
    /// * `Err(_)` - backend failure
    ///
    /// # Errors
    ///
    /// Returns [`ReplayCacheError::InvalidId`] for an empty id, or another
    /// [`ReplayCacheError`] when the backend cannot perform the insert.
    fn insert_if_absent(&self, id: &str, ttl: Option<Duration>) -> Result<bool, ReplayCacheError>;

    /// Drop expired entries, returning how many were removed
    ///
    /// # Errors
    ///
    /// Returns [`ReplayCacheError`] when the backend cannot be purged.
    fn purge_expired(&self) -> Result<usize, ReplayCacheError> {
        Ok(0)
    }
}

/// Usage statistics of a replay cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayCacheStats {
    /// Entries currently held (expired entries not yet purged included)
    pub entries: u64,
    /// Ids accepted for the first time
    pub accepted: u64,
    /// Presentations rejected as replays
    pub rejected: u64,
    /// Entries removed by purging
    pub purged: u64,
}

#[derive(Debug, Clone, Copy)]
struct ReplayEntry {
    expires_at: Option<Instant>,
}

impl ReplayEntry {
    fn new(now: Instant, ttl: Option<Duration>) -> Self {
        Self {
            expires_at: ttl.and_then(|ttl| now.checked_add(ttl)),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process replay cache
///
/// Suitable for single-instance deployments and tests. Clustered relying
/// parties need a shared backend, otherwise a token can be replayed against a
/// different node.
///
/// Expired entries are dropped automatically every `purge_interval` accepted
/// inserts (default [`DEFAULT_PURGE_INTERVAL`]), so the map stays bounded by
/// the number of tokens still inside their lifetime. Entries without a TTL,
/// or with one beyond the clock's range, are kept forever.
#[derive(Debug)]
pub struct MemoryReplayCache {
    entries: DashMap<String, ReplayEntry>,
    accepted: AtomicU64,
    rejected: AtomicU64,
    purged: AtomicU64,
    purge_interval: u64,
}

impl Default for MemoryReplayCache {
    fn default() -> Self {
        Self::with_purge_interval(DEFAULT_PURGE_INTERVAL)
    }
}

impl MemoryReplayCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache purging expired entries every `interval`
    /// accepted inserts (at least one)
    #[must_use]
    pub fn with_purge_interval(interval: u64) -> Self {
        Self {
            entries: DashMap::new(),
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            purged: AtomicU64::new(0),
            purge_interval: interval.max(1),
        }
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Usage statistics
    pub fn stats(&self) -> ReplayCacheStats {
        ReplayCacheStats {
            entries: self.entries.len() as u64,
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
        }
    }

    fn check_id(id: &str) -> Result<(), ReplayCacheError> {
        if id.is_empty() {
            return Err(ReplayCacheError::InvalidId("empty token id".to_string()));
        }
        Ok(())
    }
}

impl TokenReplayCache for MemoryReplayCache {
    fn contains_id(&self, id: &str) -> Result<bool, ReplayCacheError> {
        let now = Instant::now();
        Ok(self
            .entries
            .get(id)
            .is_some_and(|entry| !entry.is_expired(now)))
    }

    fn insert_id(&self, id: &str, ttl: Option<Duration>) -> Result<(), ReplayCacheError> {
        Self::check_id(id)?;
        self.entries
            .insert(id.to_owned(), ReplayEntry::new(Instant::now(), ttl));
        Ok(())
    }

    fn insert_if_absent(&self, id: &str, ttl: Option<Duration>) -> Result<bool, ReplayCacheError> {
        Self::check_id(id)?;
        let now = Instant::now();

        // The entry guard holds the shard write lock for the whole check-and-set.
        let inserted = match self.entries.entry(id.to_owned()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(ReplayEntry::new(now, ttl));
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(ReplayEntry::new(now, ttl));
                true
            }
        };

        if inserted {
            let accepted = self.accepted.fetch_add(1, Ordering::Relaxed) + 1;
            trace!(token_id = id, ttl = ?ttl, "Recorded token id");
            // Runs after the entry guard is released; `retain` locks every shard.
            if accepted % self.purge_interval == 0 {
                self.purge_expired()?;
            }
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
        Ok(inserted)
    }

    fn purge_expired(&self) -> Result<usize, ReplayCacheError> {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());

        self.purged.fetch_add(removed as u64, Ordering::Relaxed);
        debug!(removed, remaining = self.entries.len(), "Purged expired token ids");
        Ok(removed)
    }
}
