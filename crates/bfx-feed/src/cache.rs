//! Ticker snapshot cache.
//!
//! Bridges push updates into synchronous lookups. One entry per symbol
//! with a fixed TTL; an overwrite resets the expiry. Expiry is checked
//! lazily on read, there is no background sweeper and reads never remove.

use bfx_core::Ticker;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
struct CacheEntry {
    ticker: Ticker,
    expires_at: Instant,
}

/// Per-symbol ticker snapshots with lazy TTL expiry.
pub struct SnapshotCache {
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
}

impl SnapshotCache {
    /// Default entry lifetime.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

    /// Create a cache with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(Self::DEFAULT_TTL)
    }

    /// Create a cache with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Store or overwrite the snapshot for a symbol, resetting its expiry.
    pub fn put(&self, ticker: Ticker) {
        debug!(symbol = %ticker.symbol, "Caching ticker snapshot");
        self.entries.insert(
            ticker.symbol.clone(),
            CacheEntry {
                ticker,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Get the snapshot for a symbol if present and unexpired.
    pub fn get(&self, symbol: &str) -> Option<Ticker> {
        self.entries.get(symbol).and_then(|entry| {
            if entry.expires_at > Instant::now() {
                Some(entry.ticker.clone())
            } else {
                None
            }
        })
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}
