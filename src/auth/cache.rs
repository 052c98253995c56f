//! Validated-token cache.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::time;

use crate::auth::Principal;
use crate::config::IntrospectionConfig;
use crate::observability::metrics;

/// Ceiling applied to any per-entry TTL.
pub const MAX_ENTRY_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    principal: Principal,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_valid(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// TTL-bounded map from an opaque token to the principal it resolved to.
///
/// Lookups share a read lock; stores and sweeps take the write lock.
pub struct TokenCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
    max_entries: usize,
}

impl TokenCache {
    pub fn new(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn from_config(config: &IntrospectionConfig) -> Self {
        Self::new(config.cache_ttl(), config.max_entries)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Cached principal for `token`, or `None` when absent or expired.
    pub fn lookup(&self, token: &str) -> Option<Principal> {
        let now = Instant::now();
        self.entries
            .read()
            .get(token)
            .filter(|entry| entry.is_valid(now))
            .map(|entry| entry.principal.clone())
    }

    /// Replace any entry for `token` with one expiring `ttl` from now.
    /// TTLs above [`MAX_ENTRY_TTL`] are clamped.
    pub fn store(&self, token: impl Into<String>, principal: Principal, ttl: Duration) {
        let token = token.into();
        let now = Instant::now();
        let ttl = ttl.min(MAX_ENTRY_TTL);
        let entry = CacheEntry {
            principal,
            expires_at: now.checked_add(ttl).unwrap_or(now),
        };

        let size = {
            let mut entries = self.entries.write();
            if entries.len() >= self.max_entries && !entries.contains_key(&token) {
                Self::make_room(&mut entries, self.max_entries, now);
            }
            entries.insert(token, entry);
            entries.len()
        };
        metrics::record_cache_size(size);
    }

    pub fn store_default(&self, token: impl Into<String>, principal: Principal) {
        self.store(token, principal, self.default_ttl);
    }

    /// Drop expired entries; if still full, evict the one closest to expiry.
    fn make_room(entries: &mut HashMap<String, CacheEntry>, max_entries: usize, now: Instant) {
        entries.retain(|_, entry| entry.is_valid(now));
        if entries.len() < max_entries {
            return;
        }
        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at)
            .map(|(token, _)| token.clone());
        if let Some(token) = oldest {
            entries.remove(&token);
        }
    }

    /// Remove expired entries. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let (removed, size) = {
            let mut entries = self.entries.write();
            let before = entries.len();
            entries.retain(|_, entry| entry.is_valid(now));
            (before - entries.len(), entries.len())
        };
        metrics::record_cache_size(size);
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Periodically purge expired entries until shutdown is signalled.
    pub async fn run_sweeper(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut ticker = time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.purge_expired();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.len(), "Purged expired tokens");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Token cache sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
