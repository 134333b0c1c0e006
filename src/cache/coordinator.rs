//! Remote cache coordination policy
//!
//! Per job: derive key → restore before the build → dedup + save after.
//! Every operation here is best-effort: the remote cache is a pure
//! performance optimization, so nothing in this module produces a fatal
//! error. A cold cache is an expected steady state, not a failure.
//!
//! # Preconditions
//!
//! At most one job writes a given exact key at a time; that is a
//! property of the calling workflow topology, not something this module
//! can enforce. The dedup-then-save sequence is not atomic: two racing
//! writers can drop one write, and a restore racing a peer's dedup sees
//! a miss and falls back. Neither corrupts data.

use crate::cache::key::CacheKey;
use crate::cache::store::CacheStore;
use crate::config::RepoSlug;
use std::path::Path;
use tracing::{debug, info, warn};

/// Result of a restore attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// An entry was restored; carries the key it matched (the exact key
    /// or one reached through the fallback prefix)
    Hit(String),
    /// No entry under the exact key or any fallback
    Miss,
}

/// Coordinates the remote snapshot of the sccache state directory
pub struct CacheCoordinator<S> {
    store: S,
}

impl<S: CacheStore> CacheCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Restore the state directory from the remote cache.
    ///
    /// Tries the exact key, then the platform-only fallback prefix so a
    /// lockfile change still starts from a same-platform snapshot
    /// instead of cold. With no state directory configured this is a
    /// logged no-op; the coordinator never invents a path.
    pub async fn restore(&self, state_dir: Option<&Path>, key: &CacheKey) -> RestoreOutcome {
        let Some(dir) = state_dir else {
            info!("no sccache state directory configured, skipping cache restore");
            return RestoreOutcome::Miss;
        };

        let fallbacks = vec![key.fallback.clone()];
        match self.store.restore(dir, &key.exact, &fallbacks).await {
            Ok(Some(matched)) => {
                if matched == key.exact {
                    info!(key = %matched, "cache restored from exact key");
                } else {
                    info!(key = %matched, exact = %key.exact, "cache restored from fallback key");
                }
                RestoreOutcome::Hit(matched)
            }
            Ok(None) => {
                info!(key = %key.exact, "no cache entry found, starting cold");
                RestoreOutcome::Miss
            }
            Err(e) => {
                warn!(error = %e, "cache restore failed, starting cold");
                RestoreOutcome::Miss
            }
        }
    }

    /// Delete any live entry under the exact key so the following save
    /// can write. Keys are immutable once written on the service side;
    /// without this, every run after the first under an unchanged
    /// lockfile would fail to persist. Not-found counts as success.
    pub async fn deduplicate(&self, repo: Option<&RepoSlug>, key: &CacheKey) {
        let Some(repo) = repo else {
            warn!("repository not known, skipping cache dedup");
            return;
        };

        match self.store.delete(&repo.owner, &repo.repo, &key.exact).await {
            Ok(()) => info!(key = %key.exact, "stale cache entry deleted"),
            Err(e) if e.is_not_found() => {
                debug!(key = %key.exact, "no existing cache entry to delete")
            }
            Err(e) => warn!(error = %e, key = %key.exact, "cache dedup failed"),
        }
    }

    /// Push the state directory as a new entry under the exact key
    pub async fn save(&self, state_dir: Option<&Path>, key: &CacheKey) {
        let Some(dir) = state_dir else {
            info!("no sccache state directory configured, skipping cache save");
            return;
        };
        if !dir.is_dir() {
            info!(dir = %dir.display(), "state directory does not exist, nothing to save");
            return;
        }

        match self.store.save(dir, &key.exact).await {
            Ok(id) => info!(key = %key.exact, id, "cache entry saved"),
            Err(e) => warn!(error = %e, key = %key.exact, "cache save failed"),
        }
    }
}
