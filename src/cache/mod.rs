//! Remote cache of the sccache state directory
//!
//! Content-addressed by lockfile fingerprint + platform. Entries in the
//! remote store are write-once per key, so each run deletes the stale
//! entry under its exact key before saving a fresh one: at most one
//! live entry per key at any time.
//!
//! # Cache flow per job
//!
//! | Phase | Operation |
//! |-------|-----------|
//! | setup | derive key, restore (exact, then platform fallback) |
//! | build | sccache populates the state directory externally |
//! | post  | dedup (delete exact key), save new entry |

pub mod coordinator;
pub mod key;
pub mod store;

pub use coordinator::{CacheCoordinator, RestoreOutcome};
pub use key::{derive_key, CacheKey};
pub use store::{CacheStore, GhaCacheStore};
