//! Cache key derivation
//!
//! Keys are content-addressed: `sccache-<triple>-<fingerprint>` where the
//! fingerprint is a short SHA-256 prefix of the workspace lockfile.
//! Identical lockfile bytes on the same platform always produce the same
//! key, across runs and hosts. The platform-only form doubles as the
//! restore fallback prefix.

use crate::error::{CiError, CiResult};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Constant namespace tag prefixed to every key
pub const KEY_NAMESPACE: &str = "sccache";

/// Fingerprint length in hex characters. Short enough to keep keys
/// readable; collisions across distinct lockfiles are not a practical
/// concern for a per-run cache.
const FINGERPRINT_HEX_LEN: usize = 5;

/// Exact and fallback cache keys for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    /// Fingerprint-qualified key, e.g. `sccache-x86_64-unknown-linux-musl-1a2b3`
    pub exact: String,
    /// Platform-only prefix used when the exact key has no entry
    pub fallback: String,
}

impl CacheKey {
    /// Compose keys for a platform and optional lockfile fingerprint.
    ///
    /// Without a fingerprint the exact key degrades to the platform-only
    /// key; a keyless run still participates in the cache.
    pub fn compose(platform: &str, fingerprint: Option<&str>) -> Self {
        let fallback = format!("{}-{}", KEY_NAMESPACE, platform);
        let exact = match fingerprint {
            Some(f) => format!("{}-{}", fallback, f),
            None => fallback.clone(),
        };
        Self { exact, fallback }
    }
}

/// Fingerprint of raw lockfile bytes
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut digest = hex::encode(Sha256::digest(bytes));
    digest.truncate(FINGERPRINT_HEX_LEN);
    digest
}

/// Fingerprint of a lockfile on disk
pub fn fingerprint_file(path: &Path) -> CiResult<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| CiError::io(format!("reading lockfile {}", path.display()), e))?;
    Ok(fingerprint_bytes(&bytes))
}

/// Locate the lockfile that seeds the fingerprint.
///
/// An explicit path wins outright; it is not validated here beyond
/// existence. Otherwise the workspace is walked for `Cargo.lock`,
/// skipping dot-directories and build output. Matches are sorted so the
/// pick is deterministic across filesystems; with more than one match
/// the first is used and the ambiguity is logged; pass an explicit
/// path to silence it.
pub fn find_lockfile(workspace: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        warn!(path = %path.display(), "configured lockfile does not exist");
        return None;
    }

    let mut matches: Vec<PathBuf> = WalkDir::new(workspace)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            // Depth 0 is the workspace root itself, whatever its name
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !(entry.file_type().is_dir() && (name.starts_with('.') || name == "target"))
        })
        .filter_map(Result::ok)
        .filter(|entry| {
            entry.file_type().is_file() && entry.file_name().to_str() == Some("Cargo.lock")
        })
        .map(|entry| entry.into_path())
        .collect();
    matches.sort();

    if matches.len() > 1 {
        warn!(
            count = matches.len(),
            picked = %matches[0].display(),
            "multiple lockfiles in workspace, using the first; pass an explicit lockfile path to override"
        );
    }

    matches.into_iter().next()
}

/// Derive this run's cache key from the workspace state.
///
/// Lockfile read errors degrade to the platform-only key rather than
/// failing: key derivation sits on the cache path, which must never
/// fail the job.
pub fn derive_key(platform: &str, workspace: &Path, explicit: Option<&Path>) -> CacheKey {
    let fingerprint = match find_lockfile(workspace, explicit) {
        Some(path) => match fingerprint_file(&path) {
            Ok(f) => {
                debug!(lockfile = %path.display(), fingerprint = %f, "fingerprinted lockfile");
                Some(f)
            }
            Err(e) => {
                warn!(error = %e, "failed to fingerprint lockfile");
                None
            }
        },
        None => {
            debug!(workspace = %workspace.display(), "no lockfile found, using platform key");
            None
        }
    };

    CacheKey::compose(platform, fingerprint.as_deref())
}
