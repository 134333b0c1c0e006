//! Host-local tool cache
//!
//! A `(name, version)` keyed directory store under the user cache dir.
//! A warm host skips network acquisition entirely; the store step is a
//! copy-then-rename so a crashed run never leaves a half-populated
//! entry looking like a hit.

use crate::error::{CiError, CiResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Content-addressed-by-(name, version) local tool store
#[derive(Debug, Clone)]
pub struct ToolCache {
    root: PathBuf,
}

impl ToolCache {
    /// Cache rooted at the platform user cache directory
    pub fn new() -> Self {
        let root = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sccache-ci")
            .join("tools");
        Self { root }
    }

    /// Cache rooted at an explicit directory
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    fn entry_dir(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(name).join(version)
    }

    /// Look up a previously stored tool home
    pub fn find(&self, name: &str, version: &str) -> Option<PathBuf> {
        let dir = self.entry_dir(name, version);
        if dir.is_dir() {
            debug!(%name, %version, dir = %dir.display(), "tool cache hit");
            Some(dir)
        } else {
            debug!(%name, %version, "tool cache miss");
            None
        }
    }

    /// Register a freshly unpacked tool home, returning the cached path.
    ///
    /// An existing entry wins; the new copy is discarded so concurrent
    /// re-registration on one host cannot clobber a published home.
    pub fn store(&self, name: &str, version: &str, source: &Path) -> CiResult<PathBuf> {
        let dest = self.entry_dir(name, version);
        if dest.is_dir() {
            debug!(dir = %dest.display(), "tool already cached");
            return Ok(dest);
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CiError::io(format!("creating {}", parent.display()), e))?;
        }

        let staging = dest.with_file_name(format!(
            ".{}.partial",
            dest.file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("tool")
        ));
        if staging.exists() {
            std::fs::remove_dir_all(&staging)
                .map_err(|e| CiError::io(format!("clearing {}", staging.display()), e))?;
        }
        copy_dir_all(source, &staging)?;

        match std::fs::rename(&staging, &dest) {
            Ok(()) => {}
            Err(e) => {
                let _ = std::fs::remove_dir_all(&staging);
                // Lost the publish race to another process on this host
                if !dest.is_dir() {
                    return Err(CiError::io(format!("publishing {}", dest.display()), e));
                }
            }
        }

        info!(%name, %version, dir = %dest.display(), "tool cached");
        Ok(dest)
    }
}

impl Default for ToolCache {
    fn default() -> Self {
        Self::new()
    }
}

fn copy_dir_all(src: &Path, dst: &Path) -> CiResult<()> {
    std::fs::create_dir_all(dst)
        .map_err(|e| CiError::io(format!("creating {}", dst.display()), e))?;

    let entries = std::fs::read_dir(src)
        .map_err(|e| CiError::io(format!("reading {}", src.display()), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| CiError::io(format!("reading {}", src.display()), e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry
            .file_type()
            .map_err(|e| CiError::io(format!("stat {}", from.display()), e))?;

        if file_type.is_dir() {
            copy_dir_all(&from, &to)?;
        } else {
            std::fs::copy(&from, &to)
                .map_err(|e| CiError::io(format!("copying {}", from.display()), e))?;
        }
    }
    Ok(())
}
