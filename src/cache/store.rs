//! Remote cache store access
//!
//! The [`CacheStore`] trait is the seam between cache policy and the
//! blob service wire protocol. The real implementation speaks the
//! Actions cache HTTP API for restore/save and the GitHub REST API for
//! key deletion. Entries are write-once per key on the service side;
//! the coordinator's dedup step exists because of that.

use crate::error::{CiError, CiResult};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

const API_ACCEPT: &str = "application/json;api-version=6.0-preview.1";
const USER_AGENT: &str = concat!("sccache-ci/", env!("CARGO_PKG_VERSION"));

/// Abstract remote cache store interface
///
/// `restore` answers with the matched key (exact or one reached through
/// a fallback prefix), or `None` on a miss. `save` creates a new entry
/// and fails if the key already has a live one. `delete` removes the
/// entry under an exact key, reporting `CacheEntryNotFound` when there
/// is none.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn restore(
        &self,
        path: &Path,
        primary: &str,
        fallbacks: &[String],
    ) -> CiResult<Option<String>>;

    async fn save(&self, path: &Path, key: &str) -> CiResult<u64>;

    async fn delete(&self, owner: &str, repo: &str, key: &str) -> CiResult<()>;
}

/// Entry metadata returned by the cache service on a hit
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactCacheEntry {
    cache_key: String,
    archive_location: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReserveCacheResponse {
    cache_id: u64,
}

/// Actions cache service client
#[derive(Debug, Clone)]
pub struct GhaCacheStore {
    cache_url: String,
    runtime_token: String,
    github_token: Option<String>,
}

impl GhaCacheStore {
    /// Build a client from the runner-provided service coordinates.
    ///
    /// Both the service url and the runtime token come from the job
    /// environment; without them there is no cache service to talk to.
    pub fn new(
        cache_url: &str,
        runtime_token: &str,
        github_token: Option<String>,
    ) -> CiResult<Self> {
        if cache_url.is_empty() {
            return Err(CiError::CacheUnavailable(
                "ACTIONS_CACHE_URL is not set".to_string(),
            ));
        }
        if runtime_token.is_empty() {
            return Err(CiError::CacheUnavailable(
                "ACTIONS_RUNTIME_TOKEN is not set".to_string(),
            ));
        }

        let mut cache_url = cache_url.to_string();
        if !cache_url.ends_with('/') {
            cache_url.push('/');
        }

        Ok(Self {
            cache_url,
            runtime_token: runtime_token.to_string(),
            github_token,
        })
    }

    fn cache_api_url(&self, resource: &str) -> String {
        format!("{}_apis/artifactcache/{}", self.cache_url, resource)
    }

    fn restore_blocking(
        &self,
        path: &Path,
        primary: &str,
        fallbacks: &[String],
    ) -> CiResult<Option<String>> {
        let mut keys = vec![primary.to_string()];
        keys.extend(fallbacks.iter().cloned());
        let url = self.cache_api_url("cache");
        debug!(keys = %keys.join(","), "querying cache entry");

        let result = ureq::get(url.as_str())
            .header("User-Agent", USER_AGENT)
            .header("Accept", API_ACCEPT)
            .header("Authorization", format!("Bearer {}", self.runtime_token))
            .query("keys", keys.join(","))
            .query("version", entry_version(path))
            .call();

        let mut response = match result {
            Ok(r) => r,
            // No entry under any supplied key
            Err(ureq::Error::StatusCode(404)) => return Ok(None),
            Err(e) => return Err(CiError::CacheStore(format!("cache query: {}", e))),
        };
        if response.status().as_u16() == 204 {
            return Ok(None);
        }

        let entry: ArtifactCacheEntry = response
            .body_mut()
            .read_json()
            .map_err(|e| CiError::CacheStore(format!("malformed cache entry: {}", e)))?;

        let mut archive_response = ureq::get(entry.archive_location.as_str())
            .header("User-Agent", USER_AGENT)
            .call()
            .map_err(|e| CiError::CacheStore(format!("archive download: {}", e)))?;
        let mut archive = Vec::new();
        archive_response
            .body_mut()
            .as_reader()
            .read_to_end(&mut archive)
            .map_err(|e| CiError::CacheStore(format!("archive download: {}", e)))?;

        unpack_state(&archive, path)?;
        debug!(matched = %entry.cache_key, "cache entry restored");
        Ok(Some(entry.cache_key))
    }

    fn save_blocking(&self, path: &Path, key: &str) -> CiResult<u64> {
        let archive = pack_state(path)?;
        let size = archive.len() as u64;
        debug!(%key, size, "saving cache entry");

        let reserve_url = self.cache_api_url("caches");
        let reserve = ureq::post(reserve_url.as_str())
            .header("User-Agent", USER_AGENT)
            .header("Accept", API_ACCEPT)
            .header("Authorization", format!("Bearer {}", self.runtime_token))
            .send_json(serde_json::json!({
                "key": key,
                "version": entry_version(path),
            }));

        let mut reserve_response = match reserve {
            Ok(r) => r,
            // Keys are immutable once written; a live entry rejects the reservation
            Err(ureq::Error::StatusCode(409)) => {
                return Err(CiError::CacheStore(format!(
                    "key '{}' already has a live entry",
                    key
                )))
            }
            Err(e) => return Err(CiError::CacheStore(format!("cache reserve: {}", e))),
        };
        let reserved: ReserveCacheResponse = reserve_response
            .body_mut()
            .read_json()
            .map_err(|e| CiError::CacheStore(format!("malformed reserve response: {}", e)))?;

        let upload_url = self.cache_api_url(&format!("caches/{}", reserved.cache_id));
        ureq::patch(upload_url.as_str())
            .header("User-Agent", USER_AGENT)
            .header("Accept", API_ACCEPT)
            .header("Authorization", format!("Bearer {}", self.runtime_token))
            .header("Content-Type", "application/octet-stream")
            .header(
                "Content-Range",
                format!("bytes 0-{}/*", size.saturating_sub(1)),
            )
            .send(&archive[..])
            .map_err(|e| CiError::CacheStore(format!("cache upload: {}", e)))?;

        ureq::post(upload_url.as_str())
            .header("User-Agent", USER_AGENT)
            .header("Accept", API_ACCEPT)
            .header("Authorization", format!("Bearer {}", self.runtime_token))
            .send_json(serde_json::json!({ "size": size }))
            .map_err(|e| CiError::CacheStore(format!("cache commit: {}", e)))?;

        debug!(%key, id = reserved.cache_id, "cache entry saved");
        Ok(reserved.cache_id)
    }

    fn delete_blocking(&self, owner: &str, repo: &str, key: &str) -> CiResult<()> {
        let token = self
            .github_token
            .as_deref()
            .ok_or_else(|| CiError::CacheUnavailable("no token for cache deletion".to_string()))?;

        let url = format!(
            "https://api.github.com/repos/{}/{}/actions/caches",
            owner, repo
        );
        debug!(%key, "deleting cache entry");

        let result = ureq::delete(url.as_str())
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", token))
            .query("key", key)
            .call();

        match result {
            Ok(_) => Ok(()),
            Err(ureq::Error::StatusCode(404)) => {
                Err(CiError::CacheEntryNotFound(key.to_string()))
            }
            Err(e) => Err(CiError::CacheStore(format!("cache delete: {}", e))),
        }
    }
}

#[async_trait]
impl CacheStore for GhaCacheStore {
    async fn restore(
        &self,
        path: &Path,
        primary: &str,
        fallbacks: &[String],
    ) -> CiResult<Option<String>> {
        let store = self.clone();
        let path = path.to_path_buf();
        let primary = primary.to_string();
        let fallbacks = fallbacks.to_vec();
        tokio::task::spawn_blocking(move || store.restore_blocking(&path, &primary, &fallbacks))
            .await
            .map_err(|e| CiError::Internal(format!("blocking task failed: {}", e)))?
    }

    async fn save(&self, path: &Path, key: &str) -> CiResult<u64> {
        let store = self.clone();
        let path = path.to_path_buf();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || store.save_blocking(&path, &key))
            .await
            .map_err(|e| CiError::Internal(format!("blocking task failed: {}", e)))?
    }

    async fn delete(&self, owner: &str, repo: &str, key: &str) -> CiResult<()> {
        let store = self.clone();
        let owner = owner.to_string();
        let repo = repo.to_string();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || store.delete_blocking(&owner, &repo, &key))
            .await
            .map_err(|e| CiError::Internal(format!("blocking task failed: {}", e)))?
    }
}

/// Entry version discriminator: same path layout, same version.
///
/// Entries saved against a different state directory layout are
/// invisible to each other, which keeps a restore from unpacking into
/// the wrong place.
fn entry_version(path: &Path) -> String {
    hex::encode(Sha256::digest(
        format!("{}|tar.gz", path.display()).as_bytes(),
    ))
}

/// Archive the contents of a state directory
pub(crate) fn pack_state(dir: &Path) -> CiResult<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder
        .append_dir_all(".", dir)
        .map_err(|e| CiError::io(format!("archiving {}", dir.display()), e))?;
    let encoder = builder
        .into_inner()
        .map_err(|e| CiError::io(format!("archiving {}", dir.display()), e))?;
    encoder
        .finish()
        .map_err(|e| CiError::io(format!("archiving {}", dir.display()), e))
}

/// Unpack an archived state directory snapshot into `dir`
pub(crate) fn unpack_state(archive: &[u8], dir: &Path) -> CiResult<()> {
    std::fs::create_dir_all(dir)
        .map_err(|e| CiError::io(format!("creating {}", dir.display()), e))?;
    let mut tarball = tar::Archive::new(GzDecoder::new(Cursor::new(archive)));
    tarball
        .unpack(dir)
        .map_err(|e| CiError::io(format!("unpacking into {}", dir.display()), e))
}
